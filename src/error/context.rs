//! Context helpers for attaching a message to lower-level errors.

use super::{BuildcheckError, Result};

/// Attach context to any `Result` whose error is a std error.
pub trait ResultExt<T> {
    /// Wrap the error with a static context message.
    ///
    /// # Errors
    ///
    /// Returns `BuildcheckError::WithContext` when `self` is `Err`.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wrap the error with a lazily built context message.
    ///
    /// # Errors
    ///
    /// Returns `BuildcheckError::WithContext` when `self` is `Err`.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| BuildcheckError::WithContext {
            context: context.into(),
            source: Box::new(source),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| BuildcheckError::WithContext {
            context: f().into(),
            source: Box::new(source),
        })
    }
}

/// Turn a missing value into a config error.
pub trait OptionExt<T> {
    /// # Errors
    ///
    /// Returns `BuildcheckError::Config` when `self` is `None`.
    fn ok_or_config(self, message: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_config(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| BuildcheckError::Config(message.into()))
    }
}
