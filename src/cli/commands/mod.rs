//! Command implementations.

pub mod config;
pub mod diff;
pub mod list;
pub mod r#match;
pub mod run;
pub mod schema;
pub mod version;
