//! `buildcheck`: conformance verifier for image build tools.
//!
//! Builds the same scenario with a candidate builder and a reference
//! builder, then compares their logs, image metadata and filesystems.

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod fsdiff;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod process;
pub mod registry;
pub mod report;
pub mod runner;
pub mod staging;
pub mod suite;
pub mod tools;
pub mod util;

pub use error::{BuildcheckError, ErrorCode, Result, StructuredError};
