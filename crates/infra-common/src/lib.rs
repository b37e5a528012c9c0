//! Common infrastructure for the voxlink call stack.
//!
//! Holds the pieces every other crate in the workspace shares but that have
//! nothing to do with calls themselves:
//!
//! - [`logging`]: `tracing-subscriber` setup and per-component log contexts
//! - [`errors`]: the infrastructure error type returned by setup helpers

pub mod errors;
pub mod logging;

pub use errors::{Error, Result};
pub use logging::{log_welcome, parse_log_level, setup_logging, LogContext, LoggingConfig};
