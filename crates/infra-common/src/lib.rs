//! Common infrastructure for the clearmeter stack.
//!
//! Currently this hosts the shared logging/tracing setup used by the
//! channel and session layers and their binaries.

pub mod errors;
pub mod logging;

pub use errors::{Error, Result};
pub use logging::{setup_logging, LoggingConfig};
