//! Structured logging for strata binaries and tests
//!
//! The library crates only emit `tracing` events; whoever runs them calls
//! [`init_logging`] once to decide where the events go.
//!
//! ```no_run
//! use strata_telemetry::{init_logging, LogConfig, LogFormat, LogLevel};
//!
//! let config = LogConfig::default()
//!     .with_level(LogLevel::Debug)
//!     .with_format(LogFormat::Json);
//! init_logging(&config).expect("logging already initialized");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod logging;

pub use error::{Result, TelemetryError};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput};
