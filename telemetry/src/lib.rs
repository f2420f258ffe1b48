//! Logging setup for the egress proxy trust subsystem
//!
//! The trust store reports every skipped bundle block, rejected CRL and
//! authority without a CRL through `tracing` events. This crate wires those
//! events to a subscriber:
//! - `EnvFilter` driven level selection (`RUST_LOG` wins over the config)
//! - Human-readable output for development
//! - JSON lines for production log pipelines
//!
//! # Example
//!
//! ```rust
//! use telemetry::{init_tracing, LogFormat, LoggingConfig};
//!
//! let config = LoggingConfig {
//!     level: "debug".to_string(),
//!     format: LogFormat::Json,
//! };
//! init_tracing(&config).ok();
//! tracing::info!(component = "trust-store", "logging ready");
//! ```

pub mod error;
pub mod logging;

pub use error::*;
pub use logging::*;
