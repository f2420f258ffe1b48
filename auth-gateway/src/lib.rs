//! Trust subsystem assembly for the egress proxy
//!
//! [`GatewayConfig`] gathers the TLS, revocation, identity and logging
//! settings from a file and `EGRESS_*` environment variables.
//! [`TrustGateway`] turns that into a live trust store plus the identity
//! resolver that request handlers call on every connection.
//!
//! # Example
//!
//! ```rust,no_run
//! use auth_gateway::{GatewayConfig, TrustGateway};
//! use std::path::Path;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = GatewayConfig::load(Some(Path::new("/etc/egress/trust.toml")))?;
//! telemetry::init_tracing(&config.logging)?;
//!
//! let gateway = TrustGateway::initialize(&config).await?;
//!
//! // Later, out of band (timer, SIGHUP, operator request)
//! let report = gateway.reload_revocations().await?;
//! println!("{} CRLs accepted", report.accepted().count());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod gateway;

pub use self::config::*;
pub use self::gateway::*;
