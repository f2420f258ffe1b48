//! Caller identity resolution for the egress proxy
//!
//! Every inbound request is mapped to a role string before the policy engine
//! sees it. The strategy is fixed once at startup:
//! - **Mutual TLS**: the Common Name of the first certificate in the
//!   verified peer chain
//! - **Header**: the single value of a designated request header
//!
//! Failures are reported as [`error_common::TrustError::MissingRole`] so the
//! proxy can answer with an "identity required" response.
//!
//! # Example
//!
//! ```rust
//! use auth_identity::{IdentityConfig, IdentityResolver};
//! use http::Request;
//!
//! let resolver = IdentityResolver::select(false, &IdentityConfig::default()).unwrap();
//! let request = Request::builder()
//!     .header("X-Egress-Role", "payments-service")
//!     .body(())
//!     .unwrap();
//!
//! let claim = resolver.resolve_request(&request).unwrap();
//! assert_eq!(claim.role, "payments-service");
//! ```

pub mod config;
pub mod models;
pub mod resolver;

pub use config::*;
pub use models::*;
pub use resolver::*;
