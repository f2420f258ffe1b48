//! Common error handling for the egress proxy trust subsystem
//!
//! Every crate in the workspace reports failures through [`TrustError`]. Each
//! variant belongs to exactly one [`ErrorKind`], which callers match on instead
//! of inspecting error types at run time.
//!
//! # Error Tiers
//!
//! - **Fatal**: unreadable bundle or CRL files, missing TLS key material,
//!   invalid configuration. These abort the setup or reload step.
//! - **Advisory**: unparsable CRLs, CRLs without an authority binding, CRLs
//!   signed by the wrong key. These are logged and the item is skipped, so
//!   they rarely surface as a `TrustError` at all.
//! - **Identity**: [`ErrorKind::MissingRole`] is kept apart from everything
//!   else so the proxy can answer with an "identity required" response.
//!
//! # Example
//!
//! ```rust
//! use error_common::{ErrorKind, TrustError};
//!
//! let err = TrustError::MissingRole("client did not provide certificate".into());
//! assert!(err.is_missing_role());
//! assert_eq!(err.kind(), ErrorKind::MissingRole);
//! assert_eq!(err.code(), "IDENTITY_1001");
//! ```

pub mod codes;
pub mod types;

pub use codes::*;
pub use types::*;
