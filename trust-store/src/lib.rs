//! Client-certificate trust store for the egress proxy
//!
//! This crate owns everything the proxy trusts when it authenticates callers
//! with mutual TLS:
//! - **Authority registry**: client CAs loaded from PEM bundles, keyed by
//!   their Subject Key Identifier
//! - **Revocation store**: CRLs bound to a registered CA through their
//!   Authority Key Identifier and verified against that CA's key
//! - **TLS setup**: server key pair plus client CA pool, assembled into a
//!   rustls `ServerConfig`
//!
//! Both the registry and the revocation table are immutable snapshots behind
//! an [`arc_swap::ArcSwap`]. Reloads build a complete replacement off to the
//! side and publish it with one pointer swap, so request handlers never block
//! on reload I/O and never see a half-built table.
//!
//! # Example
//!
//! ```rust,no_run
//! use rustls::RootCertStore;
//! use std::path::PathBuf;
//! use trust_store::{AuthorityRegistry, RevocationStore};
//!
//! # async fn run() -> error_common::Result<()> {
//! let registry = AuthorityRegistry::new();
//! let mut pool = RootCertStore::empty();
//! registry
//!     .load_pem_file(&PathBuf::from("/etc/egress/client-cas.pem"), &mut pool)
//!     .await?;
//!
//! let revocations = RevocationStore::new();
//! let report = revocations
//!     .reload(&registry, &[PathBuf::from("/etc/egress/crl/internal-ca.crl")])
//!     .await?;
//! println!("{} CRLs installed", report.accepted().count());
//! # Ok(())
//! # }
//! ```

pub mod authority;
pub mod revocation;
pub mod tls;

pub use authority::*;
pub use revocation::*;
pub use tls::*;
