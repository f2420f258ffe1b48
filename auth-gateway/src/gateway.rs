//! Live trust state shared with request handlers

use crate::config::GatewayConfig;
use auth_identity::{IdentityClaim, IdentityResolver};
use error_common::Result;
use http::request::Parts;
use http::Request;
use rustls::ServerConfig;
use std::path::PathBuf;
use std::sync::Arc;
use trust_store::{setup_tls, AuthorityRegistry, ReloadReport, RevocationStore, RevocationTable};

/// Authority registry, revocation store and identity resolver for one proxy.
///
/// Cloning is cheap; every clone observes the same published snapshots.
#[derive(Debug, Clone)]
pub struct TrustGateway {
    registry: Arc<AuthorityRegistry>,
    revocations: Arc<RevocationStore>,
    resolver: IdentityResolver,
    server_config: Option<Arc<ServerConfig>>,
    crl_files: Arc<Vec<PathBuf>>,
}

impl TrustGateway {
    /// Build the trust state described by `config`.
    ///
    /// TLS material and client CA bundles are loaded first, then the initial
    /// CRL reload runs, then the identity strategy is fixed: mutual TLS when
    /// client CAs were configured, the role header otherwise.
    ///
    /// # Errors
    ///
    /// Any fatal TLS setup or CRL read error aborts initialization.
    pub async fn initialize(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(AuthorityRegistry::new());

        let (server_config, client_auth_configured) = match &config.tls {
            Some(tls) => {
                let setup = setup_tls(&tls.cert_file, &tls.key_file, &tls.client_ca_files, &registry).await?;
                (Some(setup.server_config), setup.client_auth_configured)
            }
            None => {
                tracing::info!("TLS not configured; identity comes from the role header");
                (None, false)
            }
        };

        let gateway = Self {
            registry,
            revocations: Arc::new(RevocationStore::new()),
            resolver: IdentityResolver::select(client_auth_configured, &config.identity)?,
            server_config,
            crl_files: Arc::new(config.revocation.crl_files.clone()),
        };

        gateway.reload_revocations().await?;
        Ok(gateway)
    }

    /// Rebuild and publish the revocation table from the configured CRL files.
    ///
    /// # Errors
    ///
    /// An unreadable CRL file aborts the reload; the previous table stays live.
    pub async fn reload_revocations(&self) -> Result<ReloadReport> {
        let report = self.revocations.reload(&self.registry, &self.crl_files).await;
        if let Err(e) = &report {
            error_common::log_error("revocation reload", e);
        }
        report
    }

    /// # Errors
    ///
    /// See [`IdentityResolver::resolve`].
    pub fn resolve_identity<B>(&self, request: &Request<B>) -> Result<IdentityClaim> {
        self.resolver.resolve_request(request)
    }

    /// # Errors
    ///
    /// See [`IdentityResolver::resolve`].
    pub fn resolve_identity_parts(&self, parts: &Parts) -> Result<IdentityClaim> {
        self.resolver.resolve_parts(parts)
    }

    /// Check a DER client certificate against the published CRLs
    ///
    /// # Errors
    ///
    /// Returns a parse failure if the certificate cannot be parsed.
    pub fn is_revoked(&self, cert_der: &[u8]) -> Result<bool> {
        self.revocations.is_revoked(cert_der)
    }

    /// rustls configuration for the listener, when TLS is configured here
    pub fn server_config(&self) -> Option<Arc<ServerConfig>> {
        self.server_config.clone()
    }

    pub fn registry(&self) -> &AuthorityRegistry {
        &self.registry
    }

    pub fn revocations(&self) -> Arc<RevocationTable> {
        self.revocations.snapshot()
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }
}
