//! Layered gateway configuration
//!
//! Sources, later ones winning:
//! 1. optional config file (format from its extension)
//! 2. `EGRESS_*` environment variables, `__` between sections, e.g.
//!    `EGRESS_TLS__CERT_FILE=/etc/egress/server.pem` or
//!    `EGRESS_REVOCATION__CRL_FILES=/a.crl,/b.crl`

use anyhow::Context;
use auth_identity::IdentityConfig;
use error_common::{Result, TrustError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use telemetry::LoggingConfig;

const ENV_PREFIX: &str = "EGRESS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Absent when TLS is terminated elsewhere
    #[serde(default)]
    pub tls: Option<TlsSettings>,

    #[serde(default)]
    pub revocation: RevocationSettings,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsSettings {
    #[serde(default)]
    pub cert_file: PathBuf,

    #[serde(default)]
    pub key_file: PathBuf,

    /// PEM bundles of CAs whose client certificates are accepted
    #[serde(default)]
    pub client_ca_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevocationSettings {
    /// DER CRL files, processed in order on every reload
    #[serde(default)]
    pub crl_files: Vec<PathBuf>,
}

impl GatewayConfig {
    /// Load from `path` (if given) and the process environment.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, a value has the wrong type, or
    /// [`GatewayConfig::validate`] rejects the result.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`GatewayConfig::load`], reading variables from `env` instead of
    /// the process environment when it is given.
    ///
    /// # Errors
    ///
    /// See [`GatewayConfig::load`].
    pub fn load_with_env(path: Option<&Path>, env: Option<config::Map<String, String>>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("tls.client_ca_files")
                    .with_list_parse_key("revocation.crl_files")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to assemble gateway configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize gateway configuration")?;
        config.validate().context("Invalid gateway configuration")?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] when TLS is enabled without both
    /// a certificate and a key, or the role header is empty.
    pub fn validate(&self) -> Result<()> {
        if let Some(tls) = &self.tls {
            if tls.cert_file.as_os_str().is_empty() || tls.key_file.as_os_str().is_empty() {
                return Err(TrustError::Configuration(
                    "both certificate and key files must be specified to set up TLS".to_string(),
                ));
            }
        }

        if self.identity.role_header.trim().is_empty() {
            return Err(TrustError::Configuration("identity.role_header must not be empty".to_string()));
        }

        if !self.revocation.crl_files.is_empty() && !self.client_auth_configured() {
            tracing::warn!(
                crl_files = self.revocation.crl_files.len(),
                "CRL files configured without client CAs; every CRL will be rejected as unbound"
            );
        }

        Ok(())
    }

    pub fn client_auth_configured(&self) -> bool {
        self.tls
            .as_ref()
            .is_some_and(|tls| !tls.client_ca_files.is_empty())
    }
}
