//! Server TLS configuration with optional client certificate verification

use crate::authority::{AuthorityRegistry, PemLoadSummary};
use error_common::{Result, TrustError};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output of [`setup_tls`]
#[derive(Debug, Clone)]
pub struct TlsSetup {
    pub server_config: Arc<ServerConfig>,
    /// True when client CA bundles were supplied and peers may present certificates
    pub client_auth_configured: bool,
    pub bundle_summaries: Vec<(PathBuf, PemLoadSummary)>,
}

/// Assemble the server's TLS configuration.
///
/// Every client CA bundle is loaded into `registry` and into the pool used to
/// verify client certificates. Clients that present no certificate are still
/// accepted at the TLS layer; identity resolution rejects them later.
///
/// # Errors
///
/// - [`TrustError::Configuration`] if either path is empty or rustls rejects the key pair
/// - [`TrustError::Io`] if any file cannot be read
/// - [`TrustError::ParseFailure`] if no certificate or private key is found
/// - [`TrustError::NoCertificates`] if a client CA bundle yields nothing
pub async fn setup_tls(
    cert_file: &Path,
    key_file: &Path,
    client_ca_files: &[PathBuf],
    registry: &AuthorityRegistry,
) -> Result<TlsSetup> {
    if cert_file.as_os_str().is_empty() || key_file.as_os_str().is_empty() {
        return Err(TrustError::Configuration(
            "both certificate and key files must be specified to set up TLS".to_string(),
        ));
    }

    let chain = load_certificate_chain(cert_file).await?;
    let key = load_private_key(key_file).await?;

    let mut roots = RootCertStore::empty();
    let mut bundle_summaries = Vec::with_capacity(client_ca_files.len());
    for path in client_ca_files {
        let summary = registry.load_pem_file(path, &mut roots).await?;
        bundle_summaries.push((path.clone(), summary));
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let client_auth_configured = !client_ca_files.is_empty();
    let verifier: Arc<dyn ClientCertVerifier> = if client_auth_configured {
        WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
            .allow_unauthenticated()
            .build()
            .map_err(|e| TrustError::Configuration(format!("Failed to build client verifier: {e}")))?
    } else {
        WebPkiClientVerifier::no_client_auth()
    };

    let server_config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TrustError::Configuration(format!("Unsupported TLS protocol versions: {e}")))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .map_err(|e| TrustError::Configuration(format!("Invalid server certificate or key: {e}")))?;

    tracing::info!(
        cert_file = %cert_file.display(),
        client_auth = client_auth_configured,
        client_cas = registry.len(),
        "TLS configured"
    );

    Ok(TlsSetup {
        server_config: Arc::new(server_config),
        client_auth_configured,
        bundle_summaries,
    })
}

async fn read_pem(path: &Path) -> Result<Vec<pem::Pem>> {
    let data = tokio::fs::read(path).await.map_err(|e| TrustError::io(path, e))?;
    pem::parse_many(&data)
        .map_err(|e| TrustError::ParseFailure(format!("Invalid PEM in '{}': {e}", path.display())))
}

async fn load_certificate_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let chain: Vec<CertificateDer<'static>> = read_pem(path)
        .await?
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(|block| CertificateDer::from(block.into_contents()))
        .collect();

    if chain.is_empty() {
        return Err(TrustError::ParseFailure(format!(
            "No certificate found in '{}'",
            path.display()
        )));
    }
    Ok(chain)
}

async fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    read_pem(path)
        .await?
        .into_iter()
        .find_map(|block| match block.tag().to_string().as_str() {
            "PRIVATE KEY" => Some(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(block.into_contents()))),
            "RSA PRIVATE KEY" => Some(PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(block.into_contents()))),
            "EC PRIVATE KEY" => Some(PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(block.into_contents()))),
            _ => None,
        })
        .ok_or_else(|| TrustError::ParseFailure(format!("No private key found in '{}'", path.display())))
}
