//! Registry of trusted client certificate authorities
//!
//! Authorities are keyed by the raw bytes of their Subject Key Identifier.
//! Those bytes are arbitrary (not hex text) and are compared exactly.

use arc_swap::ArcSwap;
use error_common::{Result, TrustError};
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use x509_parser::prelude::*;

const PEM_BEGIN: &[u8] = b"-----BEGIN ";
const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Snapshot of the registry: subject key id -> authority
pub type AuthorityMap = HashMap<Vec<u8>, Arc<CertificateAuthority>>;

/// Certificate pool owned by the TLS layer.
///
/// The registry feeds every accepted CA certificate into the pool during the
/// same scan that populates the registry itself.
pub trait TrustPool {
    /// Add one DER-encoded certificate to the pool
    ///
    /// # Errors
    ///
    /// Returns an error if the pool refuses the certificate.
    fn add_certificate(&mut self, der: &[u8]) -> Result<()>;
}

impl TrustPool for RootCertStore {
    fn add_certificate(&mut self, der: &[u8]) -> Result<()> {
        self.add(CertificateDer::from(der.to_vec()))
            .map_err(|e| TrustError::ParseFailure(format!("TLS trust pool rejected certificate: {e}")))
    }
}

impl TrustPool for Vec<CertificateDer<'static>> {
    fn add_certificate(&mut self, der: &[u8]) -> Result<()> {
        self.push(CertificateDer::from(der.to_vec()));
        Ok(())
    }
}

/// A trusted client CA.
///
/// Only the DER bytes are kept; the parsed X.509 view borrows from them and is
/// rebuilt on demand with [`CertificateAuthority::certificate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateAuthority {
    subject_key_id: Vec<u8>,
    subject: String,
    der: Vec<u8>,
}

impl CertificateAuthority {
    /// Parse a DER certificate.
    ///
    /// Returns `Ok(None)` for a well-formed certificate that carries no
    /// Subject Key Identifier, since no CRL could ever be bound to it.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ParseFailure`] if the bytes are not an X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Option<Self>> {
        let (_rem, cert) = X509Certificate::from_der(der)
            .map_err(|e| TrustError::ParseFailure(format!("Failed to parse X.509 certificate: {e}")))?;

        let subject_key_id = cert.extensions().iter().find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(ski) => Some(ski.0.to_vec()),
            _ => None,
        });

        Ok(subject_key_id.map(|subject_key_id| Self {
            subject_key_id,
            subject: cert.subject().to_string(),
            der: der.to_vec(),
        }))
    }

    pub fn subject_key_id(&self) -> &[u8] {
        &self.subject_key_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Parsed view of the certificate, including its public key
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ParseFailure`] if the stored bytes no longer parse.
    pub fn certificate(&self) -> Result<X509Certificate<'_>> {
        X509Certificate::from_der(&self.der)
            .map(|(_rem, cert)| cert)
            .map_err(|e| TrustError::ParseFailure(format!("Failed to parse CA certificate: {e}")))
    }
}

/// Counters from one PEM scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PemLoadSummary {
    /// Certificates accepted into the trust pool
    pub loaded: usize,
    /// Accepted certificates that were also registered by subject key id
    pub registered: usize,
    /// Blocks whose PEM framing was broken
    pub skipped_malformed: usize,
    /// Blocks that were not `CERTIFICATE` or carried PEM headers
    pub skipped_non_certificate: usize,
    /// `CERTIFICATE` blocks that failed X.509 parsing
    pub skipped_unparsable: usize,
    /// Accepted certificates without a Subject Key Identifier
    pub without_key_id: usize,
    /// Accepted certificates the TLS trust pool refused
    pub rejected_by_pool: usize,
}

impl PemLoadSummary {
    pub fn loaded_any(&self) -> bool {
        self.loaded > 0
    }

    pub fn skipped(&self) -> usize {
        self.skipped_malformed + self.skipped_non_certificate + self.skipped_unparsable
    }
}

/// Trusted CAs keyed by subject key id, readable without locks
pub struct AuthorityRegistry {
    authorities: ArcSwap<AuthorityMap>,
}

impl AuthorityRegistry {
    pub fn new() -> Self {
        Self {
            authorities: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn get(&self, subject_key_id: &[u8]) -> Option<Arc<CertificateAuthority>> {
        self.authorities.load().get(subject_key_id).cloned()
    }

    pub fn contains(&self, subject_key_id: &[u8]) -> bool {
        self.authorities.load().contains_key(subject_key_id)
    }

    pub fn len(&self) -> usize {
        self.authorities.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.authorities.load().is_empty()
    }

    /// Current registry contents as an immutable snapshot
    pub fn snapshot(&self) -> Arc<AuthorityMap> {
        self.authorities.load_full()
    }

    /// Scan concatenated PEM blocks, registering every CA certificate and
    /// adding it to `pool` in the same pass.
    ///
    /// Blocks that are not `CERTIFICATE`, that carry PEM headers, or that fail
    /// to parse are skipped and counted. A later certificate with the same
    /// subject key id replaces an earlier one. The new entries are published
    /// together once the scan completes.
    pub fn load_from_pem(&self, pem_bytes: &[u8], pool: &mut dyn TrustPool) -> PemLoadSummary {
        let mut summary = PemLoadSummary::default();
        let mut accepted: Vec<Arc<CertificateAuthority>> = Vec::new();

        for block in split_pem_blocks(pem_bytes) {
            let parsed = match ::pem::parse(block) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed PEM block");
                    summary.skipped_malformed += 1;
                    continue;
                }
            };

            if parsed.tag() != CERTIFICATE_TAG || parsed.headers().iter().next().is_some() {
                tracing::debug!(tag = parsed.tag(), "Skipping non-certificate PEM block");
                summary.skipped_non_certificate += 1;
                continue;
            }

            let authority = match CertificateAuthority::from_der(parsed.contents()) {
                Ok(authority) => authority,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparsable certificate block");
                    summary.skipped_unparsable += 1;
                    continue;
                }
            };

            summary.loaded += 1;
            if let Err(e) = pool.add_certificate(parsed.contents()) {
                tracing::warn!(error = %e, "TLS trust pool refused CA certificate");
                summary.rejected_by_pool += 1;
            }

            match authority {
                Some(authority) => {
                    tracing::info!(
                        authority_key_id = %hex::encode(authority.subject_key_id()),
                        subject = authority.subject(),
                        "Loaded CA"
                    );
                    summary.registered += 1;
                    accepted.push(Arc::new(authority));
                }
                None => {
                    tracing::warn!("Loaded CA without a Subject Key Identifier; no CRL can be bound to it");
                    summary.without_key_id += 1;
                }
            }
        }

        if !accepted.is_empty() {
            self.authorities.rcu(|current| {
                let mut next = AuthorityMap::clone(current);
                for authority in &accepted {
                    next.insert(authority.subject_key_id().to_vec(), Arc::clone(authority));
                }
                next
            });
        }

        summary
    }

    /// Read a PEM bundle from disk and load it.
    ///
    /// # Errors
    ///
    /// An unreadable file is fatal ([`TrustError::Io`]). A file that yields no
    /// certificate at all is also fatal ([`TrustError::NoCertificates`]).
    pub async fn load_pem_file(&self, path: &Path, pool: &mut dyn TrustPool) -> Result<PemLoadSummary> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to read CA bundle");
            TrustError::io(path, e)
        })?;

        let summary = self.load_from_pem(&data, pool);
        if !summary.loaded_any() {
            tracing::error!(
                path = %path.display(),
                skipped = summary.skipped(),
                "Failed to load any certificates from CA bundle"
            );
            return Err(TrustError::NoCertificates(path.to_path_buf()));
        }

        tracing::info!(
            path = %path.display(),
            loaded = summary.loaded,
            registered = summary.registered,
            skipped = summary.skipped(),
            "Loaded CA bundle"
        );
        Ok(summary)
    }
}

impl Default for AuthorityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthorityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityRegistry")
            .field("authorities", &self.len())
            .finish()
    }
}

/// Split a buffer into segments that each start at a `-----BEGIN ` marker.
///
/// Text before the first marker is dropped. Each segment holds at most one
/// block, so a broken block cannot swallow the blocks after it.
fn split_pem_blocks(data: &[u8]) -> Vec<&[u8]> {
    let starts: Vec<usize> = data
        .windows(PEM_BEGIN.len())
        .enumerate()
        .filter(|(_, window)| *window == PEM_BEGIN)
        .map(|(offset, _)| offset)
        .collect();

    starts
        .iter()
        .enumerate()
        .filter_map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(data.len());
            data.get(start..end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pem_blocks_drops_leading_text() {
        let data = b"garbage\n-----BEGIN A-----\nAAAA\n-----END A-----\n-----BEGIN B-----\nBBBB\n-----END B-----\n";
        let blocks = split_pem_blocks(data);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with(b"-----BEGIN A-----"));
        assert!(blocks[1].starts_with(b"-----BEGIN B-----"));
    }

    #[test]
    fn test_split_pem_blocks_empty_input() {
        assert!(split_pem_blocks(b"").is_empty());
        assert!(split_pem_blocks(b"no pem here").is_empty());
    }

    #[test]
    fn test_load_from_pem_ignores_garbage() {
        let registry = AuthorityRegistry::new();
        let mut pool: Vec<CertificateDer<'static>> = Vec::new();
        let summary = registry.load_from_pem(b"not a certificate bundle", &mut pool);
        assert!(!summary.loaded_any());
        assert!(registry.is_empty());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_from_der_rejects_garbage() {
        let err = CertificateAuthority::from_der(&[0x30, 0x03, 0x02, 0x01]).unwrap_err();
        assert_eq!(err.kind(), error_common::ErrorKind::ParseFailure);
    }
}
