//! Certificate revocation lists bound to registered authorities
//!
//! A CRL is only trusted once its Authority Key Identifier names a CA in the
//! [`AuthorityRegistry`] and that CA's public key verifies its signature.
//! Every reload builds a fresh [`RevocationTable`] and publishes it with a
//! single swap.

use crate::authority::{AuthorityRegistry, CertificateAuthority};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use error_common::{ErrorKind, Result, TrustError};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use x509_parser::oid_registry::OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER;
use x509_parser::prelude::*;

const PEM_BEGIN: &[u8] = b"-----BEGIN ";
const CRL_PEM_TAG: &str = "X509 CRL";

/// A verified CRL.
///
/// Instances only exist for lists whose issuer binding and signature both
/// checked out, so `verified` is always true for entries in a table.
#[derive(Debug, Clone)]
pub struct RevocationList {
    pub authority_key_id: Vec<u8>,
    pub issuer: Arc<CertificateAuthority>,
    /// Revoked serial numbers as lowercase hex without leading zeros
    pub revoked_serials: HashSet<String>,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    pub crl_number: Option<String>,
    pub source: PathBuf,
    pub verified: bool,
}

impl RevocationList {
    /// Check a serial number given as hex, with or without `:` separators
    pub fn is_revoked(&self, serial: &str) -> bool {
        self.revoked_serials.contains(&normalize_serial(serial))
    }

    /// True once `now` is past the list's next update time
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.next_update.is_some_and(|next| now > next)
    }
}

/// Published set of CRLs keyed by authority key id
#[derive(Debug, Clone, Default)]
pub struct RevocationTable {
    lists: HashMap<Vec<u8>, Arc<RevocationList>>,
}

impl RevocationTable {
    pub fn get(&self, authority_key_id: &[u8]) -> Option<&Arc<RevocationList>> {
        self.lists.get(authority_key_id)
    }

    pub fn contains(&self, authority_key_id: &[u8]) -> bool {
        self.lists.contains_key(authority_key_id)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn authority_key_ids(&self) -> impl Iterator<Item = &[u8]> {
        self.lists.keys().map(Vec::as_slice)
    }

    /// Returns the list that was replaced, if any
    fn insert(&mut self, list: RevocationList) -> Option<Arc<RevocationList>> {
        self.lists.insert(list.authority_key_id.clone(), Arc::new(list))
    }
}

/// Why a CRL file was left out of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrlRejection {
    /// Not an X.509 CRL in DER or `X509 CRL` PEM form
    Unparsable(String),
    /// Authority Key Identifier extension absent, undecodable or empty
    NoAuthorityKeyId(String),
    /// The key id names no registered authority
    UnknownAuthority { authority_key_id: Vec<u8> },
    /// The named authority's key did not verify the signature
    BadSignature {
        authority_key_id: Vec<u8>,
        reason: String,
    },
}

impl CrlRejection {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrlRejection::Unparsable(_) => ErrorKind::ParseFailure,
            CrlRejection::NoAuthorityKeyId(_) | CrlRejection::UnknownAuthority { .. } => {
                ErrorKind::BindingFailure
            }
            CrlRejection::BadSignature { .. } => ErrorKind::SignatureFailure,
        }
    }
}

impl std::fmt::Display for CrlRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrlRejection::Unparsable(reason) => write!(f, "unparsable CRL: {reason}"),
            CrlRejection::NoAuthorityKeyId(reason) => {
                write!(f, "no usable authority key identifier: {reason}")
            }
            CrlRejection::UnknownAuthority { authority_key_id } => write!(
                f,
                "no CA loaded for authority key id {}",
                hex::encode(authority_key_id)
            ),
            CrlRejection::BadSignature {
                authority_key_id,
                reason,
            } => write!(
                f,
                "signature check against authority {} failed: {reason}",
                hex::encode(authority_key_id)
            ),
        }
    }
}

impl From<CrlRejection> for TrustError {
    fn from(rejection: CrlRejection) -> Self {
        let message = rejection.to_string();
        match rejection.kind() {
            ErrorKind::ParseFailure => TrustError::ParseFailure(message),
            ErrorKind::SignatureFailure => TrustError::SignatureFailure(message),
            _ => TrustError::BindingFailure(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrlStatus {
    Accepted { authority_key_id: Vec<u8> },
    Skipped(CrlRejection),
}

/// Result for one CRL file in a reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlOutcome {
    pub path: PathBuf,
    pub status: CrlStatus,
}

impl CrlOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, CrlStatus::Accepted { .. })
    }
}

/// Per-file results of a completed reload, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub outcomes: Vec<CrlOutcome>,
    /// Registered authorities left without a CRL, sorted by key id
    pub missing_authorities: Vec<Vec<u8>>,
}

impl ReloadReport {
    pub fn accepted(&self) -> impl Iterator<Item = &CrlOutcome> {
        self.outcomes.iter().filter(|o| o.is_accepted())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &CrlOutcome> {
        self.outcomes.iter().filter(|o| !o.is_accepted())
    }
}

/// Live revocation table shared between the reload path and request handlers
pub struct RevocationStore {
    table: ArcSwap<RevocationTable>,
}

impl RevocationStore {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RevocationTable::default()),
        }
    }

    /// The currently published table
    pub fn snapshot(&self) -> Arc<RevocationTable> {
        self.table.load_full()
    }

    /// Rebuild the table from `crl_files`, processed in order.
    ///
    /// Lists that cannot be parsed, bound to a registered authority or
    /// verified are skipped and reported. When two files bind to the same
    /// authority the later one wins. The new table is published only after
    /// every file has been handled.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Io`] if any file cannot be read. Nothing is
    /// published in that case and the previous table stays live.
    pub async fn reload(&self, registry: &AuthorityRegistry, crl_files: &[PathBuf]) -> Result<ReloadReport> {
        let authorities = registry.snapshot();
        let mut table = RevocationTable::default();
        let mut report = ReloadReport::default();

        for path in crl_files {
            let data = tokio::fs::read(path).await.map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "Failed to read CRL; aborting reload");
                TrustError::io(path, e)
            })?;

            let status = match validate_crl(&data, path, |aki| authorities.get(aki).cloned()) {
                Ok(list) => {
                    let authority_key_id = list.authority_key_id.clone();
                    tracing::info!(
                        path = %path.display(),
                        authority_key_id = %hex::encode(&authority_key_id),
                        revoked = list.revoked_serials.len(),
                        "Loaded CRL for authority"
                    );
                    if let Some(previous) = table.insert(list) {
                        tracing::info!(
                            authority_key_id = %hex::encode(&authority_key_id),
                            replaced = %previous.source.display(),
                            "CRL replaces one loaded earlier in this reload"
                        );
                    }
                    CrlStatus::Accepted { authority_key_id }
                }
                Err(rejection) => {
                    log_rejection(path, &rejection, authorities.len());
                    CrlStatus::Skipped(rejection)
                }
            };

            report.outcomes.push(CrlOutcome {
                path: path.clone(),
                status,
            });
        }

        let mut missing: Vec<Vec<u8>> = authorities
            .keys()
            .filter(|key_id| !table.contains(key_id))
            .cloned()
            .collect();
        missing.sort();
        for key_id in &missing {
            tracing::warn!(
                authority_key_id = %hex::encode(key_id),
                "No CRL loaded for authority; certificates it issued cannot be revoked"
            );
        }
        report.missing_authorities = missing;

        self.table.store(Arc::new(table));
        tracing::info!(
            accepted = report.accepted().count(),
            skipped = report.skipped().count(),
            "Published revocation table"
        );
        Ok(report)
    }

    /// Check a DER client certificate against the published table.
    ///
    /// A certificate whose issuer has no CRL is not revoked.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ParseFailure`] if the certificate cannot be parsed.
    pub fn is_revoked(&self, cert_der: &[u8]) -> Result<bool> {
        let (_rem, cert) = X509Certificate::from_der(cert_der)
            .map_err(|e| TrustError::ParseFailure(format!("Failed to parse client certificate: {e}")))?;

        let Some(authority_key_id) = authority_key_id(cert.extensions()) else {
            return Ok(false);
        };

        let table = self.table.load();
        Ok(table
            .get(&authority_key_id)
            .is_some_and(|list| list.is_revoked(&cert.serial.to_str_radix(16))))
    }
}

impl Default for RevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RevocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationStore")
            .field("lists", &self.table.load().len())
            .finish()
    }
}

/// Parse, bind and verify one CRL.
fn validate_crl<F>(
    data: &[u8],
    source: &Path,
    lookup: F,
) -> std::result::Result<RevocationList, CrlRejection>
where
    F: Fn(&[u8]) -> Option<Arc<CertificateAuthority>>,
{
    let der = crl_der(data)?;
    let (_rem, crl) = CertificateRevocationList::from_der(&der)
        .map_err(|e| CrlRejection::Unparsable(e.to_string()))?;

    let authority_key_id = authority_key_id(crl.extensions()).ok_or_else(|| {
        CrlRejection::NoAuthorityKeyId("extension missing, undecodable or without a key id".to_string())
    })?;

    let issuer = lookup(&authority_key_id).ok_or_else(|| CrlRejection::UnknownAuthority {
        authority_key_id: authority_key_id.clone(),
    })?;

    let issuer_cert = issuer.certificate().map_err(|e| CrlRejection::BadSignature {
        authority_key_id: authority_key_id.clone(),
        reason: e.to_string(),
    })?;
    crl.verify_signature(issuer_cert.public_key())
        .map_err(|e| CrlRejection::BadSignature {
            authority_key_id: authority_key_id.clone(),
            reason: e.to_string(),
        })?;

    let this_update = to_utc(crl.last_update())
        .ok_or_else(|| CrlRejection::Unparsable("thisUpdate is out of range".to_string()))?;
    let next_update = crl
        .next_update()
        .map(|time| {
            to_utc(time).ok_or_else(|| CrlRejection::Unparsable("nextUpdate is out of range".to_string()))
        })
        .transpose()?;

    let revoked_serials = crl
        .iter_revoked_certificates()
        .map(|revoked| revoked.serial().to_str_radix(16))
        .collect();

    Ok(RevocationList {
        authority_key_id,
        issuer: Arc::clone(&issuer),
        revoked_serials,
        this_update,
        next_update,
        crl_number: crl.crl_number().map(|n| n.to_str_radix(16)),
        source: source.to_path_buf(),
        verified: true,
    })
}

/// DER bytes of a CRL file, unwrapping an `X509 CRL` PEM block if present.
fn crl_der(data: &[u8]) -> std::result::Result<Cow<'_, [u8]>, CrlRejection> {
    let body = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .and_then(|start| data.get(start..))
        .unwrap_or_default();
    if !body.starts_with(PEM_BEGIN) {
        return Ok(Cow::Borrowed(data));
    }

    let block = ::pem::parse(body).map_err(|e| CrlRejection::Unparsable(format!("invalid PEM: {e}")))?;
    if block.tag() != CRL_PEM_TAG {
        return Err(CrlRejection::Unparsable(format!(
            "expected PEM block '{CRL_PEM_TAG}', found '{}'",
            block.tag()
        )));
    }
    Ok(Cow::Owned(block.into_contents()))
}

/// Key id from an Authority Key Identifier extension (OID 2.5.29.35).
///
/// Absent, undecodable and empty identifiers all yield `None`.
fn authority_key_id(extensions: &[X509Extension<'_>]) -> Option<Vec<u8>> {
    let extension = extensions
        .iter()
        .find(|ext| ext.oid == OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER)?;

    match extension.parsed_extension() {
        ParsedExtension::AuthorityKeyIdentifier(aki) => aki
            .key_identifier
            .as_ref()
            .map(|key_id| key_id.0.to_vec())
            .filter(|key_id| !key_id.is_empty()),
        _ => None,
    }
}

fn log_rejection(path: &Path, rejection: &CrlRejection, loaded_authorities: usize) {
    match rejection {
        CrlRejection::Unparsable(reason) => {
            tracing::warn!(path = %path.display(), error = %reason, "Failed to parse CRL; skipping");
        }
        CrlRejection::NoAuthorityKeyId(reason) => {
            tracing::warn!(
                path = %path.display(),
                error = %reason,
                "CRL has no usable Authority Key Identifier; skipping"
            );
        }
        CrlRejection::UnknownAuthority { authority_key_id } => {
            tracing::warn!(
                path = %path.display(),
                authority_key_id = %hex::encode(authority_key_id),
                loaded_authorities,
                "CRL names an authority that is not loaded; skipping"
            );
        }
        CrlRejection::BadSignature {
            authority_key_id,
            reason,
        } => {
            tracing::error!(
                path = %path.display(),
                authority_key_id = %hex::encode(authority_key_id),
                error = %reason,
                "CRL signature check failed; skipping"
            );
        }
    }
}

fn to_utc(time: ASN1Time) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(time.timestamp(), 0)
}

fn normalize_serial(serial: &str) -> String {
    let hex: String = serial
        .chars()
        .filter(|c| *c != ':')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
