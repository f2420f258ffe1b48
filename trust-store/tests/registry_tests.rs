//! Authority registry loading from PEM bundles

mod common;

use common::{write_file, TestAuthority};
use error_common::ErrorKind;
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use trust_store::AuthorityRegistry;

const MALFORMED_BLOCK: &str = "-----BEGIN CERTIFICATE-----\n!!!not base64!!!\n-----END CERTIFICATE-----\n";
const GARBAGE_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----\nAAECAwQ=\n-----END CERTIFICATE-----\n";

fn with_pem_header(pem: &str) -> String {
    pem.replacen(
        "-----BEGIN CERTIFICATE-----\n",
        "-----BEGIN CERTIFICATE-----\nProc-Type: 4,ENCRYPTED\nDEK-Info: AES-128-CBC,00000000000000000000000000000000\n\n",
        1,
    )
}

#[test]
fn test_registry_keys_by_exact_subject_key_id_bytes() {
    let alpha = TestAuthority::new("Alpha CA", &[0x00, 0xff, 0x10, 0x80]);
    let beta = TestAuthority::new("Beta CA", &[0x7f, 0x00, 0x00]);
    let bundle = format!("{}{}", alpha.pem(), beta.pem());

    let registry = AuthorityRegistry::new();
    let mut pool: Vec<CertificateDer<'static>> = Vec::new();
    let summary = registry.load_from_pem(bundle.as_bytes(), &mut pool);

    assert!(summary.loaded_any());
    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.registered, 2);
    assert_eq!(registry.len(), 2);
    assert_eq!(pool.len(), 2, "every accepted CA goes into the trust pool");

    let found = registry.get(&[0x00, 0xff, 0x10, 0x80]).expect("alpha registered");
    assert_eq!(found.subject_key_id(), &[0x00, 0xff, 0x10, 0x80]);
    assert!(found.subject().contains("Alpha CA"));
    assert!(registry.contains(&[0x7f, 0x00, 0x00]));

    // Prefixes and hex text of the key id are different keys
    assert!(!registry.contains(&[0x00, 0xff, 0x10]));
    assert!(!registry.contains(b"00ff1080"));
}

#[test]
fn test_bad_blocks_are_skipped_without_aborting() {
    let alpha = TestAuthority::new("Alpha CA", &[0xa1]);
    let headered = TestAuthority::new("Headered CA", &[0xb2]);
    let beta = TestAuthority::new("Beta CA", &[0xc3]);

    let bundle = format!(
        "leading comment text\n{MALFORMED_BLOCK}{}{}{GARBAGE_CERTIFICATE}{}{}",
        alpha.pem(),
        with_pem_header(&headered.pem()),
        alpha.key.serialize_pem(),
        beta.pem(),
    );

    let registry = AuthorityRegistry::new();
    let mut pool: Vec<CertificateDer<'static>> = Vec::new();
    let summary = registry.load_from_pem(bundle.as_bytes(), &mut pool);

    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.skipped(), 4, "malformed, headered, garbage and private key blocks");
    assert_eq!(summary.skipped_unparsable, 1);
    assert!(registry.contains(&[0xa1]));
    assert!(registry.contains(&[0xc3]));
    assert!(!registry.contains(&[0xb2]), "blocks with PEM headers are never trusted");
}

#[test]
fn test_later_certificate_with_same_key_id_overwrites() {
    let first = TestAuthority::new("First CA", &[0x42, 0x42]);
    let second = TestAuthority::new("Second CA", &[0x42, 0x42]);

    let registry = AuthorityRegistry::new();
    let mut pool: Vec<CertificateDer<'static>> = Vec::new();
    registry.load_from_pem(first.pem().as_bytes(), &mut pool);
    registry.load_from_pem(second.pem().as_bytes(), &mut pool);

    assert_eq!(registry.len(), 1);
    let ca = registry.get(&[0x42, 0x42]).unwrap();
    assert!(ca.subject().contains("Second CA"));
}

#[test]
fn test_snapshot_is_unaffected_by_later_loads() {
    let alpha = TestAuthority::new("Alpha CA", &[0x01]);
    let beta = TestAuthority::new("Beta CA", &[0x02]);

    let registry = AuthorityRegistry::new();
    let mut pool: Vec<CertificateDer<'static>> = Vec::new();
    registry.load_from_pem(alpha.pem().as_bytes(), &mut pool);
    let before = registry.snapshot();

    registry.load_from_pem(beta.pem().as_bytes(), &mut pool);

    assert_eq!(before.len(), 1);
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn test_load_pem_file_feeds_rustls_root_store() {
    let dir = tempfile::tempdir().unwrap();
    let alpha = TestAuthority::new("Alpha CA", &[0xde, 0xad]);
    let path = write_file(&dir, "cas.pem", alpha.pem());

    let registry = AuthorityRegistry::new();
    let mut roots = RootCertStore::empty();
    let summary = registry.load_pem_file(&path, &mut roots).await.unwrap();

    assert_eq!(summary.loaded, 1);
    assert_eq!(roots.len(), 1);
    assert!(registry.contains(&[0xde, 0xad]));
}

#[tokio::test]
async fn test_load_pem_file_without_certificates_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "empty.pem", MALFORMED_BLOCK);

    let registry = AuthorityRegistry::new();
    let mut pool: Vec<CertificateDer<'static>> = Vec::new();
    let err = registry.load_pem_file(&path, &mut pool).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("empty.pem"));
}

#[tokio::test]
async fn test_load_pem_file_unreadable_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let registry = AuthorityRegistry::new();
    let mut pool: Vec<CertificateDer<'static>> = Vec::new();

    let err = registry
        .load_pem_file(&dir.path().join("missing.pem"), &mut pool)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert!(registry.is_empty());
}
