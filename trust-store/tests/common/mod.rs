//! Certificate and CRL fixtures generated with rcgen
#![allow(dead_code)]

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CertificateRevocationListParams, DnType,
    IsCa, KeyIdMethod, KeyPair, KeyUsagePurpose, RevokedCertParams, SerialNumber,
};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use std::path::PathBuf;
use tempfile::TempDir;

const ECDSA_WITH_SHA256: &[u8] = &[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];
const OID_COMMON_NAME: &[u8] = &[0x06, 0x03, 0x55, 0x04, 0x03];
const OID_AUTHORITY_KEY_IDENTIFIER: &[u8] = &[0x06, 0x03, 0x55, 0x1d, 0x23];

/// A CA whose Subject Key Identifier is chosen by the test
pub struct TestAuthority {
    pub cert: Certificate,
    pub key: KeyPair,
    pub key_id: Vec<u8>,
}

impl TestAuthority {
    pub fn new(common_name: &str, key_id: &[u8]) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.key_identifier_method = KeyIdMethod::PreSpecified(key_id.to_vec());
        let cert = params.self_signed(&key).unwrap();

        Self {
            cert,
            key,
            key_id: key_id.to_vec(),
        }
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    /// DER CRL signed by this authority, carrying its key id
    pub fn crl(&self, crl_number: u8, revoked_serials: &[&[u8]]) -> Vec<u8> {
        let params = CertificateRevocationListParams {
            this_update: rcgen::date_time_ymd(2024, 1, 1),
            next_update: rcgen::date_time_ymd(2099, 1, 1),
            crl_number: SerialNumber::from_slice(&[crl_number]),
            issuing_distribution_point: None,
            revoked_certs: revoked_serials
                .iter()
                .map(|serial| RevokedCertParams {
                    serial_number: SerialNumber::from_slice(serial),
                    revocation_time: rcgen::date_time_ymd(2024, 1, 1),
                    reason_code: None,
                    invalidity_date: None,
                })
                .collect(),
            key_identifier_method: KeyIdMethod::PreSpecified(self.key_id.clone()),
        };
        params
            .signed_by(&self.cert, &self.key)
            .unwrap()
            .der()
            .to_vec()
    }

    /// CRL signed by this authority whose extensions are assembled by hand.
    ///
    /// `aki_value` is the DER body of the Authority Key Identifier extension;
    /// `None` leaves the extension out entirely.
    pub fn crl_with_raw_aki(&self, aki_value: Option<&[u8]>) -> Vec<u8> {
        let algorithm = der(0x30, ECDSA_WITH_SHA256);
        let common_name = der(0x0c, b"Hand Built CRL Issuer");
        let issuer = der(0x30, &der(0x31, &der(0x30, &[OID_COMMON_NAME, &common_name].concat())));

        let mut tbs = [
            der(0x02, &[0x01]),
            algorithm.clone(),
            issuer,
            der(0x17, b"240101000000Z"),
            der(0x17, b"491231235959Z"),
        ]
        .concat();
        if let Some(value) = aki_value {
            let extension = der(0x30, &[OID_AUTHORITY_KEY_IDENTIFIER, &der(0x04, value)].concat());
            tbs.extend(der(0xa0, &der(0x30, &extension)));
        }
        let tbs = der(0x30, &tbs);

        let rng = SystemRandom::new();
        let signer =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &self.key.serialize_der(), &rng)
                .unwrap();
        let signature = signer.sign(&rng, &tbs).unwrap();
        let bits = [&[0x00], signature.as_ref()].concat();

        der(0x30, &[tbs, algorithm, der(0x03, &bits)].concat())
    }

    /// Leaf certificate issued by this authority
    pub fn issue_leaf(&self, common_name: &str, serial: &[u8]) -> (Certificate, KeyPair) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.serial_number = Some(SerialNumber::from_slice(serial));
        params.use_authority_key_identifier_extension = true;
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        (cert, key)
    }
}

pub fn write_file(dir: &TempDir, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Single DER TLV
fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let len = content.len();
    let mut out = vec![tag];
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend([0x81, len as u8]);
    } else {
        out.extend([0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(content);
    out
}
