use rustls::pki_types::CertificateDer;
use serde::{Deserialize, Serialize};

/// The caller's resolved role for one request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub role: String,
}

impl IdentityClaim {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

impl std::fmt::Display for IdentityClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.role)
    }
}

/// Verified client certificate chain, leaf first.
///
/// The TLS acceptor stores this in the request extensions after the
/// handshake; an empty chain means the client presented no certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerCertificates(pub Vec<CertificateDer<'static>>);

impl PeerCertificates {
    pub fn new(chain: Vec<CertificateDer<'static>>) -> Self {
        Self(chain)
    }

    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.0.first()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[CertificateDer<'static>]> for PeerCertificates {
    fn from(chain: &[CertificateDer<'static>]) -> Self {
        Self(chain.to_vec())
    }
}
