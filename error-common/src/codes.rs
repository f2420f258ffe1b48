// Error codes for the trust subsystem
// Codes are stable strings so they can be surfaced in proxy responses and logs.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod identity {
    pub const MISSING_ROLE: &str = "IDENTITY_1001";
}

pub mod revocation {
    pub const PARSE_FAILURE: &str = "CRL_2001";
    pub const BINDING_FAILURE: &str = "CRL_2002";
    pub const SIGNATURE_FAILURE: &str = "CRL_2003";
}

pub mod io {
    pub const IO_FAILURE: &str = "IO_3001";
}

pub mod configuration {
    pub const INVALID_CONFIGURATION: &str = "CONFIG_4001";
}

/// Category of a [`crate::TrustError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller's identity could not be determined unambiguously
    MissingRole,
    /// Certificate, CRL, or PEM data could not be parsed
    ParseFailure,
    /// A CRL could not be bound to a registered authority
    BindingFailure,
    /// A CRL signature did not verify against its authority's key
    SignatureFailure,
    /// A required file could not be read
    IoFailure,
    /// Invalid or incomplete configuration
    Configuration,
}

impl ErrorKind {
    /// Stable error code for this kind
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::MissingRole => identity::MISSING_ROLE,
            ErrorKind::ParseFailure => revocation::PARSE_FAILURE,
            ErrorKind::BindingFailure => revocation::BINDING_FAILURE,
            ErrorKind::SignatureFailure => revocation::SIGNATURE_FAILURE,
            ErrorKind::IoFailure => io::IO_FAILURE,
            ErrorKind::Configuration => configuration::INVALID_CONFIGURATION,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MissingRole => "missing_role",
            ErrorKind::ParseFailure => "parse_failure",
            ErrorKind::BindingFailure => "binding_failure",
            ErrorKind::SignatureFailure => "signature_failure",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(name)
    }
}
