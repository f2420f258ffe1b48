use crate::codes::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Error type shared by the trust store, the identity resolver and the gateway
#[derive(Error, Debug)]
pub enum TrustError {
    /// No unambiguous identity could be resolved for the request
    #[error("Missing role: {0}")]
    MissingRole(String),

    /// PEM, certificate or CRL data could not be parsed
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// A CRL has no usable authority key identifier or names an unknown authority
    #[error("Binding failure: {0}")]
    BindingFailure(String),

    /// A CRL signature did not verify
    #[error("Signature failure: {0}")]
    SignatureFailure(String),

    /// A required file could not be read
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bundle file produced zero trusted certificates
    #[error("Failed to load any certificates from file '{}'", .0.display())]
    NoCertificates(PathBuf),

    /// Invalid configuration, including TLS material that cannot be assembled
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TrustError {
    pub fn missing_role(message: impl Into<String>) -> Self {
        TrustError::MissingRole(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrustError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TrustError::MissingRole(_) => ErrorKind::MissingRole,
            TrustError::ParseFailure(_) => ErrorKind::ParseFailure,
            TrustError::BindingFailure(_) => ErrorKind::BindingFailure,
            TrustError::SignatureFailure(_) => ErrorKind::SignatureFailure,
            TrustError::Io { .. } => ErrorKind::IoFailure,
            TrustError::NoCertificates(_) | TrustError::Configuration(_) => {
                ErrorKind::Configuration
            }
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// True only for identity resolution failures
    pub fn is_missing_role(&self) -> bool {
        self.kind() == ErrorKind::MissingRole
    }
}

/// Result type alias for trust subsystem operations
pub type Result<T> = std::result::Result<T, TrustError>;

/// Log an error with its kind and code attached
pub fn log_error(context: &str, error: &TrustError) {
    tracing::error!(
        context = context,
        error_kind = %error.kind(),
        error_code = error.code(),
        error = %error,
        "Trust subsystem error occurred"
    );
}
