//! Identity resolution strategies

use crate::config::IdentityConfig;
use crate::models::{IdentityClaim, PeerCertificates};
use error_common::{Result, TrustError};
use http::header::HeaderName;
use http::request::Parts;
use http::{Extensions, HeaderMap, Request};
use std::sync::Arc;
use x509_parser::prelude::*;

/// Caller-supplied resolution function
pub type ResolveFn = dyn Fn(&HeaderMap, &Extensions) -> Result<IdentityClaim> + Send + Sync;

/// How a request's role is determined. Chosen once at startup.
#[derive(Clone)]
pub enum IdentityResolver {
    /// Common Name of the leaf certificate in [`PeerCertificates`].
    ///
    /// A leaf whose subject has no Common Name, or an empty one, resolves to
    /// [`TrustError::MissingRole`] rather than an empty role. A leaf that is
    /// not X.509 at all is a [`TrustError::ParseFailure`].
    MutualTls,
    /// Single value of the named header
    Header { name: HeaderName },
    /// Embedder-provided strategy
    Custom(Arc<ResolveFn>),
}

impl IdentityResolver {
    /// Pick the built-in strategy for this deployment.
    ///
    /// Mutual TLS is used whenever a client certificate trust pool was
    /// handed to the TLS layer; otherwise the configured header is used.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] if the header name is invalid.
    pub fn select(client_auth_configured: bool, config: &IdentityConfig) -> Result<Self> {
        let resolver = if client_auth_configured {
            Self::MutualTls
        } else {
            Self::header(&config.role_header)?
        };
        tracing::info!(strategy = resolver.strategy_name(), "Identity resolver selected");
        Ok(resolver)
    }

    /// Header strategy for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] if `name` is not a valid header name.
    pub fn header(name: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TrustError::Configuration(format!("Invalid role header '{name}': {e}")))?;
        Ok(Self::Header { name })
    }

    pub fn custom<F>(resolve: F) -> Self
    where
        F: Fn(&HeaderMap, &Extensions) -> Result<IdentityClaim> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(resolve))
    }

    pub fn strategy_name(&self) -> &'static str {
        match self {
            Self::MutualTls => "mtls",
            Self::Header { .. } => "header",
            Self::Custom(_) => "custom",
        }
    }

    /// Resolve the caller's role.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::MissingRole`] when no single unambiguous role is
    /// available, and [`TrustError::ParseFailure`] if the peer certificate
    /// cannot be parsed.
    pub fn resolve(&self, headers: &HeaderMap, extensions: &Extensions) -> Result<IdentityClaim> {
        match self {
            Self::MutualTls => role_from_peer_certificate(extensions.get::<PeerCertificates>()),
            Self::Header { name } => role_from_header(headers, name),
            Self::Custom(resolve) => resolve(headers, extensions),
        }
    }

    /// Resolve from a full request
    ///
    /// # Errors
    ///
    /// See [`IdentityResolver::resolve`].
    pub fn resolve_request<B>(&self, request: &Request<B>) -> Result<IdentityClaim> {
        self.resolve(request.headers(), request.extensions())
    }

    /// Resolve from request parts
    ///
    /// # Errors
    ///
    /// See [`IdentityResolver::resolve`].
    pub fn resolve_parts(&self, parts: &Parts) -> Result<IdentityClaim> {
        self.resolve(&parts.headers, &parts.extensions)
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MutualTls => f.write_str("MutualTls"),
            Self::Header { name } => f.debug_struct("Header").field("name", name).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn role_from_peer_certificate(peer: Option<&PeerCertificates>) -> Result<IdentityClaim> {
    let leaf = peer
        .and_then(PeerCertificates::leaf)
        .ok_or_else(|| TrustError::missing_role("client did not provide certificate"))?;

    let (_rem, cert) = X509Certificate::from_der(leaf)
        .map_err(|e| TrustError::ParseFailure(format!("Failed to parse client certificate: {e}")))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .filter(|cn| !cn.is_empty())
        .ok_or_else(|| TrustError::missing_role("client certificate has no common name"))?;

    Ok(IdentityClaim::new(common_name))
}

fn role_from_header(headers: &HeaderMap, name: &HeaderName) -> Result<IdentityClaim> {
    let mut values = headers.get_all(name).iter();

    let value = values
        .next()
        .ok_or_else(|| TrustError::missing_role(format!("client did not send '{name}' header")))?;

    if values.next().is_some() {
        tracing::warn!(header = %name, "Rejecting request with repeated role header");
        return Err(TrustError::missing_role(format!(
            "client sent multiple '{name}' headers"
        )));
    }

    let role = std::str::from_utf8(value.as_bytes())
        .map_err(|_| TrustError::missing_role(format!("'{name}' header is not valid UTF-8")))?;

    Ok(IdentityClaim::new(role))
}
