//! Network lifecycle events raised by a shell host.

use std::fmt;

use hyper::header::HeaderMap;
use hyper::{Method, StatusCode, Uri};

/// A request about to be transmitted by the embedded content.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Uri,
    pub method: Method,
    pub headers: HeaderMap,
}

impl OutboundRequest {
    /// Create a request event with an empty header set.
    pub fn new(method: Method, url: Uri) -> Self {
        Self {
            url,
            method,
            headers: HeaderMap::new(),
        }
    }

    /// Attach a header set.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// A response about to be handed back to the renderer.
#[derive(Debug, Clone)]
pub struct InboundResponse {
    pub url: Uri,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl InboundResponse {
    /// Create a response event with an empty header set.
    pub fn new(url: Uri, status: StatusCode) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
        }
    }

    /// Attach a header set.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Reason a certificate failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateErrorCode {
    Expired,
    NotYetValid,
    UnknownIssuer,
    NameMismatch,
    InvalidPurpose,
    Revoked,
    BadSignature,
    BadEncoding,
    Other(String),
}

impl fmt::Display for CertificateErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "certificate expired"),
            Self::NotYetValid => write!(f, "certificate not yet valid"),
            Self::UnknownIssuer => write!(f, "unknown issuer"),
            Self::NameMismatch => write!(f, "certificate not valid for name"),
            Self::InvalidPurpose => write!(f, "certificate not valid for this purpose"),
            Self::Revoked => write!(f, "certificate revoked"),
            Self::BadSignature => write!(f, "bad signature"),
            Self::BadEncoding => write!(f, "bad encoding"),
            Self::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// DER-encoded certificates presented by the peer.
#[derive(Debug, Clone, Default)]
pub struct CertificateChain {
    pub end_entity: Vec<u8>,
    pub intermediates: Vec<Vec<u8>>,
}

impl CertificateChain {
    /// No certificate was presented.
    pub fn is_empty(&self) -> bool {
        self.end_entity.is_empty() && self.intermediates.is_empty()
    }
}

/// A TLS certificate validation failure.
///
/// Consumed by value: a handler makes exactly one decision per event.
#[derive(Debug, Clone)]
pub struct CertificateValidationEvent {
    /// Host the connection targets.
    pub host: String,
    pub chain: CertificateChain,
    pub error: CertificateErrorCode,
}

impl CertificateValidationEvent {
    pub fn new(host: impl Into<String>, chain: CertificateChain, error: CertificateErrorCode) -> Self {
        Self {
            host: host.into(),
            chain,
            error,
        }
    }
}
