//! Policy functions and the handler interfaces a shell host invokes.
//!
//! Every handler is stateless with respect to individual requests: it takes
//! one event by value and returns one decision.

pub mod cors;
pub mod event;
pub mod headers;
pub mod trust;

pub use cors::ResponsePolicyInjector;
pub use event::{
    CertificateChain, CertificateErrorCode, CertificateValidationEvent, InboundResponse,
    OutboundRequest,
};
pub use headers::HeaderRewritePolicy;
pub use trust::{CertificateTrustOverride, StandardValidation};

/// Handles a request before its headers are sent.
pub trait RequestHandler: Send + Sync {
    fn on_request(&self, request: OutboundRequest) -> OutboundRequest;
}

/// Handles a response once its headers are received.
pub trait ResponseHandler: Send + Sync {
    fn on_response(&self, response: InboundResponse) -> InboundResponse;
}

/// Decides whether a certificate that failed validation is trusted anyway.
pub trait CertificateHandler: Send + Sync {
    fn on_certificate_error(&self, event: CertificateValidationEvent) -> bool;
}
