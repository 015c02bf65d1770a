//! Session handle: the registration surface a shell host exposes.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::policy::{
    CertificateHandler, CertificateValidationEvent, InboundResponse, OutboundRequest,
    RequestHandler, ResponseHandler,
};

/// A shell host session that network lifecycle handlers attach to.
///
/// Handlers live as long as the session holds them. There is no removal.
pub trait SessionHandle {
    /// Called before each request's headers are transmitted.
    fn on_before_send_headers(&self, handler: Arc<dyn RequestHandler>);

    /// Called once each response's headers are received.
    fn on_headers_received(&self, handler: Arc<dyn ResponseHandler>);

    /// Called when a server certificate fails validation.
    fn on_certificate_error(&self, handler: Arc<dyn CertificateHandler>);
}

/// Handler storage for a session, plus the event-raising side used by hosts.
///
/// Registering again replaces the previous handler for that event.
#[derive(Default)]
pub struct HandlerSlots {
    request: RwLock<Option<Arc<dyn RequestHandler>>>,
    response: RwLock<Option<Arc<dyn ResponseHandler>>>,
    certificate: RwLock<Option<Arc<dyn CertificateHandler>>>,
}

impl std::fmt::Debug for HandlerSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSlots")
            .field("request", &self.request.read().is_some())
            .field("response", &self.response.read().is_some())
            .field("certificate", &self.certificate.read().is_some())
            .finish()
    }
}

impl HandlerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lifecycle events with a handler attached.
    pub fn registered_count(&self) -> usize {
        [
            self.request.read().is_some(),
            self.response.read().is_some(),
            self.certificate.read().is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// Raise a request-sent event. Without a handler the request is unchanged.
    pub fn before_send_headers(&self, request: OutboundRequest) -> OutboundRequest {
        // clone out so the handler runs without the lock held
        let handler = self.request.read().clone();
        match handler {
            Some(handler) => handler.on_request(request),
            None => request,
        }
    }

    /// Raise a headers-received event. Without a handler the response is unchanged.
    pub fn headers_received(&self, response: InboundResponse) -> InboundResponse {
        let handler = self.response.read().clone();
        match handler {
            Some(handler) => handler.on_response(response),
            None => response,
        }
    }

    /// Raise a certificate-error event. Without a handler the failure stands.
    pub fn certificate_error(&self, event: CertificateValidationEvent) -> bool {
        let handler = self.certificate.read().clone();
        match handler {
            Some(handler) => handler.on_certificate_error(event),
            None => false,
        }
    }
}

impl SessionHandle for HandlerSlots {
    fn on_before_send_headers(&self, handler: Arc<dyn RequestHandler>) {
        if self.request.write().replace(handler).is_some() {
            tracing::warn!("Replacing existing before-send-headers handler");
        }
    }

    fn on_headers_received(&self, handler: Arc<dyn ResponseHandler>) {
        if self.response.write().replace(handler).is_some() {
            tracing::warn!("Replacing existing headers-received handler");
        }
    }

    fn on_certificate_error(&self, handler: Arc<dyn CertificateHandler>) {
        if self.certificate.write().replace(handler).is_some() {
            tracing::warn!("Replacing existing certificate-error handler");
        }
    }
}
