//! Interception pipeline: wires the policy functions to a session's
//! network lifecycle events.
//!
//! A pipeline starts [`Unregistered`]. [`InterceptionPipeline::register`]
//! consumes it, attaches one handler to each of the three events of the
//! given session and returns the [`Registered`] pipeline. There is no way
//! back: the handlers live as long as the session keeps them.

pub mod session;

use std::sync::Arc;

use crate::config::ShellPolicyConfig;
use crate::error::ShellPolicyError;
use crate::policy::{
    CertificateHandler, CertificateTrustOverride, CertificateValidationEvent, HeaderRewritePolicy,
    InboundResponse, OutboundRequest, RequestHandler, ResponseHandler, ResponsePolicyInjector,
    StandardValidation,
};

pub use session::{HandlerSlots, SessionHandle};

/// Pipeline not yet attached to a session. Owns its policy set, so the
/// builder methods can still change it.
#[derive(Debug)]
pub struct Unregistered {
    policies: PolicySet,
}

/// Pipeline attached to a session. The policy set is shared with the
/// session's handler slots and no longer changes.
#[derive(Debug)]
pub struct Registered {
    policies: Arc<PolicySet>,
}

/// Access to the policy set held by a pipeline state.
pub trait PipelineState {
    fn policies(&self) -> &PolicySet;
}

impl PipelineState for Unregistered {
    fn policies(&self) -> &PolicySet {
        &self.policies
    }
}

impl PipelineState for Registered {
    fn policies(&self) -> &PolicySet {
        &self.policies
    }
}

/// The three policies a pipeline registers as one handler object.
pub struct PolicySet {
    headers: HeaderRewritePolicy,
    cors: Option<ResponsePolicyInjector>,
    trust: Box<dyn CertificateHandler>,
    insecure_mode: bool,
}

impl std::fmt::Debug for PolicySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicySet")
            .field("cors", &self.cors.is_some())
            .field("insecure_mode", &self.insecure_mode)
            .finish_non_exhaustive()
    }
}

impl RequestHandler for PolicySet {
    fn on_request(&self, request: OutboundRequest) -> OutboundRequest {
        tracing::debug!("Rewriting headers for {} {}", request.method, request.url);
        self.headers.rewrite(request)
    }
}

impl ResponseHandler for PolicySet {
    fn on_response(&self, response: InboundResponse) -> InboundResponse {
        match self.cors {
            Some(ref injector) => {
                tracing::debug!("Injecting CORS headers into {} ({})", response.url, response.status);
                injector.inject(response)
            }
            None => response,
        }
    }
}

impl CertificateHandler for PolicySet {
    fn on_certificate_error(&self, event: CertificateValidationEvent) -> bool {
        let host = event.host.clone();
        let error = event.error.clone();
        let trusted = self.trust.on_certificate_error(event);

        if trusted {
            tracing::warn!("Trusting certificate for {} despite: {}", host, error);
        } else {
            tracing::debug!("Rejected certificate for {}: {}", host, error);
        }

        trusted
    }
}

fn trust_handler(insecure_mode: bool) -> Box<dyn CertificateHandler> {
    if insecure_mode {
        Box::new(CertificateTrustOverride)
    } else {
        Box::new(StandardValidation)
    }
}

/// Interception pipeline in state `S`.
#[derive(Debug)]
pub struct InterceptionPipeline<S: PipelineState = Unregistered> {
    state: S,
}

impl Default for InterceptionPipeline<Unregistered> {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptionPipeline<Unregistered> {
    /// Pipeline with the built-in policy values and insecure mode off.
    pub fn new() -> Self {
        Self::with_policies(PolicySet {
            headers: HeaderRewritePolicy::default(),
            cors: Some(ResponsePolicyInjector::default()),
            trust: trust_handler(false),
            insecure_mode: false,
        })
    }

    /// Build a pipeline from configuration.
    pub fn from_config(config: &ShellPolicyConfig) -> Result<Self, ShellPolicyError> {
        let headers = HeaderRewritePolicy::from_config(&config.headers)?;
        let cors = if config.cors.enabled {
            Some(ResponsePolicyInjector::from_config(&config.cors)?)
        } else {
            None
        };

        Ok(Self::with_policies(PolicySet {
            headers,
            cors,
            trust: trust_handler(config.insecure_mode),
            insecure_mode: config.insecure_mode,
        }))
    }

    /// Switch the certificate trust override on or off.
    pub fn insecure(mut self, enabled: bool) -> Self {
        let policies = &mut self.state.policies;
        policies.trust = trust_handler(enabled);
        policies.insecure_mode = enabled;
        self
    }

    /// Attach the handlers to a session.
    pub fn register<H>(self, session: &H) -> InterceptionPipeline<Registered>
    where
        H: SessionHandle + ?Sized,
    {
        let policies = Arc::new(self.state.policies);
        session.on_before_send_headers(policies.clone());
        session.on_headers_received(policies.clone());
        session.on_certificate_error(policies.clone());

        if policies.insecure_mode {
            tracing::warn!(
                "Insecure mode enabled: TLS certificate validation failures will be ignored"
            );
        }
        tracing::debug!(
            "Interception pipeline registered (cors: {})",
            policies.cors.is_some()
        );

        InterceptionPipeline {
            state: Registered { policies },
        }
    }

    fn with_policies(policies: PolicySet) -> Self {
        Self {
            state: Unregistered { policies },
        }
    }
}

impl<S: PipelineState> InterceptionPipeline<S> {
    /// Whether the certificate trust override is active.
    pub fn is_insecure(&self) -> bool {
        self.state.policies().insecure_mode
    }

    /// Whether responses receive the cross-origin headers.
    pub fn injects_cors(&self) -> bool {
        self.state.policies().cors.is_some()
    }

    /// Run the request policy directly.
    pub fn dispatch_request(&self, request: OutboundRequest) -> OutboundRequest {
        self.state.policies().on_request(request)
    }

    /// Run the response policy directly.
    pub fn dispatch_response(&self, response: InboundResponse) -> InboundResponse {
        self.state.policies().on_response(response)
    }

    /// Run the certificate policy directly.
    pub fn dispatch_certificate(&self, event: CertificateValidationEvent) -> bool {
        self.state.policies().on_certificate_error(event)
    }
}
