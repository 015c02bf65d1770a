//! Shell Policy - request/response interception for embedded web content.
//!
//! A desktop shell routes its renderer's traffic through an interception
//! pipeline that:
//! - rewrites outbound request headers to a fixed browser identity
//! - appends permissive cross-origin headers to every response
//! - optionally trusts certificates that fail validation (insecure mode)
//!
//! Insecure mode disables TLS certificate validation for the embedded
//! content. It is off by default and must be switched on explicitly.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod policy;
pub mod utils;

pub use config::{CorsPolicyConfig, HeaderPolicyConfig, ProxyConfig, ShellPolicyConfig};
pub use error::{ConfigError, Result, ShellPolicyError};
pub use host::ProxySession;
pub use pipeline::{HandlerSlots, InterceptionPipeline, Registered, SessionHandle, Unregistered};
pub use policy::{
    CertificateTrustOverride, CertificateValidationEvent, HeaderRewritePolicy, InboundResponse,
    OutboundRequest, ResponsePolicyInjector,
};

