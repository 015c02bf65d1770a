//! Shell host sessions.
//!
//! The window and renderer are external; the proxy here is the network
//! side of a session that raises lifecycle events into a pipeline.

pub mod ca;
pub mod proxy;
pub mod tls;

pub use ca::CertificateAuthority;
pub use proxy::ProxySession;
pub use tls::{client_config, PolicyCertVerifier};
