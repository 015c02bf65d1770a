//! TLS client configuration whose certificate failures are decided by the
//! session's certificate handler.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::ShellPolicyError;
use crate::pipeline::HandlerSlots;
use crate::policy::{CertificateChain, CertificateErrorCode, CertificateValidationEvent};

/// Runs standard WebPKI validation and hands failures to the session.
#[derive(Debug)]
pub struct PolicyCertVerifier {
    inner: Arc<WebPkiServerVerifier>,
    slots: Arc<HandlerSlots>,
}

impl PolicyCertVerifier {
    /// Verifier backed by the bundled Mozilla root set.
    pub fn new(slots: Arc<HandlerSlots>, provider: Arc<CryptoProvider>) -> Result<Self, ShellPolicyError> {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|e| ShellPolicyError::Tls(e.to_string()))?;

        Ok(Self { inner, slots })
    }
}

impl ServerCertVerifier for PolicyCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let reason = match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Ok(verified) => return Ok(verified),
            Err(rustls::Error::InvalidCertificate(reason)) => reason,
            Err(e) => return Err(e),
        };

        let event = CertificateValidationEvent::new(
            server_name.to_str().into_owned(),
            CertificateChain {
                end_entity: end_entity.as_ref().to_vec(),
                intermediates: intermediates.iter().map(|c| c.as_ref().to_vec()).collect(),
            },
            error_code(&reason),
        );

        if self.slots.certificate_error(event) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(reason))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Translate a rustls certificate failure into an event error code.
///
/// The WebPKI verifier reports time and name failures with their `*Context`
/// variants; the bare variants come from custom verifiers.
pub fn error_code(error: &CertificateError) -> CertificateErrorCode {
    match error {
        CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
            CertificateErrorCode::Expired
        }
        CertificateError::NotValidYet | CertificateError::NotValidYetContext { .. } => {
            CertificateErrorCode::NotYetValid
        }
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. } => {
            CertificateErrorCode::NameMismatch
        }
        CertificateError::InvalidPurpose | CertificateError::InvalidPurposeContext { .. } => {
            CertificateErrorCode::InvalidPurpose
        }
        CertificateError::UnknownIssuer => CertificateErrorCode::UnknownIssuer,
        CertificateError::Revoked => CertificateErrorCode::Revoked,
        CertificateError::BadSignature => CertificateErrorCode::BadSignature,
        CertificateError::BadEncoding => CertificateErrorCode::BadEncoding,
        other => CertificateErrorCode::Other(format!("{:?}", other)),
    }
}

/// Build the client config used for upstream HTTPS connections.
pub fn client_config(slots: Arc<HandlerSlots>) -> Result<ClientConfig, ShellPolicyError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = PolicyCertVerifier::new(slots, provider.clone())?;

    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ShellPolicyError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(config)
}
