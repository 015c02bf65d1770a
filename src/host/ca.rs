//! Interception certificate authority.
//!
//! CONNECT tunnels are terminated locally with a leaf certificate issued
//! for the tunnel's host. The authority is generated per process and lives
//! in memory only; the renderer must be told to trust [`cert_pem`].
//!
//! [`cert_pem`]: CertificateAuthority::cert_pem

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;

use crate::error::ShellPolicyError;

const CA_COMMON_NAME: &str = "Shell Policy Interception CA";

/// Issued host configs kept before the cache is reset.
const MAX_CACHED_HOSTS: usize = 1000;

pub struct CertificateAuthority {
    issuer: Issuer<'static, KeyPair>,
    cert_der: CertificateDer<'static>,
    cert_pem: String,
    provider: Arc<CryptoProvider>,
    issued: Mutex<HashMap<String, Arc<ServerConfig>>>,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("issued", &self.issued.lock().len())
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// Generate a fresh self-signed authority.
    pub fn generate(provider: Arc<CryptoProvider>) -> Result<Self, ShellPolicyError> {
        let key = KeyPair::generate().map_err(ca_error)?;

        let mut params = CertificateParams::new(Vec::<String>::new()).map_err(ca_error)?;
        params.distinguished_name.push(DnType::CommonName, CA_COMMON_NAME);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let cert = params.self_signed(&key).map_err(ca_error)?;
        tracing::debug!("Generated interception CA");

        Ok(Self {
            cert_der: cert.der().clone(),
            cert_pem: cert.pem(),
            issuer: Issuer::new(params, key),
            provider,
            issued: Mutex::new(HashMap::new()),
        })
    }

    pub fn cert_der(&self) -> &CertificateDer<'static> {
        &self.cert_der
    }

    /// PEM form of the authority certificate, for the renderer's trust store.
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// TLS server config presenting a certificate for `host`.
    pub fn server_config(&self, host: &str) -> Result<Arc<ServerConfig>, ShellPolicyError> {
        if let Some(config) = self.issued.lock().get(host) {
            return Ok(config.clone());
        }

        let config = Arc::new(self.issue(host)?);

        let mut issued = self.issued.lock();
        if issued.len() >= MAX_CACHED_HOSTS {
            issued.clear();
        }
        issued.insert(host.to_string(), config.clone());

        Ok(config)
    }

    fn issue(&self, host: &str) -> Result<ServerConfig, ShellPolicyError> {
        let key = KeyPair::generate().map_err(ca_error)?;

        // IP literals become IP subject alt names
        let mut params = CertificateParams::new(vec![host.to_string()]).map_err(ca_error)?;
        params.distinguished_name.push(DnType::CommonName, host);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

        let cert = params.signed_by(&key, &self.issuer).map_err(ca_error)?;
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()));

        let mut config = ServerConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| ShellPolicyError::Tls(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(vec![cert.der().clone(), self.cert_der.clone()], key_der)
            .map_err(|e| ShellPolicyError::Tls(e.to_string()))?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        tracing::debug!("Issued interception certificate for {}", host);
        Ok(config)
    }
}

fn ca_error(e: rcgen::Error) -> ShellPolicyError {
    ShellPolicyError::Tls(format!("certificate generation failed: {}", e))
}
