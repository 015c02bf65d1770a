//! Certificate trust decisions.
//!
//! [`CertificateTrustOverride`] accepts every certificate that failed
//! validation. It disables transport security for the embedded content and
//! is only registered when insecure mode is switched on. Without it the
//! pipeline registers [`StandardValidation`], which leaves the failure in
//! place.

use crate::policy::event::CertificateValidationEvent;
use crate::policy::CertificateHandler;

/// Treats every failed certificate as trusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateTrustOverride;

impl CertificateTrustOverride {
    /// Always returns `true`, whatever the failure reason.
    pub fn decide(&self, _event: CertificateValidationEvent) -> bool {
        true
    }
}

impl CertificateHandler for CertificateTrustOverride {
    fn on_certificate_error(&self, event: CertificateValidationEvent) -> bool {
        self.decide(event)
    }
}

/// Keeps the verdict of normal certificate validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardValidation;

impl StandardValidation {
    pub fn decide(&self, _event: CertificateValidationEvent) -> bool {
        false
    }
}

impl CertificateHandler for StandardValidation {
    fn on_certificate_error(&self, event: CertificateValidationEvent) -> bool {
        self.decide(event)
    }
}
