//! Inbound cross-origin header injection.

use hyper::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};

use crate::config::schema::{
    parse_header_value, CorsPolicyConfig, DEFAULT_ALLOW_CREDENTIALS, DEFAULT_ALLOW_HEADERS,
    DEFAULT_ALLOW_METHODS, DEFAULT_ALLOW_ORIGIN,
};
use crate::error::ShellPolicyError;
use crate::policy::event::InboundResponse;
use crate::policy::ResponseHandler;

/// Headers appended to every response, in append order.
pub static INJECTED_HEADERS: [HeaderName; 4] = [
    ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_CREDENTIALS,
];

/// Grants the renderer cross-origin access to every response.
///
/// Values are appended, never inserted: origin-set access-control headers
/// stay visible, and the injected value is the last one for each name.
/// Applying the injector twice therefore yields two duplicate sets.
#[derive(Debug, Clone)]
pub struct ResponsePolicyInjector {
    values: [HeaderValue; 4],
}

impl Default for ResponsePolicyInjector {
    fn default() -> Self {
        Self {
            values: [
                HeaderValue::from_static(DEFAULT_ALLOW_ORIGIN),
                HeaderValue::from_static(DEFAULT_ALLOW_METHODS),
                HeaderValue::from_static(DEFAULT_ALLOW_HEADERS),
                HeaderValue::from_static(DEFAULT_ALLOW_CREDENTIALS),
            ],
        }
    }
}

impl ResponsePolicyInjector {
    /// Build the injector from configured values.
    pub fn from_config(config: &CorsPolicyConfig) -> Result<Self, ShellPolicyError> {
        Ok(Self {
            values: [
                parse_header_value(ACCESS_CONTROL_ALLOW_ORIGIN.as_str(), &config.allow_origin)?,
                parse_header_value(ACCESS_CONTROL_ALLOW_METHODS.as_str(), &config.allow_methods)?,
                parse_header_value(ACCESS_CONTROL_ALLOW_HEADERS.as_str(), &config.allow_headers)?,
                parse_header_value(
                    ACCESS_CONTROL_ALLOW_CREDENTIALS.as_str(),
                    &config.allow_credentials,
                )?,
            ],
        })
    }

    /// Append the four cross-origin headers.
    pub fn inject(&self, mut response: InboundResponse) -> InboundResponse {
        for (name, value) in INJECTED_HEADERS.iter().zip(self.values.iter()) {
            response.headers.append(name.clone(), value.clone());
        }
        response
    }
}

impl ResponseHandler for ResponsePolicyInjector {
    fn on_response(&self, response: InboundResponse) -> InboundResponse {
        self.inject(response)
    }
}
