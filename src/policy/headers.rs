//! Outbound header rewrite policy.

use hyper::header::{
    HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, USER_AGENT,
};

use crate::config::schema::{
    parse_header_value, HeaderPolicyConfig, DEFAULT_ACCEPT, DEFAULT_ACCEPT_LANGUAGE,
    DEFAULT_CACHE_CONTROL, DEFAULT_PRAGMA, DEFAULT_USER_AGENT,
};
use crate::error::ShellPolicyError;
use crate::policy::event::OutboundRequest;
use crate::policy::RequestHandler;

/// Headers whose values are owned by the policy.
pub static CONTROLLED_HEADERS: [HeaderName; 5] =
    [USER_AGENT, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA];

/// Forces a fixed browser identity and no-cache directives onto every request.
#[derive(Debug, Clone)]
pub struct HeaderRewritePolicy {
    values: [HeaderValue; 5],
}

impl Default for HeaderRewritePolicy {
    fn default() -> Self {
        Self {
            values: [
                HeaderValue::from_static(DEFAULT_USER_AGENT),
                HeaderValue::from_static(DEFAULT_ACCEPT),
                HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
                HeaderValue::from_static(DEFAULT_CACHE_CONTROL),
                HeaderValue::from_static(DEFAULT_PRAGMA),
            ],
        }
    }
}

impl HeaderRewritePolicy {
    /// Build the policy from configured values.
    pub fn from_config(config: &HeaderPolicyConfig) -> Result<Self, ShellPolicyError> {
        Ok(Self {
            values: [
                parse_header_value(USER_AGENT.as_str(), &config.user_agent)?,
                parse_header_value(ACCEPT.as_str(), &config.accept)?,
                parse_header_value(ACCEPT_LANGUAGE.as_str(), &config.accept_language)?,
                parse_header_value(CACHE_CONTROL.as_str(), &config.cache_control)?,
                parse_header_value(PRAGMA.as_str(), &config.pragma)?,
            ],
        })
    }

    /// Whether a header's value is overwritten by this policy.
    pub fn is_controlled(name: &HeaderName) -> bool {
        CONTROLLED_HEADERS.contains(name)
    }

    /// Overwrite the five controlled headers; everything else passes through.
    pub fn rewrite(&self, mut request: OutboundRequest) -> OutboundRequest {
        for (name, value) in CONTROLLED_HEADERS.iter().zip(self.values.iter()) {
            // insert drops every earlier value for the key
            request.headers.insert(name.clone(), value.clone());
        }
        request
    }
}

impl RequestHandler for HeaderRewritePolicy {
    fn on_request(&self, request: OutboundRequest) -> OutboundRequest {
        self.rewrite(request)
    }
}
