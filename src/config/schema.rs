//! Configuration schema for the interception layer.

use hyper::header::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ShellPolicyError};

/// Browser User-Agent sent on every outbound request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT: &str = "*/*";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
pub const DEFAULT_CACHE_CONTROL: &str = "no-cache";
pub const DEFAULT_PRAGMA: &str = "no-cache";

pub const DEFAULT_ALLOW_ORIGIN: &str = "*";
pub const DEFAULT_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const DEFAULT_ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Requested-With";
pub const DEFAULT_ALLOW_CREDENTIALS: &str = "true";

/// Values forced onto every outbound request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderPolicyConfig {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub cache_control: String,
    pub pragma: String,
}

impl Default for HeaderPolicyConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            pragma: DEFAULT_PRAGMA.to_string(),
        }
    }
}

/// Cross-origin headers appended to every inbound response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorsPolicyConfig {
    /// Append the headers at all.
    pub enabled: bool,
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
    pub allow_credentials: String,
}

impl Default for CorsPolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origin: DEFAULT_ALLOW_ORIGIN.to_string(),
            allow_methods: DEFAULT_ALLOW_METHODS.to_string(),
            allow_headers: DEFAULT_ALLOW_HEADERS.to_string(),
            allow_credentials: DEFAULT_ALLOW_CREDENTIALS.to_string(),
        }
    }
}

/// Proxy host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    /// Port to listen on (0 picks any free port).
    pub listen_port: u16,

    /// Terminate CONNECT tunnels with the interception CA so HTTPS traffic
    /// passes through the policies. Off relays tunnels untouched.
    pub intercept_connect: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_port: 0,
            intercept_connect: true,
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShellPolicyConfig {
    /// Trust every certificate that fails validation. Off unless opted in.
    #[serde(default)]
    pub insecure_mode: bool,

    /// Outbound header rewrite values.
    #[serde(default)]
    pub headers: HeaderPolicyConfig,

    /// Inbound cross-origin header values.
    #[serde(default)]
    pub cors: CorsPolicyConfig,

    /// Proxy host settings.
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl ShellPolicyConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ShellPolicyError> {
        let h = &self.headers;
        validate_header_value("user-agent", &h.user_agent)?;
        validate_header_value("accept", &h.accept)?;
        validate_header_value("accept-language", &h.accept_language)?;
        validate_header_value("cache-control", &h.cache_control)?;
        validate_header_value("pragma", &h.pragma)?;

        let c = &self.cors;
        validate_header_value("access-control-allow-origin", &c.allow_origin)?;
        validate_header_value("access-control-allow-methods", &c.allow_methods)?;
        validate_header_value("access-control-allow-headers", &c.allow_headers)?;
        validate_header_value("access-control-allow-credentials", &c.allow_credentials)?;

        Ok(())
    }
}

/// Parse a configured string into a header value.
pub fn parse_header_value(header: &str, value: &str) -> Result<HeaderValue, ShellPolicyError> {
    if value.is_empty() {
        return Err(ConfigError::InvalidHeaderValue {
            header: header.to_string(),
            reason: "value cannot be empty".to_string(),
        }
        .into());
    }

    HeaderValue::from_str(value).map_err(|e| {
        ConfigError::InvalidHeaderValue {
            header: header.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn validate_header_value(header: &str, value: &str) -> Result<(), ShellPolicyError> {
    parse_header_value(header, value).map(|_| ())
}
