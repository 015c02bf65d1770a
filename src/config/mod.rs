//! Configuration module.

pub mod loader;
pub mod schema;

pub use loader::{default_settings_path, load_config, load_settings, parse_config, SettingsSource};
pub use schema::{
    parse_header_value, CorsPolicyConfig, HeaderPolicyConfig, ProxyConfig, ShellPolicyConfig,
};
