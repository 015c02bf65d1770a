//! Utility modules.

pub mod logging;

pub use logging::{init_logging, SHELL_POLICY_DEBUG_ENV};
