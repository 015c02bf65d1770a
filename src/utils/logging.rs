//! Log output for the proxy binary.
//!
//! `RUST_LOG` wins when set. Otherwise the crate logs at info, or at debug
//! when asked for on the command line or through `SHELL_POLICY_DEBUG`.

use tracing_subscriber::EnvFilter;

/// Environment variable that turns on debug output.
pub const SHELL_POLICY_DEBUG_ENV: &str = "SHELL_POLICY_DEBUG";

/// Install the global subscriber. Returns whether debug output is on.
pub fn init_logging(debug_flag: bool) -> bool {
    let debug = debug_requested(
        debug_flag,
        std::env::var(SHELL_POLICY_DEBUG_ENV).ok().as_deref(),
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    // a subscriber installed by an embedding host stays in place
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .try_init();

    debug
}

fn debug_requested(flag: bool, env_value: Option<&str>) -> bool {
    flag || matches!(env_value, Some(v) if !matches!(v.trim(), "" | "0" | "false"))
}

fn default_directives(debug: bool) -> &'static str {
    if debug {
        "shell_policy=debug,rustls=info,warn"
    } else {
        "shell_policy=info,warn"
    }
}
