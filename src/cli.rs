//! CLI parsing.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::ShellPolicyConfig;

/// Shell Policy - interception proxy for embedded web content
#[derive(Parser, Debug)]
#[command(name = "shell-policy")]
#[command(about = "Rewrite request headers, inject CORS headers and decide certificate trust for a desktop shell's renderer")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Path to settings file (default: ~/.shell-policy.json)
    #[arg(short = 's', long = "settings")]
    pub settings: Option<PathBuf>,

    /// Trust certificates that fail validation
    #[arg(long = "insecure")]
    pub insecure: bool,

    /// Port to listen on (overrides the settings file)
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Relay CONNECT tunnels without intercepting them
    #[arg(long = "passthrough-connect")]
    pub passthrough_connect: bool,

    /// Write the interception CA certificate (PEM) to this path
    #[arg(long = "export-ca", value_name = "PATH")]
    pub export_ca: Option<PathBuf>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Settings file given on the command line.
    pub fn settings_path(&self) -> Option<&Path> {
        self.settings.as_deref()
    }

    /// Apply command-line overrides on top of loaded settings.
    pub fn apply_overrides(&self, config: &mut ShellPolicyConfig) {
        if self.insecure {
            config.insecure_mode = true;
        }
        if let Some(port) = self.port {
            config.proxy.listen_port = port;
        }
        if self.passthrough_connect {
            config.proxy.intercept_connect = false;
        }
    }
}
