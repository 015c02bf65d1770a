//! CLI entry point for the shell policy proxy.

use std::process::ExitCode;

use shell_policy::cli::Cli;
use shell_policy::config::load_settings;
use shell_policy::host::ProxySession;
use shell_policy::pipeline::InterceptionPipeline;
use shell_policy::utils::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    let debug = init_logging(cli.debug);

    let (mut config, source) = match load_settings(cli.settings_path()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::from(1);
        }
    };
    cli.apply_overrides(&mut config);

    tracing::info!("Settings from {}", source);
    if debug {
        tracing::debug!("Effective config: {:?}", config);
    }

    let pipeline = match InterceptionPipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Invalid policy configuration: {}", e);
            return ExitCode::from(1);
        }
    };

    let mut session = match ProxySession::bind(&config.proxy).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to bind proxy: {}", e);
            return ExitCode::from(1);
        }
    };

    if let Some(path) = cli.export_ca.as_deref() {
        match session.certificate_authority() {
            Some(ca) => {
                if let Err(e) = std::fs::write(path, ca.cert_pem()) {
                    eprintln!("Failed to write CA certificate to {}: {}", path.display(), e);
                    return ExitCode::from(1);
                }
                tracing::info!("Interception CA written to {}", path.display());
            }
            None => tracing::warn!("CONNECT interception is off; no CA certificate to export"),
        }
    }

    let pipeline = pipeline.register(&session);

    if let Err(e) = session.start() {
        eprintln!("Failed to start proxy: {}", e);
        return ExitCode::from(1);
    }

    tracing::info!(
        "Interception proxy listening on {} (cors: {}, insecure: {}, intercept CONNECT: {})",
        session.local_addr(),
        pipeline.injects_cors(),
        pipeline.is_insecure(),
        session.certificate_authority().is_some()
    );
    println!("http://{}", session.local_addr());

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to wait for Ctrl-C: {}", e);
    }

    session.stop();
    tracing::info!("Interception proxy stopped");

    ExitCode::SUCCESS
}
