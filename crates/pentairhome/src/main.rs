mod cli;
mod config;
mod error;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pentair_core::{Bridge, BrokerConfig, BrokerConnection, Telemetry};

use crate::cli::{Cli, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet, cli.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, quiet: bool, format: LogFormat) {
    let level = match (quiet, verbosity) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = config::load(&cli)?;
    let runtime = settings.resolve(cli.check)?;
    let bridge = Bridge::new(runtime.bridge)?;

    if cli.check {
        return check(&bridge).await;
    }

    let broker = runtime
        .broker
        .ok_or_else(|| CliError::Internal("broker settings were not resolved".into()))?;
    serve(&bridge, &broker).await
}

/// `--check`: exercise the cloud side once and report what would be bridged.
async fn check(bridge: &Bridge) -> Result<(), CliError> {
    let device = bridge.bootstrap().await?;
    let profile = bridge.profile().await?;
    let telemetry = Telemetry::from_device(&device)?;
    let readings = serde_json::to_string_pretty(&telemetry)
        .map_err(|e| CliError::Internal(format!("encode telemetry: {e}")))?;

    println!("Pentair Home login: ok ({})", profile.message);
    println!("Device:   {}", device.device_id);
    println!("Name:     {}", device.product_info.nick_name);
    println!("Model:    {}", device.product_info.model);
    println!("Firmware: {}", device.fw_version);
    println!("Readings: {readings}");
    Ok(())
}

/// Run until a shutdown signal, or until the broker connection ends.
async fn serve(bridge: &Bridge, broker_config: &BrokerConfig) -> Result<(), CliError> {
    bridge.bootstrap().await?;

    let broker = BrokerConnection::connect(broker_config).await?;
    let status = broker_config
        .status_topic
        .is_some()
        .then(|| broker.status_messages());

    if let Err(e) = bridge.start(Arc::new(broker.clone()), status).await {
        bridge.shutdown().await;
        broker.disconnect().await;
        return Err(e.into());
    }

    let outcome = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown requested");
            Ok(())
        }
        () = broker.closed() => Err(CliError::BrokerClosed {
            address: broker.address().to_owned(),
        }),
    };

    bridge.shutdown().await;
    broker.disconnect().await;
    outcome
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}
