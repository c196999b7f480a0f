//! Camwatch - Main Entry Point

use alert_source::{AlertSource, TcpJsonSource};
use clap::Parser;
use notifier::{Notifier, PushoverNotifier};
use relay::{init_logging, AppConfig, Relay, EVENT_CHANNEL_CAPACITY};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "camwatch", version, about = "Push notifications for DVR camera alerts")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(env = "CAMWATCH_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)?;
    let settings = config.validate()?;
    init_logging(settings.log_level, settings.log_json)?;

    info!("=== Camwatch v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from {}", cli.config.display());

    let notifier: Arc<dyn Notifier> = Arc::new(PushoverNotifier::new(config.pushover.clone())?);
    let relay = Relay::from_settings(notifier, settings);

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let source = TcpJsonSource::new(config.source.listen_addr.clone());
    let source_task = tokio::spawn(async move { source.run(tx).await });

    relay
        .run(rx, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    source_task.abort();
    if let Ok(Err(e)) = source_task.await {
        return Err(e.into());
    }

    info!("Camwatch stopped");
    Ok(())
}
