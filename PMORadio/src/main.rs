use anyhow::Context;
use pmobroadcast::IcecastFactory;
use pmostation::{init_logging, Station};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Usage: `PMORadio [CONFIG_FILE]`
#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args().nth(1);

    let config = match pmoconfig::init_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Cannot load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);

    match run(&config).await {
        Ok(()) => {
            info!("👋 PMORadio stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &pmoconfig::Config) -> anyhow::Result<()> {
    config.validate().context("Invalid configuration")?;
    info!("📻 Starting PMORadio with {}", config.path().display());

    let factory = Arc::new(IcecastFactory::new()?);
    let station = Station::from_config(config, factory).await?;

    let np = station.scheduler().now_playing().await?;
    info!(
        "🎵 {} track(s) in catalog, {} play(s) so far",
        np.total_tracks, np.total_plays
    );

    info!("✅ PMORadio is on air, press Ctrl+C to stop");
    station
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}
