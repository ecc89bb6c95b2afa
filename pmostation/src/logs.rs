//! Initialisation du logging

use pmoconfig::Config;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter,
    layer::SubscriberExt,
    reload,
    util::SubscriberInitExt,
    Registry,
};

/// Handle to change the log level at runtime
#[derive(Clone)]
pub struct LogHandle {
    reload_handle: reload::Handle<LevelFilter, Registry>,
}

impl LogHandle {
    pub fn set_level(&self, level: &str) -> anyhow::Result<()> {
        let level = string_to_level(level)
            .ok_or_else(|| anyhow::anyhow!("Unknown log level: {}", level))?;
        self.reload_handle
            .reload(LevelFilter::from_level(level))
            .map_err(|e| anyhow::anyhow!("Failed to reload log level filter: {}", e))
    }
}

/// Installs the global subscriber from the `logger` section
///
/// A plain level in `RUST_LOG` wins over `logger.min_level`. Calling it
/// twice keeps the first subscriber.
pub fn init_logging(config: &Config) -> LogHandle {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| string_to_level(&value))
        .or_else(|| string_to_level(&config.get_log_min_level()))
        .map(LevelFilter::from_level)
        .unwrap_or(LevelFilter::INFO);

    let (filter, reload_handle) = reload::Layer::new(level);
    let subscriber = Registry::default().with(filter);

    let result = if config.get_log_enable_console() {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };
    if let Err(e) = result {
        eprintln!("Logging already initialised: {}", e);
    }

    LogHandle { reload_handle }
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}
