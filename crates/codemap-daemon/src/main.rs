//! Codemap Daemon
//!
//! Background process that keeps the code index of every registered project
//! up to date.

mod daemon;
mod signals;

use anyhow::Result;
use codemap_core::GlobalConfig;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

pub use daemon::Daemon;

/// Run the daemon
pub async fn run(config: GlobalConfig) -> Result<()> {
    let daemon = Daemon::new(config)?;
    daemon.run().await
}

fn main() -> Result<()> {
    let config = GlobalConfig::load();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    tracing::info!("Starting codemap daemon v{}", env!("CARGO_PKG_VERSION"));

    // Run async runtime
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}
