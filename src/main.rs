//! mapgen daemon entry point.

use anyhow::Context;
use log::{error, info};
use tokio::signal;

mod config;
mod metadata;
mod poll;
mod synth;
mod types;
mod writer;

use config::Config;
use metadata::RancherMetadata;
use poll::Poller;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting mapgen with config: {:?}", cfg);

    let source = RancherMetadata::new(&cfg.api_host, &cfg.api_version, cfg.request_timeout())
        .context("Failed to build metadata client")?;
    info!("Using metadata service at {}", source.base_url());

    let poller = Poller::new(source, cfg);

    tokio::select! {
        result = poller.run() => result?,
        res = signal::ctrl_c() => match res {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
                poller.run().await?;
            }
        },
    }

    info!("Shutdown complete.");
    Ok(())
}
