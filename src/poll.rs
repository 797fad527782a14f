//! Fixed-delay poll loop.
//!
//! Each cycle fetches the inventory, synthesizes both files and writes
//! them, then sleeps for the configured interval.  Cycles never overlap.
//! Fetch failures skip the cycle; write failures end the loop.

use log::{debug, error, info, warn};

use crate::config::Config;
use crate::metadata::MetadataSource;
use crate::synth::{synthesize, Settings};
use crate::types::Aliases;
use crate::writer::{self, WriteError, WriteOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was written; the previous files stay in place.
    Skipped,
    Applied {
        backends: WriteOutcome,
        domain_map: WriteOutcome,
    },
}

pub struct Poller<S> {
    source: S,
    config: Config,
}

impl<S: MetadataSource> Poller<S> {
    pub fn new(source: S, config: Config) -> Self {
        Self { source, config }
    }

    /// Run cycles until a file cannot be written; that error is logged
    /// and returned.
    pub async fn run(&self) -> Result<(), WriteError> {
        info!(
            "Polling every {}s, writing {} and {}",
            self.config.interval,
            self.config.backends.display(),
            self.config.domain_map.display()
        );
        loop {
            if let Err(e) = self.run_cycle().await {
                error!("Unable to write configuration: {}", e);
                return Err(e);
            }
            tokio::time::sleep(self.config.interval()).await;
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome, WriteError> {
        let containers = match self.source.fetch_containers().await {
            Ok(c) if c.is_empty() => {
                warn!("Metadata service returned no containers, keeping current config");
                return Ok(CycleOutcome::Skipped);
            }
            Ok(c) => c,
            Err(e) => {
                error!("Failed to get containers: {}", e);
                return Ok(CycleOutcome::Skipped);
            }
        };

        let aliases = match self.source.fetch_aliases().await {
            Ok(a) => a,
            Err(e) => {
                warn!("Failed to get aliases, continuing without them: {}", e);
                Aliases::new()
            }
        };

        let settings = Settings {
            label: &self.config.label,
            domain: &self.config.domain,
            collisions: self.config.collisions,
        };
        let out = synthesize(&containers, &aliases, &settings);
        debug!(
            "{} containers -> {} backends, {} hostnames",
            containers.len(),
            out.backends.0.len(),
            out.domain_map.0.len()
        );

        let backends = writer::update(&out.backends, &self.config.backends)?;
        let domain_map = writer::update(&out.domain_map, &self.config.domain_map)?;
        Ok(CycleOutcome::Applied {
            backends,
            domain_map,
        })
    }
}
