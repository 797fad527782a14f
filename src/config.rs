use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::synth::CollisionPolicy;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Suffix appended to stack names and aliases to form hostnames.
    pub domain: String,
    pub api_host: String,
    pub api_version: String,
    pub domain_map: PathBuf,
    pub backends: PathBuf,
    /// Container label that marks a routable service and carries its port.
    pub label: String,
    /// Seconds between poll cycles.
    pub interval: u64,
    /// Per-request timeout against the metadata service, in seconds.
    pub request_timeout: u64,
    pub collisions: CollisionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: String::new(),
            api_host: "rancher-metadata".into(),
            api_version: "latest".into(),
            domain_map: "/etc/haproxy/domain.map".into(),
            backends: "/etc/haproxy/backends.cfg".into(),
            label: "haproxy.port".into(),
            interval: 10,
            request_timeout: 5,
            collisions: CollisionPolicy::default(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("mapgen.toml"))
                .merge(Json::file("mapgen.json"))
                .merge(Env::prefixed("MAPGEN_")),
        )
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        config.domain = config.domain.trim().trim_start_matches('.').to_string();
        if config.domain.is_empty() {
            anyhow::bail!("`domain` is required (set MAPGEN_DOMAIN or `domain` in mapgen.toml)");
        }
        if config.interval == 0 {
            anyhow::bail!("`interval` must be at least 1 second");
        }
        if config.request_timeout == 0 {
            anyhow::bail!("`request_timeout` must be at least 1 second");
        }

        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
