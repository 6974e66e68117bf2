//! Configuration loading: TOML file + environment overrides, validated
//! before anything binds a socket.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::core::errors::StartupError;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub worker_threads: Option<usize>,
    pub log_level: String,
    pub sweeper_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_address: "127.0.0.1".to_string(),
            port: 6379,
            worker_threads: None,
            log_level: "info".to_string(),
            sweeper_interval_ms: 100,
        }
    }
}

impl Config {
    /// Loads from `path` if it exists, layering `KVEMBERD_`-prefixed
    /// environment variables on top, then validates the result. Missing
    /// files are not an error: the defaults above are a valid config.
    pub fn load(path: Option<&str>) -> Result<Config, StartupError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default()).map_err(|e| StartupError(e.into()))?);
        if let Some(path) = path {
            if std::path::Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            }
        }
        builder = builder.add_source(config::Environment::with_prefix("KVEMBERD"));
        let built = builder.build().map_err(|e| StartupError(e.into()))?;
        let cfg: Config = built.try_deserialize().map_err(|e| StartupError(e.into()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), StartupError> {
        self.bind_address
            .parse::<IpAddr>()
            .map_err(|e| StartupError(anyhow::anyhow!("invalid bind_address '{}': {e}", self.bind_address)))?;
        if self.port == 0 {
            return Err(StartupError(anyhow::anyhow!("port must be in 1..=65535")));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
