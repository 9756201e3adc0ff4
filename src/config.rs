use std::{
    fs::{self, File},
    io::prelude::*,
    path::Path,
};

use serde::{Deserialize, Serialize};

/// Top-level configuration for the application, loaded from a TOML file.
/// Replaces the interactive prompts and process-wide mutable flags of older
/// tooling with one explicit struct handed to the orchestrator.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HordeConfig {
    /// Log at debug level regardless of RUST_LOG.
    #[serde(default)]
    pub verbose: bool,

    /// Run a single probe-then-login session and exit.
    #[serde(default)]
    pub debug: bool,

    /// Target server hostname or IP.
    #[serde(default = "default_target_host")]
    pub target_host: String,

    /// Target server port.
    #[serde(default = "default_target_port")]
    pub target_port: u16,

    /// Login sessions dispatched per one-second tick.
    #[serde(default = "default_bots_per_second")]
    pub bots_per_second: u32,

    /// Total sessions to dispatch before stopping. Unset means run until
    /// signalled. The count gates dispatch, not completion.
    #[serde(default)]
    pub bot_count: Option<u64>,

    /// Newline-delimited `ip:port` SOCKS4 list to fetch. Unset means connect
    /// directly to the target.
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Ceiling on concurrently open sessions; dispatches past it queue.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,

    /// Transport connect / proxy handshake timeout, seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_target_host() -> String {
    "127.0.0.1".to_string()
}

fn default_target_port() -> u16 {
    25565
}

fn default_bots_per_second() -> u32 {
    1
}

fn default_max_sessions() -> u32 {
    4096
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for HordeConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            debug: false,
            target_host: default_target_host(),
            target_port: default_target_port(),
            bots_per_second: default_bots_per_second(),
            bot_count: None,
            proxy_url: None,
            max_sessions: default_max_sessions(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl HordeConfig {
    pub fn load(path: &Path) -> Result<Self, HordeConfigLoadError> {
        let raw = fs::read_to_string(path).map_err(HordeConfigLoadError::Io)?;
        let config: Self = toml::from_str(&raw).map_err(HordeConfigLoadError::Parse)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let config_str = toml::to_string(&self)?;
        let mut file = File::create(path)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HordeConfigLoadError {
    #[error("Could not open config")]
    Io(#[from] std::io::Error),
    #[error("Could not parse")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::HordeConfig;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: HordeConfig = toml::from_str(
            r#"
            target_host = "play.example.net"
            bots_per_second = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.target_host, "play.example.net");
        assert_eq!(config.target_port, 25565);
        assert_eq!(config.bots_per_second, 3);
        assert_eq!(config.bot_count, None);
        assert!(config.proxy_url.is_none());
        assert!(!config.debug);
    }
}
