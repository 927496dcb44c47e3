//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How a networked session keeps the peer's world in step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Ticks between outbound pose bundles on the authoritative side
    pub pose_interval_ticks: u32,
    /// Apply remote orientations as well as positions
    pub apply_orientation: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            pose_interval_ticks: 10,
            apply_orientation: true,
        }
    }
}

/// Settings loaded from environment variables (optionally via `.env`)
#[derive(Clone, Debug)]
pub struct Config {
    /// Relay binding address
    pub relay_addr: SocketAddr,
    /// Relay URL clients connect to
    pub relay_url: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Frame rate of the session loop
    pub tick_hz: u32,
    pub sync: SyncSettings,
    /// Where scores are persisted; in memory when unset
    pub score_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let relay_addr = lookup("RELAY_ADDR").unwrap_or_else(|| "0.0.0.0:9001".to_string());
        let defaults = SyncSettings::default();

        Ok(Self {
            relay_addr: relay_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(relay_addr))?,

            relay_url: lookup("RELAY_URL").unwrap_or_else(|| "ws://127.0.0.1:9001".to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            tick_hz: parse_number(&lookup, "CARBALL_TICK_HZ", 60)?,
            sync: SyncSettings {
                pose_interval_ticks: parse_number(
                    &lookup,
                    "CARBALL_POSE_INTERVAL",
                    defaults.pose_interval_ticks,
                )?,
                apply_orientation: parse_bool(
                    &lookup,
                    "CARBALL_SYNC_ORIENTATION",
                    defaults.apply_orientation,
                )?,
            },

            score_file: lookup("CARBALL_SCORE_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidNumber { key, value: raw }),
        },
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { key, value: raw }),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid relay address: {0}")]
    InvalidAddress(String),

    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be true or false, got {value:?}")]
    InvalidBool { key: &'static str, value: String },
}

/// Initialize tracing/logging. `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.relay_addr, "0.0.0.0:9001".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.relay_url, "ws://127.0.0.1:9001");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.tick_hz, 60);
        assert_eq!(cfg.sync, SyncSettings { pose_interval_ticks: 10, apply_orientation: true });
        assert_eq!(cfg.score_file, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("RELAY_ADDR", "127.0.0.1:7000"),
            ("CARBALL_TICK_HZ", "30"),
            ("CARBALL_POSE_INTERVAL", "5"),
            ("CARBALL_SYNC_ORIENTATION", "off"),
            ("CARBALL_SCORE_FILE", "/tmp/scores.json"),
        ])
        .unwrap();
        assert_eq!(cfg.relay_addr.port(), 7000);
        assert_eq!(cfg.tick_hz, 30);
        assert_eq!(cfg.sync.pose_interval_ticks, 5);
        assert!(!cfg.sync.apply_orientation);
        assert_eq!(cfg.score_file, Some(PathBuf::from("/tmp/scores.json")));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            config(&[("RELAY_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(matches!(
            config(&[("CARBALL_TICK_HZ", "0")]),
            Err(ConfigError::InvalidNumber { key: "CARBALL_TICK_HZ", .. })
        ));
        assert!(matches!(
            config(&[("CARBALL_SYNC_ORIENTATION", "maybe")]),
            Err(ConfigError::InvalidBool { .. })
        ));
    }
}
