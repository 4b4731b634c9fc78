use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use cinebook_core::BookingRules;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub booking: BookingRules,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    File,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Where the file backend keeps one JSON record per showtime
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

fn default_key_prefix() -> String { "booking-session".to_string() }
fn default_directory() -> PathBuf { PathBuf::from("data/sessions") }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            key_prefix: default_key_prefix(),
            directory: default_directory(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default").required(false))
            // Environment specific overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `CINEBOOK__BOOKING__HOLD_SECONDS=120`
            .add_source(config::Environment::with_prefix("CINEBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        let config: Config = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.redis.is_none());
        assert_eq!(config.booking, BookingRules::default());
        assert_eq!(config.session.backend, SessionBackend::Memory);
        assert_eq!(config.session.key_prefix, "booking-session");
    }

    #[test]
    fn test_overrides() {
        let config: Config = config::Config::builder()
            .set_override("booking.hold_seconds", 120)
            .unwrap()
            .set_override("session.backend", "redis")
            .unwrap()
            .set_override("redis.url", "redis://127.0.0.1/")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.booking.hold_seconds, 120);
        assert_eq!(config.booking.max_tickets_per_type, 5);
        assert_eq!(config.session.backend, SessionBackend::Redis);
        assert_eq!(config.redis.unwrap().url, "redis://127.0.0.1/");
    }
}
