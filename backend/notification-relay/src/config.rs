use crate::error::{AppError, AppResult};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default WebSocket frame limit (256 KB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 262_144;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// HTTP worker threads; `None` keeps the actix default (one per core)
    pub workers: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    pub max_frame_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                workers: None,
            },
            relay: RelayConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has invalid value {raw:?}"))),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenv().ok();
        let defaults = Config::default();

        let workers = match env::var("RELAY_WORKERS") {
            Ok(raw) => Some(raw.trim().parse::<usize>().map_err(|_| {
                AppError::Config(format!("RELAY_WORKERS has invalid value {raw:?}"))
            })?),
            Err(_) => None,
        };

        let config = Config {
            app: AppConfig {
                host: env::var("RELAY_HOST").unwrap_or(defaults.app.host),
                port: parse_var("PORT", defaults.app.port)?,
                workers,
            },
            relay: RelayConfig {
                heartbeat_interval: Duration::from_secs(parse_var(
                    "RELAY_HEARTBEAT_INTERVAL_SECS",
                    defaults.relay.heartbeat_interval.as_secs(),
                )?),
                client_timeout: Duration::from_secs(parse_var(
                    "RELAY_CLIENT_TIMEOUT_SECS",
                    defaults.relay.client_timeout.as_secs(),
                )?),
                max_frame_size: parse_var("RELAY_MAX_FRAME_SIZE", defaults.relay.max_frame_size)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.app.workers == Some(0) {
            return Err(AppError::Config("RELAY_WORKERS must be at least 1".into()));
        }
        if self.relay.heartbeat_interval.is_zero() {
            return Err(AppError::Config(
                "RELAY_HEARTBEAT_INTERVAL_SECS must be greater than 0".into(),
            ));
        }
        if self.relay.client_timeout <= self.relay.heartbeat_interval {
            return Err(AppError::Config(
                "RELAY_CLIENT_TIMEOUT_SECS must exceed the heartbeat interval".into(),
            ));
        }
        if self.relay.max_frame_size == 0 {
            return Err(AppError::Config("RELAY_MAX_FRAME_SIZE must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}
