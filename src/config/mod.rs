//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::time::{
    DEFAULT_BROADCAST_HZ, DEFAULT_MAX_FRAME_SECS, DEFAULT_TICK_HZ, MAX_TICK_HZ,
};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated, empty = any)
    pub client_origin: String,

    /// Simulation ticks per second
    pub tick_hz: u32,
    /// Snapshot broadcasts per second
    pub broadcast_hz: u32,
    /// Longest simulated frame in milliseconds
    pub max_frame_ms: u32,
    /// Enemy population cap per game
    pub max_enemies: usize,
    /// Peers allowed in one room
    pub max_room_peers: usize,
    /// Fixed terrain seed; a fresh seed is rolled per game when unset
    pub world_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms usually provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_default(),

            tick_hz: parse_or("TICK_HZ", DEFAULT_TICK_HZ)?,
            broadcast_hz: parse_or("BROADCAST_HZ", DEFAULT_BROADCAST_HZ)?,
            max_frame_ms: parse_or("MAX_FRAME_MS", (DEFAULT_MAX_FRAME_SECS * 1000.0) as u32)?,
            max_enemies: parse_or("MAX_ENEMIES", 30)?,
            max_room_peers: parse_or("MAX_ROOM_PEERS", 8)?,
            world_seed: parse_opt("WORLD_SEED")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 || self.tick_hz > MAX_TICK_HZ {
            return Err(ConfigError::OutOfRange("TICK_HZ"));
        }
        if self.broadcast_hz == 0 || self.broadcast_hz > self.tick_hz {
            return Err(ConfigError::OutOfRange("BROADCAST_HZ"));
        }
        if self.max_frame_ms == 0 {
            return Err(ConfigError::OutOfRange("MAX_FRAME_MS"));
        }
        if self.max_room_peers == 0 {
            return Err(ConfigError::OutOfRange("MAX_ROOM_PEERS"));
        }
        Ok(())
    }

    /// Longest simulated frame in seconds
    pub fn max_frame_secs(&self) -> f32 {
        self.max_frame_ms as f32 / 1000.0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            client_origin: String::new(),
            tick_hz: DEFAULT_TICK_HZ,
            broadcast_hz: DEFAULT_BROADCAST_HZ,
            max_frame_ms: (DEFAULT_MAX_FRAME_SECS * 1000.0) as u32,
            max_enemies: 30,
            max_room_peers: 8,
            world_seed: None,
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn parse_opt<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key)),
        _ => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Environment variable out of range: {0}")]
    OutOfRange(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
