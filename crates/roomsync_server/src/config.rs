use std::env;
use std::time::Duration;
use thiserror::Error;

/// Smallest outbound queue a connection may get. The join greeting alone
/// takes two slots.
const MIN_OUTBOUND_BUFFER: usize = 4;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Room used when a connection names none (default: "default")
    pub default_room: String,
    /// How long a room may sit empty before eviction (default: 300s)
    pub room_evict_after: Duration,
    /// How often the eviction sweeper runs (default: 60s)
    pub room_sweep_interval: Duration,
    /// Interval between server pings on idle sockets (default: 15s)
    pub ping_interval: Duration,
    /// Close a socket after this long without any inbound frame (default: 45s)
    pub idle_timeout: Duration,
    /// Per-connection outbound queue length (default: 256)
    pub outbound_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            default_room: "default".to_string(),
            room_evict_after: Duration::from_secs(300),
            room_sweep_interval: Duration::from_secs(60),
            ping_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(45),
            outbound_buffer: 256,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => defaults.port,
        };

        let default_room = lookup("DEFAULT_ROOM")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.default_room);

        let secs = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(var) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
                None => Ok(default),
            }
        };

        let room_evict_after = secs("ROOM_EVICT_AFTER_SECS", defaults.room_evict_after)?;
        let room_sweep_interval = secs("ROOM_SWEEP_INTERVAL_SECS", defaults.room_sweep_interval)?;
        let ping_interval = secs("PING_INTERVAL_SECS", defaults.ping_interval)?;
        let idle_timeout = secs("IDLE_TIMEOUT_SECS", defaults.idle_timeout)?;

        if room_sweep_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("ROOM_SWEEP_INTERVAL_SECS"));
        }
        if ping_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("PING_INTERVAL_SECS"));
        }
        if idle_timeout <= ping_interval {
            return Err(ConfigError::IdleTimeoutTooShort);
        }

        let outbound_buffer = match lookup("OUTBOUND_BUFFER") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "OUTBOUND_BUFFER",
                    value: raw,
                })?
                .max(MIN_OUTBOUND_BUFFER),
            None => defaults.outbound_buffer,
        };

        Ok(Config {
            host,
            port,
            default_room,
            room_evict_after,
            room_sweep_interval,
            ping_interval,
            idle_timeout,
            outbound_buffer,
        })
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid PORT environment variable: {0:?}")]
    InvalidPort(String),

    #[error("Invalid {var} environment variable: {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("IDLE_TIMEOUT_SECS must be longer than PING_INTERVAL_SECS")]
    IdleTimeoutTooShort,
}
