//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated), permissive when unset
    pub client_origin: Option<String>,
    /// Matchmaking and simulation tuning
    pub game: GameConfig,
}

/// Matchmaking and per-session simulation settings
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    /// Seats per session (N)
    pub players_per_match: usize,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Countdown between `game_start` and play
    pub countdown: Duration,
    /// Length of the playing phase
    pub round_duration: Duration,
    /// Absolute cap on a session's lifetime after it starts
    pub session_timeout: Duration,
    /// Delay between match formation and automatic start
    pub auto_start_delay: Duration,
    /// Horizontal acceleration applied per unit of input (units/s^2)
    pub acceleration: f32,
    /// Horizontal velocity retained after each tick
    pub damping: f32,
    /// Upward velocity given by a jump
    pub jump_velocity: f32,
    /// Downward acceleration while airborne
    pub gravity: f32,
    /// Seed for the lobby RNG (variant and session seed draws)
    pub match_seed: Option<u64>,
}

impl GameConfig {
    /// Duration of a single tick
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate
    }

    /// Whole ticks spanning `duration`, rounded up to the next tick
    pub fn ticks_in(&self, duration: Duration) -> u64 {
        let ticks = (duration.as_millis() * u128::from(self.tick_rate)).div_ceil(1000);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            players_per_match: 4,
            tick_rate: 20,
            countdown: Duration::from_secs(3),
            round_duration: Duration::from_secs(60),
            session_timeout: Duration::from_secs(180),
            auto_start_delay: Duration::from_millis(2000),
            acceleration: 30.0,
            damping: 0.9,
            jump_velocity: 8.0,
            gravity: 20.0,
            match_seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let defaults = GameConfig::default();
        let game = GameConfig {
            players_per_match: parse_or(&lookup, "PLAYERS_PER_MATCH", defaults.players_per_match)?,
            tick_rate: parse_or(&lookup, "TICK_RATE", defaults.tick_rate)?,
            countdown: Duration::from_secs(parse_or(&lookup, "COUNTDOWN_SECS", 3)?),
            round_duration: Duration::from_secs(parse_or(&lookup, "ROUND_SECS", 60)?),
            session_timeout: Duration::from_secs(parse_or(&lookup, "SESSION_TIMEOUT_SECS", 180)?),
            auto_start_delay: Duration::from_millis(parse_or(&lookup, "AUTO_START_DELAY_MS", 2000)?),
            acceleration: parse_or(&lookup, "ACCELERATION", defaults.acceleration)?,
            damping: parse_or(&lookup, "DAMPING", defaults.damping)?,
            jump_velocity: parse_or(&lookup, "JUMP_VELOCITY", defaults.jump_velocity)?,
            gravity: parse_or(&lookup, "GRAVITY", defaults.gravity)?,
            match_seed: lookup("MATCH_SEED")
                .map(|raw| parse_value("MATCH_SEED", &raw))
                .transpose()?,
        };

        validate(&game)?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").filter(|s| !s.trim().is_empty()),
            game,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn validate(game: &GameConfig) -> Result<(), ConfigError> {
    if game.players_per_match < 2 {
        return Err(ConfigError::OutOfRange {
            key: "PLAYERS_PER_MATCH",
            reason: "a match needs at least 2 players",
        });
    }
    if game.tick_rate == 0 {
        return Err(ConfigError::OutOfRange {
            key: "TICK_RATE",
            reason: "must be at least 1",
        });
    }
    if game.round_duration.is_zero() {
        return Err(ConfigError::OutOfRange {
            key: "ROUND_SECS",
            reason: "must be positive",
        });
    }
    if game.session_timeout.is_zero() {
        return Err(ConfigError::OutOfRange {
            key: "SESSION_TIMEOUT_SECS",
            reason: "must be positive",
        });
    }
    if !(game.damping > 0.0 && game.damping <= 1.0) {
        return Err(ConfigError::OutOfRange {
            key: "DAMPING",
            reason: "must be in (0, 1]",
        });
    }
    for (key, value) in [
        ("ACCELERATION", game.acceleration),
        ("JUMP_VELOCITY", game.jump_velocity),
        ("GRAVITY", game.gravity),
    ] {
        if !value.is_finite() {
            return Err(ConfigError::OutOfRange {
                key,
                reason: "must be a finite number",
            });
        }
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for environment variable {key}")]
    Invalid { key: &'static str, value: String },

    #[error("Environment variable {key} out of range: {reason}")]
    OutOfRange {
        key: &'static str,
        reason: &'static str,
    },

    #[error("Invalid server address format")]
    InvalidAddress,
}
