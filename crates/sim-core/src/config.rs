//! Runtime configuration.
//!
//! Mirrors the teacher's `Config::load` / `load_or_default` shape: a toml
//! file with one sub-table per tunable subsystem, a hand-rolled `Default`
//! that matches the spec's documented defaults, and a manual error type
//! rather than `thiserror` (kept deliberately hand-rolled for contrast with
//! [`crate::error::CoreError`] — see DESIGN.md).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// In-game minutes advanced per `step` call.
    pub tick_minutes: u32,
    /// Minute-of-day boundaries at which meal events fire.
    pub meal_times: Vec<u32>,
    /// Minute-of-day boundaries at which guard shift events fire.
    pub guard_shift_times: Vec<u32>,
    /// Minutes between autosave checks.
    pub autosave_interval_minutes: u32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_minutes: 1,
            meal_times: vec![420, 720, 1080],
            guard_shift_times: vec![360, 840, 1320],
            autosave_interval_minutes: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bounded history ring capacity.
    pub history_cap: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { history_cap: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillConfig {
    /// Days a skill may sit unused before degradation begins.
    pub degradation_grace_days: i64,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            degradation_grace_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsequenceConfig {
    /// Default interval, in in-game hours, a `recurring` consequence
    /// re-schedules itself after firing.
    pub recurring_interval_hours: u64,
}

impl Default for ConsequenceConfig {
    fn default() -> Self {
        Self {
            recurring_interval_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub tick: TickConfig,
    pub bus: BusConfig,
    pub skills: SkillConfig,
    pub consequences: ConsequenceConfig,
}

impl Config {
    /// Loads configuration from a TOML file, failing on I/O or parse error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Loads configuration from a TOML file, falling back to [`Config::default`]
    /// with a logged warning on any I/O or parse error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %err,
                    "falling back to default configuration"
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(s) => write!(f, "failed to read config: {}", s),
            ConfigError::ParseError(s) => write!(f, "failed to parse config: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.tick.tick_minutes, 1);
        assert_eq!(config.bus.history_cap, 1000);
        assert_eq!(config.skills.degradation_grace_days, 7);
        assert_eq!(config.consequences.recurring_interval_hours, 24);
        assert_eq!(config.tick.meal_times, vec![420, 720, 1080]);
        assert_eq!(config.tick.guard_shift_times, vec![360, 840, 1320]);
    }

    #[test]
    fn load_or_default_falls_back_on_missing_file() {
        let config = Config::load_or_default("/nonexistent/path/config.toml");
        assert_eq!(config.tick.tick_minutes, 1);
    }

    #[test]
    fn load_parses_a_valid_toml_document() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("sim-core-config-test-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[tick]\ntick_minutes = 5\nmeal_times = [100, 200]\nguard_shift_times = [50]\nautosave_interval_minutes = 600\n\n[bus]\nhistory_cap = 50\n\n[skills]\ndegradation_grace_days = 3\n\n[consequences]\nrecurring_interval_hours = 12\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.tick.tick_minutes, 5);
        assert_eq!(config.bus.history_cap, 50);
    }
}
