//! Settings for a send run.
//!
//! A [`Config`] can be read from a JSON file; every field except `message`
//! has a default, and command-line flags override whatever the file sets.
//!
//! ```json
//! {
//!   "message": "gg;wp",
//!   "repeat_count": 5,
//!   "interval_secs": 2.5,
//!   "random_interval": true,
//!   "multi_message": true,
//!   "grace_delay": "3s",
//!   "stop_hotkey": "ctrl+alt+s"
//! }
//! ```

use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RepeaterError, Result};
use crate::hotkey::parse_hotkey;
use crate::message::SendJob;
use crate::validation::validate_message;

pub const MIN_REPEAT_COUNT: u32 = 1;
pub const MAX_REPEAT_COUNT: u32 = 1000;
pub const MIN_INTERVAL_SECS: f64 = 0.1;
pub const MAX_INTERVAL_SECS: f64 = 10.0;

/// Delay before the first message, to switch focus to the target window.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub message: String,
    pub repeat_count: u32,
    pub interval_secs: f64,
    pub random_interval: bool,
    pub multi_message: bool,
    #[serde(with = "duration_serde")]
    pub grace_delay: Duration,
    /// Empty disables the hotkey.
    pub stop_hotkey: String,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            message: String::new(),
            repeat_count: 10,
            interval_secs: 1.0,
            random_interval: false,
            multi_message: false,
            grace_delay: DEFAULT_GRACE_DELAY,
            stop_hotkey: "ctrl+alt+s".to_string(),
            verbose: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| RepeaterError::config_load(path, e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| RepeaterError::config_load(path, e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        validate_message(&self.message)?;
        check_repeat_count(self.repeat_count)?;
        check_interval(self.interval_secs)?;

        if !self.stop_hotkey.trim().is_empty() {
            parse_hotkey(&self.stop_hotkey)?;
        }

        Ok(())
    }

    /// Builds the job for this config. Call [`validate`](Self::validate) first.
    ///
    /// The message is trimmed and the interval snapped to 0.1 s steps.
    pub fn to_job(&self) -> SendJob {
        SendJob::new(
            self.message.trim(),
            self.repeat_count,
            quantize_interval(self.interval_secs),
        )
        .with_jitter(self.random_interval)
        .with_multi_message(self.multi_message)
    }

    pub fn hotkey(&self) -> Option<&str> {
        let combo = self.stop_hotkey.trim();
        (!combo.is_empty()).then_some(combo)
    }
}

pub fn check_repeat_count(count: u32) -> Result<()> {
    if (MIN_REPEAT_COUNT..=MAX_REPEAT_COUNT).contains(&count) {
        Ok(())
    } else {
        Err(RepeaterError::config_validation(format!(
            "repeat_count must be between {MIN_REPEAT_COUNT} and {MAX_REPEAT_COUNT}, got {count}"
        )))
    }
}

/// Rejects intervals outside `[0.1, 10.0]` seconds, NaN included.
pub fn check_interval(secs: f64) -> Result<()> {
    if (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&secs) {
        Ok(())
    } else {
        Err(RepeaterError::config_validation(format!(
            "interval must be {MIN_INTERVAL_SECS} to {MAX_INTERVAL_SECS} seconds, got {secs}"
        )))
    }
}

/// Rounds to the nearest 0.1 s, clamped to the allowed interval range.
pub fn quantize_interval(secs: f64) -> f64 {
    ((secs * 10.0).round() / 10.0).clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
}

/// Parses `"500ms"`, `"3s"`, `"2m"` or a bare number of milliseconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let trimmed = value.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err(RepeaterError::invalid_duration(value, "empty duration"));
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(RepeaterError::invalid_duration(value, "expected a number"));
    }

    let amount: u64 = digits.parse().map_err(|e: std::num::ParseIntError| {
        RepeaterError::invalid_duration(value, e.to_string())
    })?;

    match unit.trim() {
        "" | "ms" => Ok(Duration::from_millis(amount)),
        "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount.saturating_mul(60))),
        other => Err(RepeaterError::invalid_duration(
            value,
            format!("unknown unit '{other}'"),
        )),
    }
}

/// Formats a duration the way [`parse_duration`] reads it.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{millis}ms")
    }
}

mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            message: "hello".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.repeat_count, 10);
        assert_eq!(config.interval_secs, 1.0);
        assert_eq!(config.grace_delay, Duration::from_secs(3));
        assert!(!config.random_interval);
        assert!(!config.multi_message);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.repeat_count = 0;
        assert!(config.validate().is_err());
        config.repeat_count = 1001;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.interval_secs = 0.05;
        assert!(config.validate().is_err());
        config.interval_secs = f64::NAN;
        assert!(config.validate().is_err());
        config.interval_secs = f64::INFINITY;
        assert!(config.validate().is_err());
        config.interval_secs = 10.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_message_and_hotkey() {
        let mut config = valid();
        config.message = "   ".to_string();
        assert!(matches!(config.validate(), Err(RepeaterError::EmptyMessage)));

        let mut config = valid();
        config.stop_hotkey = "ctrl+nope".to_string();
        assert!(config.validate().is_err());
        config.stop_hotkey = String::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.hotkey(), None);
    }

    #[test]
    fn test_to_job() {
        let config = Config {
            message: "  a;b  ".to_string(),
            repeat_count: 4,
            interval_secs: 1.26,
            random_interval: true,
            multi_message: true,
            ..Config::default()
        };
        let job = config.to_job();
        assert_eq!(job.template, "a;b");
        assert_eq!(job.repeat_count, 4);
        assert!((job.base_interval_secs - 1.3).abs() < 1e-9);
        assert!(job.jitter_enabled);
        assert!(job.multi_message_enabled);
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1500").unwrap(), Duration::from_millis(1500));
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("3h").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3)), "3s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
    }
}
