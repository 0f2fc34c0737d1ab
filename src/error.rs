//! Error types for message-repeater.
//!
//! Library code returns [`RepeaterError`]; the emitter boundary has its own
//! [`EmitError`](crate::emitter::EmitError) which converts into it.

use thiserror::Error;

use crate::emitter::EmitError;

/// Main error type for message-repeater operations.
#[derive(Error, Debug)]
pub enum RepeaterError {
    /// The message is empty or whitespace only.
    #[error("message cannot be empty")]
    EmptyMessage,

    /// The message contains a code point that cannot be typed.
    #[error("message contains non-printable character '{escaped}' (U+{codepoint:04X}, {category})")]
    NonPrintableCharacter {
        escaped: String,
        codepoint: u32,
        category: &'static str,
    },

    /// Configuration validation error.
    #[error("configuration error: {0}")]
    ConfigValidation(String),

    /// Error reading or parsing a settings file.
    #[error("failed to load config from '{path}': {reason}")]
    ConfigLoad { path: String, reason: String },

    /// Error parsing a duration string.
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    /// Error parsing or registering the stop hotkey.
    #[error("hotkey error: {0}")]
    Hotkey(String),

    /// A job is already running; only one may be active at a time.
    #[error("a send job is already running")]
    JobAlreadyRunning,

    /// The keystroke emitter failed.
    #[error(transparent)]
    Emission(#[from] EmitError),
}

/// Result type alias for message-repeater operations.
pub type Result<T> = std::result::Result<T, RepeaterError>;

impl RepeaterError {
    /// Create a new NonPrintableCharacter error for `ch`.
    pub fn non_printable(ch: char, category: &'static str) -> Self {
        Self::NonPrintableCharacter {
            escaped: ch.escape_unicode().to_string(),
            codepoint: u32::from(ch),
            category,
        }
    }

    /// Create a new ConfigValidation error.
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation(message.into())
    }

    /// Create a new ConfigLoad error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidDuration error.
    pub fn invalid_duration(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a new Hotkey error.
    pub fn hotkey(message: impl Into<String>) -> Self {
        Self::Hotkey(message.into())
    }

    /// True for errors the user can fix by changing their input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyMessage
                | Self::NonPrintableCharacter { .. }
                | Self::ConfigValidation(_)
                | Self::InvalidDuration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepeaterError::non_printable('\u{200b}', "Cf");
        assert_eq!(
            err.to_string(),
            "message contains non-printable character '\\u{200b}' (U+200B, Cf)"
        );

        let err = RepeaterError::config_validation("repeat_count must be at least 1");
        assert_eq!(
            err.to_string(),
            "configuration error: repeat_count must be at least 1"
        );

        assert_eq!(
            RepeaterError::EmptyMessage.to_string(),
            "message cannot be empty"
        );
    }

    #[test]
    fn test_emit_error_is_transparent() {
        let err: RepeaterError = EmitError::Injection("device busy".to_string()).into();
        assert_eq!(err.to_string(), "keystroke injection failed: device busy");
        assert!(!err.is_validation());
    }
}
