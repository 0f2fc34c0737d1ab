//! Job parameters and message expansion.

use std::time::Duration;

use unicode_normalization::UnicodeNormalization;

use crate::config::{check_interval, check_repeat_count};
use crate::error::{RepeaterError, Result};
use crate::validation::validate_message;

/// Separator between messages when multi-message mode is on.
pub const MESSAGE_SEPARATOR: char = ';';

/// Characters of the last message shown in a progress event.
pub const PREVIEW_CHARS: usize = 10;

/// Immutable parameters of one send run.
#[derive(Debug, Clone, PartialEq)]
pub struct SendJob {
    /// Raw message text, already validated.
    pub template: String,
    pub repeat_count: u32,
    pub base_interval_secs: f64,
    /// Scale each delay by a random factor in `[0.8, 1.2]`.
    pub jitter_enabled: bool,
    /// Split `template` on `;` into several messages.
    pub multi_message_enabled: bool,
}

impl SendJob {
    pub fn new(template: impl Into<String>, repeat_count: u32, base_interval_secs: f64) -> Self {
        Self {
            template: template.into(),
            repeat_count,
            base_interval_secs,
            jitter_enabled: false,
            multi_message_enabled: false,
        }
    }

    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter_enabled = enabled;
        self
    }

    pub fn with_multi_message(mut self, enabled: bool) -> Self {
        self.multi_message_enabled = enabled;
        self
    }

    /// Checks the message and the count and interval ranges.
    pub fn validate(&self) -> Result<()> {
        validate_message(&self.template)?;
        check_repeat_count(self.repeat_count)?;
        check_interval(self.base_interval_secs)
    }

    /// Fails for an interval that is not a positive, representable duration.
    pub fn base_interval(&self) -> Result<Duration> {
        let secs = self.base_interval_secs;
        if secs.is_nan() || secs <= 0.0 {
            return Err(RepeaterError::config_validation(format!(
                "interval must be positive, got {secs}"
            )));
        }
        Duration::try_from_secs_f64(secs).map_err(|e| {
            RepeaterError::config_validation(format!("interval {secs} is out of range: {e}"))
        })
    }

    pub fn messages(&self) -> MessageList {
        MessageList::expand(&self.template, self.multi_message_enabled)
    }
}

/// Ordered messages sent in every iteration. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageList(Vec<String>);

impl MessageList {
    /// Splits `template` on `;` when `multi` is set, trimming each segment.
    /// Empty segments are kept.
    pub fn expand(template: &str, multi: bool) -> Self {
        if multi {
            Self(
                template
                    .split(MESSAGE_SEPARATOR)
                    .map(|segment| segment.trim().to_string())
                    .collect(),
            )
        } else {
            Self(vec![template.to_string()])
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// The exact text typed for `message`: NFC-composed and trimmed.
pub fn normalize(message: &str) -> String {
    message.nfc().collect::<String>().trim().to_string()
}

/// First `max` characters of `text` after trimming.
pub fn preview(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect()
}
