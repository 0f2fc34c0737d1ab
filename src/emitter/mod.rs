//! Keystroke emission.
//!
//! The [`KeystrokeEmitter`] trait is the boundary between the send loop and
//! the OS input facility. [`EnigoEmitter`] is the real implementation;
//! [`mock::RecordingEmitter`] records calls for tests.

mod backend;
pub mod mock;

pub use self::backend::EnigoEmitter;

use thiserror::Error;

use crate::validation::is_printable;

/// Failure reported by a [`KeystrokeEmitter`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// The backend has no way to type this character.
    #[error("unsupported character {character:?}: {reason}")]
    UnsupportedCharacter { character: char, reason: String },

    /// Any other injection failure.
    #[error("keystroke injection failed: {0}")]
    Injection(String),

    /// The input backend could not be opened.
    #[error("input backend unavailable: {0}")]
    Unavailable(String),
}

impl EmitError {
    /// Whether the failure is attributable to the character being typed.
    ///
    /// Such failures are recovered through [`KeystrokeEmitter::write_bulk`];
    /// everything else aborts the run.
    pub fn is_character_failure(&self) -> bool {
        matches!(self, Self::UnsupportedCharacter { .. }) || self.to_string().contains("character")
    }
}

/// An OS-level service that injects keystrokes into the focused window.
pub trait KeystrokeEmitter: Send {
    /// Types a single character.
    fn type_char(&mut self, ch: char) -> Result<(), EmitError>;

    /// Presses the Enter key.
    fn press_enter(&mut self) -> Result<(), EmitError>;

    /// Releases the Enter key.
    fn release_enter(&mut self) -> Result<(), EmitError>;

    /// Writes a whole string through the backend's alternate text path.
    ///
    /// Only used after [`type_char`](Self::type_char) rejected a character.
    fn write_bulk(&mut self, text: &str) -> Result<(), EmitError>;
}

impl<E: KeystrokeEmitter + ?Sized> KeystrokeEmitter for Box<E> {
    fn type_char(&mut self, ch: char) -> Result<(), EmitError> {
        (**self).type_char(ch)
    }

    fn press_enter(&mut self) -> Result<(), EmitError> {
        (**self).press_enter()
    }

    fn release_enter(&mut self) -> Result<(), EmitError> {
        (**self).release_enter()
    }

    fn write_bulk(&mut self, text: &str) -> Result<(), EmitError> {
        (**self).write_bulk(text)
    }
}

/// Decodes numeric backslash escapes in `text` before it goes through the
/// bulk path.
///
/// Only `\xHH`, `\uHHHH` and `\UHHHHHHHH` are decoded, and only when they
/// name a printable character. Everything else, `\n` and `\\` included, is
/// kept literally, so a path like `C:\new` is typed as written. Decoding
/// works on characters, so non-ASCII text passes through unchanged.
pub fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        let width = match chars.peek() {
            Some('x') => 2,
            Some('u') => 4,
            Some('U') => 8,
            _ => {
                out.push('\\');
                continue;
            }
        };

        let digits: String = chars.clone().skip(1).take(width).collect();
        let decoded = (digits.len() == width && digits.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| u32::from_str_radix(&digits, 16).ok())
            .flatten()
            .and_then(char::from_u32)
            .filter(|c| is_printable(*c));

        match decoded {
            Some(c) => {
                for _ in 0..=width {
                    chars.next();
                }
                out.push(c);
            }
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_failure_detection() {
        let err = EmitError::UnsupportedCharacter {
            character: '😀',
            reason: "no keycode".to_string(),
        };
        assert!(err.is_character_failure());

        let err = EmitError::Injection("could not map character to keysym".to_string());
        assert!(err.is_character_failure());

        let err = EmitError::Injection("display connection lost".to_string());
        assert!(!err.is_character_failure());

        assert!(!EmitError::Unavailable("no X server".to_string()).is_character_failure());
    }

    #[test]
    fn test_decode_keeps_backslash_text() {
        assert_eq!(decode_escapes(r"C:\new\tmp"), r"C:\new\tmp");
        assert_eq!(decode_escapes(r"a\\b"), r"a\\b");
        assert_eq!(decode_escapes(r#"say \"hi\""#), r#"say \"hi\""#);
    }

    #[test]
    fn test_decode_numeric_escapes() {
        assert_eq!(decode_escapes(r"\x41é\U0001F600"), "Aé😀");
        assert_eq!(decode_escapes(r"\u00e9t\u00e9"), "été");
    }

    #[test]
    fn test_decode_refuses_non_printable_results() {
        assert_eq!(decode_escapes(r"\x0A"), r"\x0A");
        assert_eq!(decode_escapes(r"\u200B"), r"\u200B");
        assert_eq!(decode_escapes(r"\uE000"), r"\uE000");
    }

    #[test]
    fn test_decode_keeps_unknown_and_malformed() {
        assert_eq!(decode_escapes(r"\q"), r"\q");
        assert_eq!(decode_escapes(r"\u12"), r"\u12");
        assert_eq!(decode_escapes(r"\uZZZZ"), r"\uZZZZ");
        assert_eq!(decode_escapes("trailing\\"), "trailing\\");
        // surrogate code points are not chars
        assert_eq!(decode_escapes(r"\uD800"), r"\uD800");
    }

    #[test]
    fn test_decode_preserves_non_ascii() {
        assert_eq!(decode_escapes("héllo 世界"), "héllo 世界");
    }
}
