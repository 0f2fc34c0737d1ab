//! Message validation run before a job is started.

use unicode_general_category::{get_general_category, GeneralCategory};

use crate::error::{RepeaterError, Result};

/// Short name of a category the emitter cannot type, if `ch` is in one.
fn rejected_category(ch: char) -> Option<&'static str> {
    match get_general_category(ch) {
        GeneralCategory::Control => Some("Cc"),
        GeneralCategory::Format => Some("Cf"),
        GeneralCategory::PrivateUse => Some("Co"),
        GeneralCategory::Unassigned => Some("Cn"),
        _ => None,
    }
}

/// Whether `ch` passes the same category check as a message.
pub(crate) fn is_printable(ch: char) -> bool {
    rejected_category(ch).is_none()
}

/// Checks that `message` is non-empty after trimming and contains no control,
/// format, private-use or unassigned code points.
pub fn validate_message(message: &str) -> Result<()> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(RepeaterError::EmptyMessage);
    }

    match trimmed
        .chars()
        .find_map(|ch| rejected_category(ch).map(|category| (ch, category)))
    {
        Some((ch, category)) => Err(RepeaterError::non_printable(ch, category)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_printable_unicode() {
        assert!(validate_message("hello").is_ok());
        assert!(validate_message("你好，世界 😀").is_ok());
        assert!(validate_message("a;b;c").is_ok());
        assert!(validate_message("  padded  ").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(validate_message(""), Err(RepeaterError::EmptyMessage)));
        assert!(matches!(
            validate_message(" \t \n "),
            Err(RepeaterError::EmptyMessage)
        ));
    }

    #[test]
    fn test_rejects_each_category() {
        let cases = [
            ("bell\u{7}", "Cc", 0x7),
            ("zero\u{200b}width", "Cf", 0x200b),
            ("private\u{e000}", "Co", 0xe000),
            ("gap\u{378}", "Cn", 0x378),
        ];
        for (text, expected, expected_cp) in cases {
            match validate_message(text) {
                Err(RepeaterError::NonPrintableCharacter {
                    category,
                    codepoint,
                    ..
                }) => {
                    assert_eq!(category, expected, "category for {text:?}");
                    assert_eq!(codepoint, expected_cp);
                }
                other => panic!("expected rejection for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_interior_tab_is_rejected() {
        assert!(validate_message("a\tb").is_err());
    }
}
