//! Global stop hotkey.
//!
//! Typing goes to whatever window has focus, so the terminal cannot be used to
//! stop a run without stealing focus from the target. A global hotkey can.

use std::time::Duration;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{RepeaterError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

const NAMED_KEYS: &[(&str, Code)] = &[
    ("space", Code::Space),
    ("enter", Code::Enter),
    ("return", Code::Enter),
    ("tab", Code::Tab),
    ("escape", Code::Escape),
    ("esc", Code::Escape),
    ("backspace", Code::Backspace),
    ("delete", Code::Delete),
    ("insert", Code::Insert),
    ("home", Code::Home),
    ("end", Code::End),
    ("pageup", Code::PageUp),
    ("pagedown", Code::PageDown),
    ("pause", Code::Pause),
    ("up", Code::ArrowUp),
    ("down", Code::ArrowDown),
    ("left", Code::ArrowLeft),
    ("right", Code::ArrowRight),
];

fn parse_modifier(part: &str) -> Option<Modifiers> {
    match part {
        "ctrl" | "control" => Some(Modifiers::CONTROL),
        "alt" => Some(Modifiers::ALT),
        "shift" => Some(Modifiers::SHIFT),
        "meta" | "cmd" | "super" => Some(Modifiers::SUPER),
        _ => None,
    }
}

/// Single letters and digits, `f1`..`f12`, or one of [`NAMED_KEYS`].
fn parse_key_code(key: &str) -> Option<Code> {
    let mut chars = key.chars();
    let name = match (chars.next(), chars.next()) {
        (Some(c @ 'a'..='z'), None) => format!("Key{}", c.to_ascii_uppercase()),
        (Some(c @ '0'..='9'), None) => format!("Digit{c}"),
        _ => match key.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
            Some(n @ 1..=12) => format!("F{n}"),
            _ => {
                return NAMED_KEYS
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, code)| *code)
            }
        },
    };
    name.parse().ok()
}

/// Parses combos such as `"ctrl+alt+s"` or `"f8"`: any number of modifiers
/// and exactly one key.
pub fn parse_hotkey(combo: &str) -> Result<HotKey> {
    let lowered = combo.to_lowercase();
    let mut modifiers = Modifiers::empty();
    let mut code = None;

    for part in lowered.split('+').map(str::trim) {
        if part.is_empty() {
            return Err(RepeaterError::hotkey(format!("empty key in '{combo}'")));
        }
        if let Some(modifier) = parse_modifier(part) {
            modifiers |= modifier;
            continue;
        }
        if code.is_some() {
            return Err(RepeaterError::hotkey(format!(
                "more than one key in '{combo}'"
            )));
        }
        code = Some(
            parse_key_code(part)
                .ok_or_else(|| RepeaterError::hotkey(format!("unsupported key '{part}'")))?,
        );
    }

    let code = code.ok_or_else(|| RepeaterError::hotkey(format!("no key in '{combo}'")))?;
    let modifiers = (!modifiers.is_empty()).then_some(modifiers);
    Ok(HotKey::new(modifiers, code))
}

/// A registered global hotkey that stops the active run.
pub struct StopHotkey {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
    combo: String,
}

impl StopHotkey {
    pub fn register(combo: &str) -> Result<Self> {
        let hotkey = parse_hotkey(combo)?;
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| RepeaterError::hotkey(format!("failed to create hotkey manager: {e}")))?;
        manager
            .register(hotkey)
            .map_err(|e| RepeaterError::hotkey(format!("failed to register '{combo}': {e}")))?;

        info!(hotkey = combo, "stop hotkey registered");
        Ok(Self {
            manager,
            hotkey,
            combo: combo.to_string(),
        })
    }

    pub fn combo(&self) -> &str {
        &self.combo
    }

    /// Polls hotkey events on a blocking thread. A press cancels `stop`; the
    /// thread exits once `until` is cancelled.
    pub fn listen(&self, stop: CancellationToken, until: CancellationToken) -> JoinHandle<()> {
        let id = self.hotkey.id();
        let combo = self.combo.clone();

        tokio::task::spawn_blocking(move || {
            let receiver = GlobalHotKeyEvent::receiver();
            while !until.is_cancelled() {
                if let Ok(event) = receiver.try_recv() {
                    if event.id == id && event.state == HotKeyState::Pressed {
                        info!(hotkey = %combo, "stop hotkey pressed");
                        stop.cancel();
                    }
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        })
    }
}

impl Drop for StopHotkey {
    fn drop(&mut self) {
        if let Err(e) = self.manager.unregister(self.hotkey) {
            warn!(hotkey = %self.combo, error = %e, "failed to unregister stop hotkey");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modifier_combo() {
        let hotkey = parse_hotkey("Ctrl+Alt+S").unwrap();
        assert_eq!(
            hotkey,
            HotKey::new(Some(Modifiers::CONTROL | Modifiers::ALT), Code::KeyS)
        );
    }

    #[test]
    fn test_parse_plain_keys() {
        assert_eq!(parse_hotkey("f8").unwrap(), HotKey::new(None, Code::F8));
        assert_eq!(parse_hotkey("esc").unwrap(), HotKey::new(None, Code::Escape));
        assert_eq!(
            parse_hotkey("shift + 7").unwrap(),
            HotKey::new(Some(Modifiers::SHIFT), Code::Digit7)
        );
    }

    #[test]
    fn test_key_code_ranges() {
        assert_eq!(parse_key_code("a"), Some(Code::KeyA));
        assert_eq!(parse_key_code("z"), Some(Code::KeyZ));
        assert_eq!(parse_key_code("0"), Some(Code::Digit0));
        assert_eq!(parse_key_code("f1"), Some(Code::F1));
        assert_eq!(parse_key_code("f12"), Some(Code::F12));
        assert_eq!(parse_key_code("pagedown"), Some(Code::PageDown));
        assert_eq!(parse_key_code("é"), None);
    }

    #[test]
    fn test_parse_rejects_bad_combos() {
        assert!(parse_hotkey("").is_err());
        assert!(parse_hotkey("ctrl+alt").is_err());
        assert!(parse_hotkey("ctrl+a+b").is_err());
        assert!(parse_hotkey("ctrl++a").is_err());
        assert!(parse_hotkey("f13").is_err());
        assert!(parse_hotkey("f0").is_err());
        assert!(parse_hotkey("hyper+a").is_err());
    }
}
