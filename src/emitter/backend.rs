use enigo::{Direction, Enigo, InputError, Key, Keyboard, Settings};
use tracing::debug;

use super::{EmitError, KeystrokeEmitter};

/// Keystroke emitter backed by `enigo`.
///
/// Characters go through `Key::Unicode` clicks, which need a keymap entry
/// for the character. The bulk path uses enigo's text entry, which injects
/// the string directly and covers characters the keymap cannot.
pub struct EnigoEmitter {
    enigo: Enigo,
}

impl EnigoEmitter {
    pub fn new() -> Result<Self, EmitError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| EmitError::Unavailable(e.to_string()))?;
        Ok(Self { enigo })
    }

    fn enter(&mut self, direction: Direction) -> Result<(), EmitError> {
        self.enigo
            .key(Key::Return, direction)
            .map_err(|e| EmitError::Injection(format!("enter {direction:?}: {e}")))
    }
}

fn classify(ch: char, err: InputError) -> EmitError {
    match err {
        InputError::Mapping(_) | InputError::NoEmptyKeycodes => EmitError::UnsupportedCharacter {
            character: ch,
            reason: err.to_string(),
        },
        other => EmitError::Injection(other.to_string()),
    }
}

impl KeystrokeEmitter for EnigoEmitter {
    fn type_char(&mut self, ch: char) -> Result<(), EmitError> {
        self.enigo
            .key(Key::Unicode(ch), Direction::Click)
            .map_err(|e| classify(ch, e))
    }

    fn press_enter(&mut self) -> Result<(), EmitError> {
        self.enter(Direction::Press)
    }

    fn release_enter(&mut self) -> Result<(), EmitError> {
        self.enter(Direction::Release)
    }

    fn write_bulk(&mut self, text: &str) -> Result<(), EmitError> {
        debug!(chars = text.chars().count(), "bulk text write");
        self.enigo
            .text(text)
            .map_err(|e| EmitError::Injection(e.to_string()))
    }
}
