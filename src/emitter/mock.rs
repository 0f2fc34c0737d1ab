//! In-memory emitter for tests.
//!
//! `RecordingEmitter` performs no OS calls. Every call is appended to a shared
//! log together with the tokio clock reading, so tests can check both what was
//! typed and when. Clones share the same log, which lets a test keep one clone
//! while the controller owns the other.
//!
//! Failures are injected per character (`fail_on_char`) or for the bulk path
//! and the Enter key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use super::{EmitError, KeystrokeEmitter};

/// One recorded emitter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    Char(char),
    EnterDown,
    EnterUp,
    Bulk(String),
}

#[derive(Default)]
struct Failures {
    chars: HashMap<char, EmitError>,
    bulk: Option<EmitError>,
    enter: Option<EmitError>,
}

#[derive(Clone, Default)]
pub struct RecordingEmitter {
    log: Arc<Mutex<Vec<(Instant, Emission)>>>,
    failures: Arc<Mutex<Failures>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `type_char(ch)` call fail with `err`.
    pub fn fail_on_char(&self, ch: char, err: EmitError) {
        lock(&self.failures).chars.insert(ch, err);
    }

    /// Makes every `write_bulk` call fail with `err`.
    pub fn fail_bulk(&self, err: EmitError) {
        lock(&self.failures).bulk = Some(err);
    }

    /// Makes every Enter press fail with `err`.
    pub fn fail_enter(&self, err: EmitError) {
        lock(&self.failures).enter = Some(err);
    }

    /// All successful calls in order.
    pub fn emissions(&self) -> Vec<Emission> {
        lock(&self.log).iter().map(|(_, e)| e.clone()).collect()
    }

    /// Number of successful calls so far.
    pub fn len(&self) -> usize {
        lock(&self.log).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.log).is_empty()
    }

    /// Clock readings of every Enter release, one per delivered message.
    pub fn enter_times(&self) -> Vec<Instant> {
        lock(&self.log)
            .iter()
            .filter(|(_, e)| *e == Emission::EnterUp)
            .map(|(at, _)| *at)
            .collect()
    }

    /// Reassembles delivered messages: characters and bulk writes up to each
    /// Enter release.
    pub fn messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        for (_, emission) in lock(&self.log).iter() {
            match emission {
                Emission::Char(c) => current.push(*c),
                Emission::Bulk(s) => current.push_str(s),
                Emission::EnterDown => {}
                Emission::EnterUp => out.push(std::mem::take(&mut current)),
            }
        }
        out
    }

    fn record(&self, emission: Emission) {
        lock(&self.log).push((Instant::now(), emission));
    }
}

impl KeystrokeEmitter for RecordingEmitter {
    fn type_char(&mut self, ch: char) -> Result<(), EmitError> {
        if let Some(err) = lock(&self.failures).chars.get(&ch) {
            return Err(err.clone());
        }
        self.record(Emission::Char(ch));
        Ok(())
    }

    fn press_enter(&mut self) -> Result<(), EmitError> {
        if let Some(err) = &lock(&self.failures).enter {
            return Err(err.clone());
        }
        self.record(Emission::EnterDown);
        Ok(())
    }

    fn release_enter(&mut self) -> Result<(), EmitError> {
        self.record(Emission::EnterUp);
        Ok(())
    }

    fn write_bulk(&mut self, text: &str) -> Result<(), EmitError> {
        if let Some(err) = &lock(&self.failures).bulk {
            return Err(err.clone());
        }
        self.record(Emission::Bulk(text.to_string()));
        Ok(())
    }
}
