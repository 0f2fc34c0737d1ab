//! Front-end state for a send run.
//!
//! [`SettingsForm`] sits between user input and the [`SendController`]. It
//! validates the job, keeps at most one job active, turns controller
//! events into status text and decides what happens on a close request. It
//! does no I/O itself; `main.rs` renders it to the terminal.

use std::time::Duration;

use tracing::warn;

use crate::controller::{ControllerEvent, EventStream, FinishReason, SendController, SendHandle};
use crate::emitter::KeystrokeEmitter;
use crate::error::{RepeaterError, Result};
use crate::message::{preview, SendJob};

/// Characters of the submitted message shown when a run completes.
pub const SUMMARY_CHARS: usize = 20;

/// How long a confirmed close waits for the run to settle.
pub const CLOSE_WAIT: Duration = Duration::from_secs(1);

pub const STARTUP_NOTICE: &str = "\
Before starting, make sure that:
  1. the target input window will have focus when sending begins
  2. the interval is set to something reasonable
  3. you follow the usage rules of the platform you are sending to";

/// Which controls are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

/// What the front end should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormUpdate {
    /// The status line changed.
    Status(String),
    /// Show this error prominently, then keep going.
    Notify(String),
    /// The run is over; the status line holds the summary.
    Finished { reason: FinishReason, summary: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Accept,
    Cancel,
}

pub struct SettingsForm {
    active: Option<SendHandle>,
    submitted: String,
    status: String,
}

impl Default for SettingsForm {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsForm {
    pub fn new() -> Self {
        Self {
            active: None,
            submitted: String::new(),
            status: "Ready".to_string(),
        }
    }

    /// Validates `job` and starts a run after `grace_delay`.
    pub fn submit<E: KeystrokeEmitter + 'static>(
        &mut self,
        job: SendJob,
        emitter: E,
        grace_delay: Duration,
    ) -> Result<EventStream> {
        if self.is_busy() {
            return Err(RepeaterError::JobAlreadyRunning);
        }
        job.validate()?;

        self.submitted = job.template.trim().to_string();
        let (controller, events) = SendController::new(job, emitter);
        self.active = Some(controller.with_grace_delay(grace_delay).start());
        self.status = "Running...".to_string();
        Ok(events)
    }

    /// Requests a stop of the active run, if any.
    pub fn stop(&mut self) {
        if let Some(handle) = &self.active {
            handle.stop();
            self.status = "Stopping...".to_string();
        }
    }

    pub fn handle_event(&mut self, event: &ControllerEvent) -> FormUpdate {
        match event {
            ControllerEvent::Progress(progress) => {
                self.status = format!(
                    "Sent {}/{}: {}...",
                    progress.completed, progress.total, progress.preview
                );
                FormUpdate::Status(self.status.clone())
            }
            ControllerEvent::Error(message) => FormUpdate::Notify(message.clone()),
            ControllerEvent::Finished(reason) => {
                self.active = None;
                self.status = format!("Done: {}...", preview(&self.submitted, SUMMARY_CHARS));
                FormUpdate::Finished {
                    reason: *reason,
                    summary: self.status.clone(),
                }
            }
        }
    }

    /// Handles a close request. `confirmed` is the user's answer to "a job is
    /// still running, quit anyway?"; it is ignored when nothing is running.
    pub async fn close(&mut self, confirmed: bool) -> CloseDecision {
        if !self.is_busy() {
            self.active = None;
            return CloseDecision::Accept;
        }
        let Some(handle) = self.active.as_mut() else {
            return CloseDecision::Accept;
        };
        if !confirmed {
            return CloseDecision::Cancel;
        }

        handle.stop();
        if !handle.wait_timeout(CLOSE_WAIT).await {
            warn!("send run did not settle before close");
        }
        self.active = None;
        CloseDecision::Accept
    }

    /// Whether a job is running, including one that is stopping.
    pub fn is_busy(&self) -> bool {
        self.active.as_ref().is_some_and(SendHandle::is_active)
    }

    pub fn affordances(&self) -> Affordances {
        let busy = self.is_busy();
        Affordances {
            start_enabled: !busy,
            stop_enabled: busy,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn handle(&self) -> Option<&SendHandle> {
        self.active.as_ref()
    }
}
