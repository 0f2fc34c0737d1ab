//! The send loop.
//!
//! A [`SendController`] owns one [`SendJob`] and one emitter. [`start`]
//! consumes it, spawns the loop on the tokio runtime and hands back a
//! [`SendHandle`] for stopping plus an [`EventStream`] that carries progress,
//! at most one error and exactly one final [`ControllerEvent::Finished`].
//!
//! Phases move `Idle -> Running -> (Stopping | Errored)? -> Finished`.
//! Cancellation is cooperative: it is checked at the start of every
//! iteration and interrupts both delays, but never a message in flight.
//!
//! [`start`]: SendController::start

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_GRACE_DELAY;
use crate::emitter::{decode_escapes, EmitError, KeystrokeEmitter};
use crate::error::Result;
use crate::message::{normalize, preview, MessageList, SendJob, PREVIEW_CHARS};

/// Lower and upper bound of the random delay factor.
pub const JITTER_MIN: f64 = 0.8;
pub const JITTER_MAX: f64 = 1.2;

/// Receiving end of a run's events.
pub type EventStream = mpsc::UnboundedReceiver<ControllerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Stopping,
    Errored,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Completed,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Iterations done so far, starting at 1.
    pub completed: u32,
    pub total: u32,
    /// Start of the last message sent in the iteration.
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Progress(Progress),
    Error(String),
    Finished(FinishReason),
}

impl ControllerEvent {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Mutable loop state, private to the running task.
#[derive(Debug, Default)]
struct RunState {
    running: bool,
    current_iteration: u32,
}

/// Delay before the next iteration: `base`, or `base` scaled by a factor
/// drawn uniformly from `[0.8, 1.2]` when `jitter` is set.
pub fn next_interval<R: Rng>(base: Duration, jitter: bool, rng: &mut R) -> Duration {
    if jitter {
        let factor = rng.random_range(JITTER_MIN..=JITTER_MAX);
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    } else {
        base
    }
}

/// Types one message: every character, then Enter.
///
/// When a character is rejected as untypeable, the rest of the message,
/// escape-decoded, goes through the bulk path instead.
fn deliver<E: KeystrokeEmitter + ?Sized>(
    emitter: &mut E,
    message: &str,
) -> std::result::Result<(), EmitError> {
    let text = normalize(message);

    for (offset, ch) in text.char_indices() {
        match emitter.type_char(ch) {
            Ok(()) => {}
            Err(err) if err.is_character_failure() => {
                warn!(character = ?ch, error = %err, "falling back to bulk write");
                let rest = text.get(offset..).unwrap_or_default();
                emitter.write_bulk(&decode_escapes(rest))?;
                break;
            }
            Err(err) => return Err(err),
        }
    }

    emitter.press_enter()?;
    emitter.release_enter()
}

pub struct SendController<E> {
    job: SendJob,
    messages: MessageList,
    emitter: E,
    grace_delay: Duration,
    rng: StdRng,
    state: RunState,
    cancel: CancellationToken,
    phase: Arc<watch::Sender<RunPhase>>,
    events: mpsc::UnboundedSender<ControllerEvent>,
}

impl<E: KeystrokeEmitter + 'static> SendController<E> {
    /// Creates an idle controller. The job's messages are expanded here and
    /// stay fixed for the run.
    pub fn new(job: SendJob, emitter: E) -> (Self, EventStream) {
        let (events, stream) = mpsc::unbounded_channel();
        let (phase, _) = watch::channel(RunPhase::Idle);
        let controller = Self {
            messages: job.messages(),
            job,
            emitter,
            grace_delay: DEFAULT_GRACE_DELAY,
            rng: StdRng::from_os_rng(),
            state: RunState::default(),
            cancel: CancellationToken::new(),
            phase: Arc::new(phase),
            events,
        };
        (controller, stream)
    }

    pub fn with_grace_delay(mut self, grace_delay: Duration) -> Self {
        self.grace_delay = grace_delay;
        self
    }

    /// Seeds the jitter generator, for reproducible delays.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Spawns the loop. Must be called inside a tokio runtime.
    pub fn start(self) -> SendHandle {
        let cancel = self.cancel.clone();
        let phase = Arc::clone(&self.phase);
        phase.send_replace(RunPhase::Running);
        let task = tokio::spawn(self.run());
        SendHandle {
            cancel,
            phase,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        self.state.running = true;
        info!(
            repeat = self.job.repeat_count,
            messages = self.messages.len(),
            interval_secs = self.job.base_interval_secs,
            jitter = self.job.jitter_enabled,
            "send run started"
        );

        let reason = match self.drive().await {
            Ok(reason) => reason,
            Err(err) => {
                error!(
                    iteration = self.state.current_iteration,
                    error = %err,
                    "send run failed"
                );
                self.phase.send_replace(RunPhase::Errored);
                self.publish(ControllerEvent::Error(err.to_string()));
                FinishReason::Failed
            }
        };

        self.state.running = false;
        info!(?reason, "send run finished");
        self.phase.send_replace(RunPhase::Finished);
        self.publish(ControllerEvent::Finished(reason));
    }

    async fn drive(&mut self) -> Result<FinishReason> {
        let base = self.job.base_interval()?;
        if !pause(&self.cancel, &self.phase, self.grace_delay).await {
            return Ok(FinishReason::Stopped);
        }

        let total = self.job.repeat_count;
        for i in 0..total {
            if self.stop_requested() {
                return Ok(FinishReason::Stopped);
            }
            self.state.current_iteration = i;

            for msg in self.messages.iter() {
                debug!(iteration = i, text = msg, "delivering");
                deliver(&mut self.emitter, msg)?;
            }

            let delay = next_interval(base, self.job.jitter_enabled, &mut self.rng);
            let slept = pause(&self.cancel, &self.phase, delay).await;

            self.publish(ControllerEvent::Progress(Progress {
                completed: i + 1,
                total,
                preview: preview(self.messages.last(), PREVIEW_CHARS),
            }));

            if !slept {
                return Ok(FinishReason::Stopped);
            }
        }

        Ok(FinishReason::Completed)
    }

    fn stop_requested(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            self.state.running = false;
            mark_stopping(&self.phase);
        }
        !self.state.running
    }

    fn publish(&self, event: ControllerEvent) {
        // The subscriber may be gone; the run carries on regardless.
        let _ = self.events.send(event);
    }
}

/// Sleeps for `delay`. Returns `false` if a stop cut it short.
async fn pause(
    cancel: &CancellationToken,
    phase: &watch::Sender<RunPhase>,
    delay: Duration,
) -> bool {
    tokio::select! {
        () = cancel.cancelled() => {
            mark_stopping(phase);
            false
        }
        () = tokio::time::sleep(delay) => true,
    }
}

fn mark_stopping(phase: &watch::Sender<RunPhase>) {
    phase.send_if_modified(|current| {
        let running = *current == RunPhase::Running;
        if running {
            *current = RunPhase::Stopping;
        }
        running
    });
}

/// Control over a started run.
pub struct SendHandle {
    cancel: CancellationToken,
    phase: Arc<watch::Sender<RunPhase>>,
    task: Option<JoinHandle<()>>,
}

impl SendHandle {
    /// Requests a stop. Returns immediately; the loop notices at its next
    /// checkpoint.
    pub fn stop(&self) {
        self.cancel.cancel();
        mark_stopping(&self.phase);
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.phase() != RunPhase::Finished
    }

    /// Token that stops this run when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the run task to end.
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "send task panicked");
            }
        }
    }

    /// Waits at most `timeout` for the run to end. Returns whether it did.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> bool {
        let Some(task) = self.task.as_mut() else {
            return true;
        };
        let outcome = tokio::time::timeout(timeout, task).await;
        match outcome {
            Ok(result) => {
                if let Err(e) = result {
                    error!(error = %e, "send task panicked");
                }
                self.task = None;
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::mock::{Emission, RecordingEmitter};

    #[test]
    fn test_interval_without_jitter_is_base() {
        let mut rng = StdRng::seed_from_u64(7);
        let base = Duration::from_millis(1500);
        for _ in 0..100 {
            assert_eq!(next_interval(base, false, &mut rng), base);
        }
    }

    #[test]
    fn test_jitter_is_uniform_within_twenty_percent() {
        let mut rng = StdRng::seed_from_u64(42);
        let base = Duration::from_secs(1);
        let samples: Vec<f64> = (0..20_000)
            .map(|_| next_interval(base, true, &mut rng).as_secs_f64())
            .collect();

        assert!(samples.iter().all(|s| (0.8..=1.2).contains(s)));

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((mean - 1.0).abs() < 0.01, "mean {mean}");

        // four equal-width buckets should each hold about a quarter
        let mut buckets = [0usize; 4];
        for s in &samples {
            let idx = (((s - 0.8) / 0.1) as usize).min(3);
            buckets[idx] += 1;
        }
        for count in buckets {
            let share = count as f64 / samples.len() as f64;
            assert!((share - 0.25).abs() < 0.02, "bucket share {share}");
        }
    }

    #[test]
    fn test_jitter_saturates_instead_of_overflowing() {
        let mut rng = StdRng::seed_from_u64(3);
        let huge = Duration::from_secs(u64::MAX);
        let delays: Vec<Duration> = (0..100)
            .map(|_| next_interval(huge, true, &mut rng))
            .collect();
        assert!(delays.contains(&Duration::MAX));
        assert!(delays.iter().all(|d| *d >= huge.mul_f64(0.79)));
    }

    #[test]
    fn test_deliver_types_then_enter() {
        let mut emitter = RecordingEmitter::new();
        deliver(&mut emitter, " hi ").unwrap();
        assert_eq!(
            emitter.emissions(),
            vec![
                Emission::Char('h'),
                Emission::Char('i'),
                Emission::EnterDown,
                Emission::EnterUp,
            ]
        );
    }

    #[test]
    fn test_deliver_falls_back_for_remainder() {
        let mut emitter = RecordingEmitter::new();
        emitter.fail_on_char(
            '😀',
            EmitError::UnsupportedCharacter {
                character: '😀',
                reason: "no keysym".to_string(),
            },
        );
        deliver(&mut emitter, "ok😀 done").unwrap();
        assert_eq!(
            emitter.emissions(),
            vec![
                Emission::Char('o'),
                Emission::Char('k'),
                Emission::Bulk("😀 done".to_string()),
                Emission::EnterDown,
                Emission::EnterUp,
            ]
        );
    }

    #[test]
    fn test_deliver_propagates_other_failures() {
        let mut emitter = RecordingEmitter::new();
        emitter.fail_on_char('x', EmitError::Injection("device gone".to_string()));
        let err = deliver(&mut emitter, "axb").unwrap_err();
        assert_eq!(err, EmitError::Injection("device gone".to_string()));
        assert_eq!(emitter.emissions(), vec![Emission::Char('a')]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_transitions_to_finished() {
        let emitter = RecordingEmitter::new();
        let (controller, mut events) = SendController::new(SendJob::new("x", 1, 0.5), emitter);
        assert_eq!(controller.phase(), RunPhase::Idle);

        let mut handle = controller.with_grace_delay(Duration::ZERO).start();
        assert_eq!(handle.phase(), RunPhase::Running);

        while let Some(event) = events.recv().await {
            if event.is_finished() {
                break;
            }
        }
        handle.wait().await;
        assert_eq!(handle.phase(), RunPhase::Finished);
        assert!(!handle.is_active());
    }
}
