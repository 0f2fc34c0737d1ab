//! # Message Repeater
//!
//! A command-line tool that types a text message into whatever window has
//! keyboard focus, a configurable number of times.
//!
//! ## Features
//!
//! - Repeat count and interval between sends
//! - Optional ±20% random jitter on the interval
//! - Several messages per round, separated by `;`
//! - Full Unicode input, NFC-normalized before typing
//! - Global hotkey to stop without leaving the target window
//! - JSON settings file support
//!
//! ## Example
//!
//! ```no_run
//! use message_repeater::{EnigoEmitter, SendController, SendJob};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let job = SendJob::new("good game;well played", 3, 1.5).with_multi_message(true);
//! let (controller, mut events) = SendController::new(job, EnigoEmitter::new()?);
//! let handle = controller.start();
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//!     if event.is_finished() {
//!         break;
//!     }
//! }
//! # drop(handle);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```json
//! {
//!   "message": "hello",
//!   "repeat_count": 10,
//!   "interval_secs": 1.0,
//!   "random_interval": true
//! }
//! ```

pub mod config;
pub mod controller;
pub mod emitter;
pub mod error;
pub mod form;
pub mod hotkey;
pub mod message;
pub mod validation;

pub use config::Config;
pub use controller::{ControllerEvent, FinishReason, Progress, RunPhase, SendController, SendHandle};
pub use emitter::{EmitError, EnigoEmitter, KeystrokeEmitter};
pub use error::{RepeaterError, Result};
pub use form::SettingsForm;
pub use hotkey::StopHotkey;
pub use message::{MessageList, SendJob};
