use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use message_repeater::config::{
    format_duration, parse_duration, Config, MAX_INTERVAL_SECS, MAX_REPEAT_COUNT, MIN_INTERVAL_SECS,
};
use message_repeater::form::{CloseDecision, FormUpdate, STARTUP_NOTICE};
use message_repeater::{EnigoEmitter, FinishReason, SettingsForm, StopHotkey};

/// Type a message into the focused window, again and again.
#[derive(Parser, Debug)]
#[command(name = "mrep", version, about, long_about = None)]
struct Cli {
    /// Message to send. With --multi-message, ';' separates messages.
    message: Option<String>,

    /// How many times to send (1-1000)
    #[arg(
        short = 'n',
        long,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_REPEAT_COUNT))
    )]
    count: Option<u32>,

    /// Seconds between rounds (0.1-10.0)
    #[arg(short, long, value_parser = parse_interval)]
    interval: Option<f64>,

    /// Vary the interval randomly by up to ±20%
    #[arg(short, long)]
    random_interval: bool,

    /// Split the message on ';' and send each part
    #[arg(short, long)]
    multi_message: bool,

    /// JSON settings file; flags override its values
    #[arg(short, long)]
    config: Option<String>,

    /// Delay before the first message, e.g. "3s" or "500ms"
    #[arg(long, value_parser = parse_grace)]
    grace: Option<Duration>,

    /// Global hotkey that stops the run
    #[arg(long)]
    stop_hotkey: Option<String>,

    /// Do not register a global stop hotkey
    #[arg(long)]
    no_hotkey: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_interval(value: &str) -> std::result::Result<f64, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("not a number: {e}"))?;
    if (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&secs) {
        Ok(secs)
    } else {
        Err(format!(
            "must be between {MIN_INTERVAL_SECS} and {MAX_INTERVAL_SECS} seconds"
        ))
    }
}

fn parse_grace(value: &str) -> std::result::Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(message) = self.message {
            config.message = message;
        }
        if let Some(count) = self.count {
            config.repeat_count = count;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(grace) = self.grace {
            config.grace_delay = grace;
        }
        if let Some(hotkey) = self.stop_hotkey {
            config.stop_hotkey = hotkey;
        }
        if self.no_hotkey {
            config.stop_hotkey.clear();
        }
        config.random_interval |= self.random_interval;
        config.multi_message |= self.multi_message;
        config.verbose |= self.verbose;

        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn ask_to_quit() -> bool {
    print!(
        "{} ",
        "A send job is still running. Quit anyway? [y/N]".yellow()
    );
    let _ = io::stdout().flush();

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(e) => {
            warn!(error = %e, "could not read confirmation");
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;
    init_logging(config.verbose);

    println!("{}", "Message Repeater".bold().cyan());
    println!("{STARTUP_NOTICE}");
    println!();

    if let Err(e) = config.validate() {
        eprintln!("{} {e}", "Input error:".red().bold());
        bail!("invalid settings");
    }

    let emitter = EnigoEmitter::new().context("failed to open keyboard input")?;
    let mut form = SettingsForm::new();
    let mut events = form.submit(config.to_job(), emitter, config.grace_delay)?;

    let done = CancellationToken::new();
    let hotkey = match (config.hotkey(), form.handle()) {
        (Some(combo), Some(handle)) => match StopHotkey::register(combo) {
            Ok(hotkey) => {
                let _listener = hotkey.listen(handle.cancel_token(), done.clone());
                Some(hotkey)
            }
            Err(e) => {
                warn!(error = %e, "continuing without a stop hotkey");
                None
            }
        },
        _ => None,
    };

    println!(
        "{} sending starts in {}, switch to the target window now",
        form.status().green(),
        format_duration(config.grace_delay)
    );
    match &hotkey {
        Some(hotkey) => println!("Press {} or Ctrl+C to stop.", hotkey.combo().bold()),
        None => println!("Press Ctrl+C to stop."),
    }

    let mut outcome = None;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match form.handle_event(&event) {
                    FormUpdate::Status(status) => println!("{}", status.green()),
                    FormUpdate::Notify(message) => {
                        eprintln!("{} {message}", "Error:".red().bold());
                    }
                    FormUpdate::Finished { reason, summary } => {
                        println!("{}", summary.bold());
                        outcome = Some(reason);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if !form.is_busy() {
                    break;
                }
                let confirmed = tokio::task::spawn_blocking(ask_to_quit).await.unwrap_or(false);
                match form.close(confirmed).await {
                    CloseDecision::Accept => {
                        println!("{}", "Stopped.".yellow());
                        outcome = Some(FinishReason::Stopped);
                        break;
                    }
                    CloseDecision::Cancel => println!("{}", "Continuing.".green()),
                }
            }
        }
    }

    done.cancel();
    drop(hotkey);
    debug!(?outcome, "exiting");

    if outcome == Some(FinishReason::Failed) {
        bail!("send run failed");
    }
    Ok(())
}
