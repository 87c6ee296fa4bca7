use std::io::{self, Write};
use std::sync::Arc;

use chrono::{Local, Utc};
use clap::Args;
use serde::Serialize;
use simmer_core::timer::SinkError;
use simmer_core::{
    AlertSink, Config, CoreError, CountdownEngine, EngineConfig, ExtraTimerSet,
    ExtraTimerStore, InputUnit, PrimaryTimerStore, SilentAlert, SystemClock, TimerId,
    TimerManager, TimerRecord, TimerSetup,
};
use tracing::info;

#[derive(Args)]
pub struct RunArgs {
    /// Main countdown duration, in the configured input unit
    #[arg(long, short = 'd')]
    duration: u64,

    /// Extra countdown duration, repeatable
    #[arg(long = "extra", short = 'x', value_name = "DURATION")]
    extras: Vec<u64>,

    /// Override the configured input unit
    #[arg(long, value_enum)]
    unit: Option<UnitArg>,

    /// Print state updates as JSON lines instead of a live countdown
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum UnitArg {
    Minutes,
    Seconds,
}

impl From<UnitArg> for InputUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Minutes => InputUnit::Minutes,
            UnitArg::Seconds => InputUnit::Seconds,
        }
    }
}

/// Rings the terminal bell. Re-ringing while a previous bell is still
/// sounding is harmless, which is all the idempotence the engine asks for.
/// Goes through stderr so `--json` output stays clean when piped.
struct TerminalBell;

impl AlertSink for TerminalBell {
    fn play_alert(&self) -> Result<(), SinkError> {
        let mut stderr = io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct ExtraStatus {
    id: String,
    remaining_ms: u64,
    finished: bool,
}

#[derive(Serialize)]
struct StatusLine {
    at: chrono::DateTime<Utc>,
    remaining_ms: u64,
    paused: bool,
    finished: bool,
    extras: Vec<ExtraStatus>,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let unit = args
        .unit
        .map(InputUnit::from)
        .unwrap_or(config.timer.input_unit);

    let mut setup = TimerSetup::new(unit, args.duration);
    for duration in &args.extras {
        setup = setup.with_extra(TimerId::new(), *duration);
    }

    let primary = Arc::new(PrimaryTimerStore::new());
    let extras = Arc::new(ExtraTimerStore::new());
    let manager = TimerManager::new(Arc::clone(&primary), Arc::clone(&extras));
    manager.start(&setup)?;

    let alert: Arc<dyn AlertSink> = if config.alerts.sound {
        Arc::new(TerminalBell)
    } else {
        Arc::new(SilentAlert)
    };
    let engine = CountdownEngine::new(
        Arc::new(SystemClock::new()),
        Arc::clone(&primary),
        Arc::clone(&extras),
        alert,
        EngineConfig::from(&config),
    );
    let handle = engine.spawn();
    info!(extras = args.extras.len(), "countdown started");

    if !args.json {
        println!("Started at {}", Local::now().format("%H:%M:%S"));
    }

    let mut primary_rx = primary.subscribe();
    let mut extras_rx = extras.subscribe();
    let mut last_line = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Interrupted.");
                break;
            }
            changed = primary_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let rec = *primary_rx.borrow_and_update();
                let set = extras_rx.borrow_and_update().clone();
                if args.json {
                    render_json(rec, &set)?;
                } else {
                    render_plain(rec, &set, &mut last_line)?;
                }
                if all_finished(rec, &set) {
                    println!();
                    println!("Done.");
                    break;
                }
            }
        }
    }

    handle.stop();
    match handle.join().await {
        Ok(()) | Err(CoreError::Cancelled) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn all_finished(rec: Option<TimerRecord>, extras: &ExtraTimerSet) -> bool {
    rec.is_some_and(|r| r.is_finished) && extras.values().all(|r| r.is_finished)
}

fn render_plain(
    rec: Option<TimerRecord>,
    extras: &ExtraTimerSet,
    last_line: &mut String,
) -> io::Result<()> {
    let Some(rec) = rec else {
        return Ok(());
    };

    let mut line = crate::common::format_clock(rec.remaining_ms);
    if rec.is_paused {
        line.push_str(" (paused)");
    } else if rec.is_finished {
        line.push_str(" (done)");
    }
    if !extras.is_empty() {
        line.push_str("  |  extras:");
        for extra in extras.values() {
            line.push(' ');
            line.push_str(&crate::common::format_clock(extra.remaining_ms));
        }
    }

    // Redraw in place, and only when the visible text changes.
    if line != *last_line {
        let mut stdout = io::stdout();
        write!(stdout, "\r\x1b[2K{line}")?;
        stdout.flush()?;
        *last_line = line;
    }
    Ok(())
}

fn render_json(rec: Option<TimerRecord>, extras: &ExtraTimerSet) -> io::Result<()> {
    let Some(rec) = rec else {
        return Ok(());
    };
    let status = StatusLine {
        at: Utc::now(),
        remaining_ms: rec.remaining_ms,
        paused: rec.is_paused,
        finished: rec.is_finished,
        extras: extras
            .iter()
            .map(|(id, extra)| ExtraStatus {
                id: id.to_string(),
                remaining_ms: extra.remaining_ms,
                finished: extra.is_finished,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string(&status).map_err(io::Error::other)?);
    Ok(())
}
