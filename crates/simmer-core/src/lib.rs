//! # Simmer Core Library
//!
//! Core business logic for Simmer, a kitchen-style countdown timer. It
//! implements a CLI-first philosophy: everything here is plain library code
//! driven by the `simmer` binary, and any richer frontend is a thin layer
//! over the same types.
//!
//! ## Architecture
//!
//! - **Countdown Engine**: a real-time loop that converts elapsed wall-clock
//!   time into fixed-size ticks and applies them to the primary timer and
//!   every extra timer
//! - **Timer Stores**: atomically-published snapshots (one primary record,
//!   one id-keyed set of extras) observable through watch subscriptions
//! - **Timer Manager**: start/pause/resume/reset operations over the stores
//! - **Clock**: injectable monotonic time + sleep so the loop is
//!   deterministic under test
//!
//! ## Key Components
//!
//! - [`CountdownEngine`]: the tick loop
//! - [`TimerManager`]: external-facing operations
//! - [`Config`]: TOML configuration management

pub mod clock;
pub mod config;
pub mod error;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, InputUnit};
pub use error::{ConfigError, CoreError, ValidationError};
pub use timer::{
    AlertSink, CountdownEngine, EngineConfig, EngineHandle, ExtraTimerSet, ExtraTimerStore,
    PrimaryTimerStore, SilentAlert, SinkError, TimerId, TimerManager, TimerRecord,
    TimerSetup, VibrationSink, ALERT_THRESHOLD_MS,
};
