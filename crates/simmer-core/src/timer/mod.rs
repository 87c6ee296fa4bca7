mod alert;
mod engine;
mod manager;
mod record;
mod store;

pub use alert::{AlertSink, SilentAlert, SinkError, VibrationSink};
pub use engine::{CountdownEngine, EngineConfig, EngineHandle};
pub use manager::{TimerManager, TimerSetup};
pub use record::{TimerRecord, ALERT_THRESHOLD_MS};
pub use store::{ExtraTimerSet, ExtraTimerStore, PrimaryTimerStore, TimerId};
