//! Alert and vibration sink traits.
//!
//! The engine calls these from inside a tick, so implementations must not
//! block for more than a negligible duration. Playing must be
//! stop-and-restart idempotent: a sink already sounding an alert restarts it
//! rather than layering a second one.

/// Boxed error for sink failures; the engine logs these and keeps ticking.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Produces the audible alert when a timer crosses the alert threshold.
pub trait AlertSink: Send + Sync {
    fn play_alert(&self) -> Result<(), SinkError>;
}

/// Optional haptic companion to [`AlertSink`]. Fire-and-forget; may run
/// asynchronously relative to the engine.
pub trait VibrationSink: Send + Sync {
    fn vibrate(&self);
}

/// No-op sink, used when alerts are disabled in the configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAlert;

impl AlertSink for SilentAlert {
    fn play_alert(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl VibrationSink for SilentAlert {
    fn vibrate(&self) {}
}
