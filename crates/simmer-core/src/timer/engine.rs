//! Countdown engine implementation.
//!
//! The engine owns the real-time loop: each cycle it reads the clock,
//! decomposes the elapsed time into whole fixed-size ticks plus one partial
//! tick, applies them to the primary timer and every extra timer, publishes
//! the updated snapshots, and sleeps for what is left of the cycle budget.
//!
//! ## State transitions (per timer)
//!
//! ```text
//! Running -> Paused -> Running   (external pause/resume)
//! Running -> Finished            (remaining time reaches zero)
//! ```
//!
//! `Paused` and `Finished` records are read but never decremented. Extra
//! timers only run while a primary timer exists, and they share its
//! running/paused gate.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = CountdownEngine::new(clock, primary, extras, alert, config);
//! let handle = engine.spawn();
//! // ... later:
//! handle.stop();
//! handle.join().await?;
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::timer::alert::{AlertSink, VibrationSink};
use crate::timer::record::TimerRecord;
use crate::timer::store::{ExtraTimerSet, ExtraTimerStore, PrimaryTimerStore};

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Fixed tick size in milliseconds.
    pub tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { tick_ms: 100 }
    }
}

impl From<&crate::config::Config> for EngineConfig {
    fn from(cfg: &crate::config::Config) -> Self {
        Self {
            tick_ms: cfg.timer.tick_ms.max(1),
        }
    }
}

/// The countdown loop.
///
/// All per-tick computation is synchronous; the loop suspends only at the
/// inter-cycle sleep, and it never holds a lock across that sleep (the
/// stores publish by atomic swap).
pub struct CountdownEngine {
    clock: Arc<dyn Clock>,
    primary: Arc<PrimaryTimerStore>,
    extras: Arc<ExtraTimerStore>,
    alert: Arc<dyn AlertSink>,
    vibration: Option<Arc<dyn VibrationSink>>,
    tick_ms: u64,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    /// Elapsed milliseconds not yet converted into ticks.
    accumulated_ms: u64,
    /// Clock reading at the end of the previous tick-batch.
    last_tick_ms: u64,
}

impl CountdownEngine {
    pub fn new(
        clock: Arc<dyn Clock>,
        primary: Arc<PrimaryTimerStore>,
        extras: Arc<ExtraTimerStore>,
        alert: Arc<dyn AlertSink>,
        config: EngineConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            clock,
            primary,
            extras,
            alert,
            vibration: None,
            tick_ms: config.tick_ms.max(1),
            shutdown_tx,
            shutdown_rx,
            accumulated_ms: 0,
            last_tick_ms: 0,
        }
    }

    /// Attach a haptic sink fired alongside the audible alert.
    pub fn with_vibration(mut self, sink: Arc<dyn VibrationSink>) -> Self {
        self.vibration = Some(sink);
        self
    }

    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(self) -> EngineHandle {
        let stop_tx = self.shutdown_tx.clone();
        let join = tokio::spawn(self.run());
        EngineHandle { stop_tx, join }
    }

    /// Run the loop until shutdown is requested or a store write fails.
    ///
    /// A rejected store write is a broken invariant (the tick clamp should
    /// make it unreachable); it is logged and stops the loop.
    pub async fn run(mut self) -> Result<()> {
        debug!(tick_ms = self.tick_ms, "countdown loop started");
        self.last_tick_ms = self.clock.now_ms();
        let mut shutdown = self.shutdown_rx.clone();

        let result = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let sleep_for = match self.cycle() {
                Ok(sleep_for) => sleep_for,
                Err(e) => {
                    error!(error = %e, "tick-batch write rejected; stopping countdown loop");
                    break Err(e);
                }
            };

            if sleep_for > 0 {
                tokio::select! {
                    _ = self.clock.sleep(sleep_for) => {}
                    _ = shutdown.changed() => {}
                }
            } else {
                // The cycle overran its budget: no sleep, but still yield so
                // the loop stays cancellable and cooperative.
                tokio::task::yield_now().await;
            }
        };

        debug!("countdown loop stopped");
        result
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// One execution cycle. Returns how long to sleep before the next one.
    fn cycle(&mut self) -> Result<u64> {
        let cycle_start = self.clock.now_ms();
        let elapsed = cycle_start.saturating_sub(self.last_tick_ms);
        self.accumulated_ms = self.accumulated_ms.saturating_add(elapsed);

        self.apply_batch()?;

        // Re-read the clock so tick processing cost is excluded from the
        // next elapsed measurement, then sleep only for what is left of the
        // cycle budget (never a negative sleep).
        let batch_end = self.clock.now_ms();
        self.last_tick_ms = batch_end;
        let cost = batch_end.saturating_sub(cycle_start);
        Ok(self.tick_ms.saturating_sub(cost))
    }

    /// Convert the accumulated elapsed time into ticks and apply them.
    ///
    /// Reads each store once, applies every tick to the working copies, and
    /// commits each store once, bounding observable updates to one per
    /// batch. The commit merges against the live snapshot, so a pause or
    /// reset that landed while the batch was computing is not lost.
    fn apply_batch(&mut self) -> Result<()> {
        let Some(mut primary) = self.primary.current() else {
            // No primary timer means nothing counts down. Drop the backlog
            // so a later start does not replay idle time as ticks.
            self.accumulated_ms = 0;
            return Ok(());
        };
        if self.accumulated_ms == 0 {
            return Ok(());
        }

        let mut extras = self.extras.current();
        let gate_paused = primary.is_paused;

        while self.accumulated_ms >= self.tick_ms {
            self.apply_tick(&mut primary, &mut extras, self.tick_ms, gate_paused);
            self.accumulated_ms -= self.tick_ms;
        }
        if self.accumulated_ms > 0 {
            let partial = self.accumulated_ms;
            self.apply_tick(&mut primary, &mut extras, partial, gate_paused);
            self.accumulated_ms = 0;
        }

        self.primary.commit_batch(primary)?;
        self.extras.commit_batch(extras)?;
        Ok(())
    }

    /// Apply one tick to the primary and every extra, in stable id order.
    fn apply_tick(
        &self,
        primary: &mut TimerRecord,
        extras: &mut ExtraTimerSet,
        tick_ms: u64,
        gate_paused: bool,
    ) {
        if primary.tick(tick_ms) {
            self.fire_alert();
        }
        if gate_paused {
            return;
        }
        for rec in extras.values_mut() {
            if rec.tick(tick_ms) {
                self.fire_alert();
            }
        }
    }

    /// Ring the sinks. A failing alert sink is logged and isolated so the
    /// tick still completes for the remaining timers.
    fn fire_alert(&self) {
        if let Err(e) = self.alert.play_alert() {
            warn!(error = %e, "alert sink failed");
        }
        if let Some(vib) = &self.vibration {
            vib.vibrate();
        }
    }
}

/// Handle to a spawned engine task.
pub struct EngineHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<Result<()>>,
}

impl EngineHandle {
    /// Request a graceful stop. The loop exits before or at its next sleep
    /// boundary.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Hard-cancel the engine task.
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Wait for the loop to finish. A cancelled task surfaces as
    /// [`CoreError::Cancelled`], which callers treat as a clean exit.
    pub async fn join(self) -> Result<()> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(CoreError::Cancelled),
            Err(e) => Err(CoreError::Custom(format!("countdown task failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::timer::alert::SinkError;
    use crate::timer::store::TimerId;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAlert {
        plays: AtomicUsize,
    }

    impl AlertSink for CountingAlert {
        fn play_alert(&self) -> Result<(), SinkError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingAlert;

    impl AlertSink for FailingAlert {
        fn play_alert(&self) -> Result<(), SinkError> {
            Err("speaker unplugged".into())
        }
    }

    struct Rig {
        clock: ManualClock,
        primary: Arc<PrimaryTimerStore>,
        extras: Arc<ExtraTimerStore>,
        alert: Arc<CountingAlert>,
        engine: CountdownEngine,
    }

    fn rig() -> Rig {
        let clock = ManualClock::new();
        let primary = Arc::new(PrimaryTimerStore::new());
        let extras = Arc::new(ExtraTimerStore::new());
        let alert = Arc::new(CountingAlert::default());
        let engine = CountdownEngine::new(
            Arc::new(clock.clone()),
            Arc::clone(&primary),
            Arc::clone(&extras),
            Arc::clone(&alert) as Arc<dyn AlertSink>,
            EngineConfig::default(),
        );
        Rig {
            clock,
            primary,
            extras,
            alert,
            engine,
        }
    }

    fn alerts(rig: &Rig) -> usize {
        rig.alert.plays.load(Ordering::SeqCst)
    }

    #[test]
    fn elapsed_time_decomposes_into_ticks() {
        let mut r = rig();
        r.primary.replace(Some(TimerRecord::new(10_000))).unwrap();

        // 1000 ms elapsed = ten whole 100 ms ticks, five times over.
        for _ in 0..5 {
            r.clock.advance_ms(1_000);
            r.engine.cycle().unwrap();
        }

        let rec = r.primary.current().unwrap();
        assert_eq!(rec.remaining_ms, 5_000);
        assert!(!rec.is_finished);
        assert_eq!(alerts(&r), 0);
    }

    #[test]
    fn partial_tick_consumes_remainder() {
        let mut r = rig();
        r.primary.replace(Some(TimerRecord::new(10_000))).unwrap();

        r.clock.advance_ms(250);
        r.engine.cycle().unwrap();

        assert_eq!(r.primary.current().unwrap().remaining_ms, 9_750);
        assert_eq!(r.engine.accumulated_ms, 0);
    }

    #[test]
    fn alert_fires_once_and_only_once() {
        let mut r = rig();
        r.primary.replace(Some(TimerRecord::new(900))).unwrap();

        r.clock.advance_ms(100);
        r.engine.cycle().unwrap();
        let rec = r.primary.current().unwrap();
        assert_eq!(rec.remaining_ms, 800);
        assert!(rec.alert_fired);
        assert_eq!(alerts(&r), 1);

        // Further ticks never re-fire.
        r.clock.advance_ms(300);
        r.engine.cycle().unwrap();
        assert_eq!(alerts(&r), 1);
    }

    #[test]
    fn finished_primary_is_left_alone() {
        let mut r = rig();
        let mut done = TimerRecord::new(1_000);
        done.tick(1_000);
        assert!(done.is_finished);
        r.primary.replace(Some(done)).unwrap();

        r.clock.advance_ms(1_000);
        r.engine.cycle().unwrap();

        assert_eq!(r.primary.current().unwrap(), done);
        assert_eq!(alerts(&r), 0);
    }

    #[test]
    fn extras_tick_alongside_primary() {
        let mut r = rig();
        r.primary.replace(Some(TimerRecord::new(60_000))).unwrap();
        let id = TimerId::new();
        let mut set = ExtraTimerSet::new();
        set.insert(id, TimerRecord::new(5_000));
        r.extras.replace(set).unwrap();

        r.clock.advance_ms(2_000);
        r.engine.cycle().unwrap();

        assert_eq!(r.primary.current().unwrap().remaining_ms, 58_000);
        assert_eq!(r.extras.current().get(&id).unwrap().remaining_ms, 3_000);
    }

    #[test]
    fn each_timer_alerts_independently() {
        let mut r = rig();
        r.primary.replace(Some(TimerRecord::new(950))).unwrap();
        let mut set = ExtraTimerSet::new();
        set.insert(TimerId::new(), TimerRecord::new(500));
        set.insert(TimerId::new(), TimerRecord::new(30_000));
        r.extras.replace(set).unwrap();

        r.clock.advance_ms(100);
        r.engine.cycle().unwrap();

        // Primary crossed the threshold and the 500 ms extra started below
        // it; the 30 s extra stays quiet.
        assert_eq!(alerts(&r), 2);
    }

    #[test]
    fn paused_primary_gates_extras() {
        let mut r = rig();
        let mut paused = TimerRecord::new(10_000);
        paused.is_paused = true;
        r.primary.replace(Some(paused)).unwrap();
        let id = TimerId::new();
        let mut set = ExtraTimerSet::new();
        set.insert(id, TimerRecord::new(5_000));
        r.extras.replace(set).unwrap();

        r.clock.advance_ms(3_000);
        r.engine.cycle().unwrap();

        assert_eq!(r.primary.current().unwrap().remaining_ms, 10_000);
        assert_eq!(r.extras.current().get(&id).unwrap().remaining_ms, 5_000);
    }

    #[test]
    fn absent_primary_discards_backlog() {
        let mut r = rig();
        let id = TimerId::new();
        let mut set = ExtraTimerSet::new();
        set.insert(id, TimerRecord::new(5_000));
        r.extras.replace(set).unwrap();

        // Hours pass with no primary timer.
        r.clock.advance_ms(3_600_000);
        r.engine.cycle().unwrap();
        assert_eq!(r.engine.accumulated_ms, 0);
        assert_eq!(r.extras.current().get(&id).unwrap().remaining_ms, 5_000);

        // Starting now must not replay the idle hour.
        r.primary.replace(Some(TimerRecord::new(10_000))).unwrap();
        r.clock.advance_ms(100);
        r.engine.cycle().unwrap();
        assert_eq!(r.primary.current().unwrap().remaining_ms, 9_900);
    }

    #[test]
    fn sleep_budget_shrinks_with_cycle_cost() {
        let mut r = rig();
        r.primary.replace(Some(TimerRecord::new(10_000))).unwrap();

        r.clock.advance_ms(100);
        let sleep_for = r.engine.cycle().unwrap();
        // Manual clock does not move during the batch, so the full budget
        // remains.
        assert_eq!(sleep_for, 100);
    }

    #[test]
    fn failing_sink_does_not_stop_the_batch() {
        let clock = ManualClock::new();
        let primary = Arc::new(PrimaryTimerStore::new());
        let extras = Arc::new(ExtraTimerStore::new());
        let mut engine = CountdownEngine::new(
            Arc::new(clock.clone()),
            Arc::clone(&primary),
            Arc::clone(&extras),
            Arc::new(FailingAlert),
            EngineConfig::default(),
        );

        primary.replace(Some(TimerRecord::new(900))).unwrap();
        let id = TimerId::new();
        let mut set = ExtraTimerSet::new();
        set.insert(id, TimerRecord::new(5_000));
        extras.replace(set).unwrap();

        clock.advance_ms(100);
        engine.cycle().unwrap();

        // The sink failed for the primary's alert, but the extra still
        // ticked.
        assert_eq!(extras.current().get(&id).unwrap().remaining_ms, 4_900);
        assert_eq!(primary.current().unwrap().remaining_ms, 800);
    }

    struct Buzzer {
        buzzed: AtomicBool,
    }

    impl VibrationSink for Buzzer {
        fn vibrate(&self) {
            self.buzzed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn vibration_fires_with_alert() {
        let clock = ManualClock::new();
        let primary = Arc::new(PrimaryTimerStore::new());
        let extras = Arc::new(ExtraTimerStore::new());
        let buzzer = Arc::new(Buzzer {
            buzzed: AtomicBool::new(false),
        });
        let mut engine = CountdownEngine::new(
            Arc::new(clock.clone()),
            Arc::clone(&primary),
            Arc::clone(&extras),
            Arc::new(CountingAlert::default()),
            EngineConfig::default(),
        )
        .with_vibration(Arc::clone(&buzzer) as Arc<dyn VibrationSink>);

        primary.replace(Some(TimerRecord::new(500))).unwrap();
        clock.advance_ms(100);
        engine.cycle().unwrap();

        assert!(buzzer.buzzed.load(Ordering::SeqCst));
    }
}
