//! Timer record value type.
//!
//! A [`TimerRecord`] is the unit of state the countdown engine operates on:
//! remaining milliseconds plus the paused/finished/alert flags. The per-tick
//! update is a pure value transform -- it clamps at zero, never fails, and is
//! idempotent on a paused or finished record.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Remaining-time threshold below which the alert fires, once per run.
pub const ALERT_THRESHOLD_MS: u64 = 1_000;

/// State of a single countdown timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    /// Remaining time in milliseconds.
    pub remaining_ms: u64,
    /// Excluded from decrement but retained for resume.
    pub is_paused: bool,
    /// Set when `remaining_ms` reaches zero; terminal until an external
    /// reset recreates the record.
    pub is_finished: bool,
    /// Set once the remaining time has dropped below the alert threshold
    /// during this run.
    pub alert_fired: bool,
}

impl TimerRecord {
    /// A fresh running record with the given initial duration.
    pub fn new(duration_ms: u64) -> Self {
        Self {
            remaining_ms: duration_ms,
            is_paused: false,
            is_finished: false,
            alert_fired: false,
        }
    }

    /// Apply one tick of `tick_ms` elapsed milliseconds.
    ///
    /// Returns `true` when the alert must fire: exactly once, on the first
    /// tick where the new remaining time drops below
    /// [`ALERT_THRESHOLD_MS`]. A paused or finished record is left
    /// untouched.
    pub fn tick(&mut self, tick_ms: u64) -> bool {
        if self.is_paused || self.is_finished {
            return false;
        }

        let new_remaining = self.remaining_ms.saturating_sub(tick_ms);
        let fire = new_remaining < ALERT_THRESHOLD_MS && !self.alert_fired;
        if fire {
            self.alert_fired = true;
        }
        if new_remaining == 0 {
            self.is_finished = true;
        }
        self.remaining_ms = new_remaining;
        fire
    }

    /// Remaining whole seconds for display, rounded up so a timer reads
    /// `0:01` until it actually finishes.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_ms.div_ceil(1000)
    }

    /// Check internal consistency before a store publishes this record.
    ///
    /// The tick clamp makes an inconsistent record unreachable from the
    /// engine; this guard catches programming errors in other writers.
    pub fn validate(&self) -> Result<()> {
        if self.is_finished != (self.remaining_ms == 0) {
            return Err(CoreError::InvalidState(format!(
                "finished flag ({}) does not match remaining time ({} ms)",
                self.is_finished, self.remaining_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tick_decrements_remaining() {
        let mut rec = TimerRecord::new(10_000);
        for _ in 0..5 {
            rec.tick(1_000);
        }
        assert_eq!(rec.remaining_ms, 5_000);
        assert!(!rec.is_finished);
        assert!(!rec.alert_fired);
    }

    #[test]
    fn alert_fires_once_below_threshold() {
        let mut rec = TimerRecord::new(900);
        assert!(rec.tick(100));
        assert_eq!(rec.remaining_ms, 800);
        assert!(rec.alert_fired);
        // Second crossing attempt: already fired.
        assert!(!rec.tick(100));
    }

    #[test]
    fn finished_record_is_untouched() {
        let mut rec = TimerRecord::new(500);
        rec.tick(500);
        assert!(rec.is_finished);
        assert_eq!(rec.remaining_ms, 0);

        let before = rec;
        assert!(!rec.tick(1_000));
        assert_eq!(rec, before);
    }

    #[test]
    fn paused_record_is_untouched() {
        let mut rec = TimerRecord::new(5_000);
        rec.is_paused = true;
        let before = rec;
        for _ in 0..10 {
            assert!(!rec.tick(1_000));
        }
        assert_eq!(rec, before);
    }

    #[test]
    fn finishing_tick_also_fires_alert() {
        // A single oversized tick crosses both the threshold and zero.
        let mut rec = TimerRecord::new(5_000);
        assert!(rec.tick(10_000));
        assert!(rec.is_finished);
        assert!(rec.alert_fired);
        assert_eq!(rec.remaining_ms, 0);
    }

    #[test]
    fn zero_tick_on_sub_threshold_record_fires() {
        // Starting below the threshold means the first tick fires, even a
        // partial one.
        let mut rec = TimerRecord::new(400);
        assert!(rec.tick(0));
        assert_eq!(rec.remaining_ms, 400);
        assert!(!rec.is_finished);
    }

    #[test]
    fn validate_rejects_finished_with_time_left() {
        let rec = TimerRecord {
            remaining_ms: 5,
            is_paused: false,
            is_finished: true,
            alert_fired: true,
        };
        assert!(rec.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_without_finished() {
        let rec = TimerRecord {
            remaining_ms: 0,
            is_paused: false,
            is_finished: false,
            alert_fired: true,
        };
        assert!(rec.validate().is_err());
    }

    #[test]
    fn remaining_secs_rounds_up() {
        assert_eq!(TimerRecord::new(14_200).remaining_secs(), 15);
        assert_eq!(TimerRecord::new(1).remaining_secs(), 1);
        assert_eq!(TimerRecord::new(0).remaining_secs(), 0);
    }

    proptest! {
        #[test]
        fn tick_is_saturating_subtraction(r in 0u64..=86_400_000, d in 0u64..=86_400_000) {
            let mut rec = TimerRecord::new(r);
            rec.tick(d);
            prop_assert_eq!(rec.remaining_ms, r.saturating_sub(d));
            prop_assert_eq!(rec.is_finished, r.saturating_sub(d) == 0);
        }

        #[test]
        fn paused_or_finished_never_changes(r in 0u64..=86_400_000, d in 0u64..=86_400_000, paused: bool) {
            let mut rec = TimerRecord::new(r);
            if paused {
                rec.is_paused = true;
            } else {
                // Drive to finished first.
                rec.tick(u64::MAX);
            }
            let before = rec;
            rec.tick(d);
            prop_assert_eq!(rec, before);
        }

        #[test]
        fn alert_fires_at_most_once(r in 0u64..=120_000, d in 1u64..=1_000, n in 1usize..=300) {
            let mut rec = TimerRecord::new(r);
            let mut fired = 0;
            for _ in 0..n {
                if rec.tick(d) {
                    fired += 1;
                }
            }
            prop_assert!(fired <= 1);
            if rec.remaining_ms < ALERT_THRESHOLD_MS {
                prop_assert_eq!(fired, 1);
                prop_assert!(rec.alert_fired);
            }
        }

        #[test]
        fn ticked_records_always_validate(r in 0u64..=120_000, d in 0u64..=5_000, n in 0usize..=100) {
            let mut rec = TimerRecord::new(r);
            for _ in 0..n {
                rec.tick(d);
                prop_assert!(rec.validate().is_ok());
            }
        }
    }
}
