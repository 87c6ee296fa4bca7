//! External-facing timer operations.
//!
//! [`TimerManager`] is the thin layer UI code talks to: it seeds the stores
//! from validated user input, gates pause/resume, and clears state on reset.
//! The countdown itself belongs to the engine; everything here is a
//! store-snapshot transform.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::InputUnit;
use crate::error::{CoreError, Result, ValidationError};
use crate::timer::record::TimerRecord;
use crate::timer::store::{ExtraTimerSet, ExtraTimerStore, PrimaryTimerStore, TimerId};

/// The durations the user typed in, in their own unit.
///
/// This is deliberately separate from the countdown records in the stores:
/// the stores hold engine-decremented state, this holds raw input. While no
/// primary timer exists the engine is not running, and displayed remaining
/// times come straight from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSetup {
    pub unit: InputUnit,
    /// Primary timer duration, in `unit`s.
    pub primary: u64,
    /// Extra timer durations keyed by their client-generated ids.
    pub extras: BTreeMap<TimerId, u64>,
}

impl TimerSetup {
    pub fn new(unit: InputUnit, primary: u64) -> Self {
        Self {
            unit,
            primary,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, id: TimerId, duration: u64) -> Self {
        self.extras.insert(id, duration);
        self
    }

    /// Primary duration in milliseconds.
    pub fn primary_ms(&self) -> u64 {
        self.unit.to_ms(self.primary)
    }

    /// An extra timer's configured duration in milliseconds.
    pub fn extra_ms(&self, id: &TimerId) -> Option<u64> {
        self.extras.get(id).map(|d| self.unit.to_ms(*d))
    }

    /// Every duration must be a positive integer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.primary == 0 {
            return Err(ValidationError::InvalidValue {
                field: "primary".into(),
                message: "duration must be greater than zero".into(),
            });
        }
        for (id, duration) in &self.extras {
            if *duration == 0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("extra {id}"),
                    message: "duration must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }
}

/// Pause/resume/start/reset operations over the two stores.
#[derive(Clone)]
pub struct TimerManager {
    primary: Arc<PrimaryTimerStore>,
    extras: Arc<ExtraTimerStore>,
}

impl TimerManager {
    pub fn new(primary: Arc<PrimaryTimerStore>, extras: Arc<ExtraTimerStore>) -> Self {
        Self { primary, extras }
    }

    /// Seed the stores from user input and transition everything to running.
    ///
    /// The extra-timer set is rebuilt from the setup, so records whose id is
    /// no longer configured are pruned here.
    pub fn start(&self, setup: &TimerSetup) -> Result<()> {
        setup.validate()?;

        let mut extras = ExtraTimerSet::new();
        for (id, duration) in &setup.extras {
            extras.insert(*id, TimerRecord::new(setup.unit.to_ms(*duration)));
        }

        self.primary
            .replace(Some(TimerRecord::new(setup.primary_ms())))?;
        self.extras.replace(extras)?;
        Ok(())
    }

    /// Pause the countdown. Extra timers share the primary's gate, so
    /// pausing the primary record pauses everything.
    pub fn pause_all(&self) -> Result<()> {
        self.primary.try_modify(|cur| match cur {
            None => Err(CoreError::InvalidState("no timer is running".into())),
            Some(rec) if rec.is_finished => Err(CoreError::InvalidState(
                "timer has already finished".into(),
            )),
            Some(rec) if rec.is_paused => {
                Err(CoreError::InvalidState("timer is already paused".into()))
            }
            Some(rec) => {
                rec.is_paused = true;
                Ok(())
            }
        })
    }

    /// Resume a paused countdown.
    pub fn resume_all(&self) -> Result<()> {
        self.primary.try_modify(|cur| match cur {
            None => Err(CoreError::InvalidState("no timer is running".into())),
            Some(rec) if !rec.is_paused => {
                Err(CoreError::InvalidState("timer is not paused".into()))
            }
            Some(rec) => {
                rec.is_paused = false;
                Ok(())
            }
        })
    }

    /// Clear the primary timer to absent. Stale extra records are pruned on
    /// the next start rather than here.
    pub fn reset(&self) -> Result<()> {
        self.primary.replace(None)
    }

    /// Add one extra timer while the countdown is configured.
    pub fn add_extra(&self, id: TimerId, unit: InputUnit, duration: u64) -> Result<()> {
        if duration == 0 {
            return Err(ValidationError::InvalidValue {
                field: format!("extra {id}"),
                message: "duration must be greater than zero".into(),
            }
            .into());
        }
        self.extras.try_modify(|cur| {
            cur.insert(id, TimerRecord::new(unit.to_ms(duration)));
            Ok(())
        })
    }

    /// Remove one extra timer's countdown record.
    pub fn remove_extra(&self, id: &TimerId) -> Result<()> {
        self.extras.try_modify(|cur| {
            if cur.remove(id).is_none() {
                return Err(CoreError::InvalidState(format!(
                    "no extra timer with id {id}"
                )));
            }
            Ok(())
        })
    }

    /// Remaining milliseconds of an extra timer for display.
    ///
    /// While a primary timer exists the engine owns the number; without one
    /// the engine is not counting, so the display derives from the raw user
    /// input instead of a stale record.
    pub fn extra_display_ms(&self, setup: &TimerSetup, id: &TimerId) -> Option<u64> {
        if self.primary.current().is_some() {
            self.extras.current().get(id).map(|rec| rec.remaining_ms)
        } else {
            setup.extra_ms(id)
        }
    }
}
