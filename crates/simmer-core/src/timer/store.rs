//! Snapshot stores for timer state.
//!
//! Each store owns one atomically-published snapshot behind a
//! `tokio::sync::watch` channel: the engine replaces the whole snapshot once
//! per tick-batch, and any number of observers (UI, projections) either read
//! the current value or subscribe for pushes. Readers concurrent with a
//! write see the old or the new snapshot, never a partial record.
//!
//! Two write paths exist. [`PrimaryTimerStore::replace`] is the validated
//! wholesale swap used when (re)seeding. The engine publishes batch results
//! through `commit_batch`, and the manager flips flags through `try_modify`;
//! both run under the channel's write lock so a pause or reset landing while
//! a batch is computing is not lost to a stale write-back.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::Result;
use crate::timer::record::TimerRecord;

/// Stable opaque identifier for an extra timer, generated client-side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimerId(Uuid);

impl TimerId {
    /// Generate a fresh unique id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The full set of extra-timer records, keyed by id.
///
/// `BTreeMap` keeps iteration order stable, so ticks and alerts are applied
/// to extras in a deterministic order.
pub type ExtraTimerSet = BTreeMap<TimerId, TimerRecord>;

/// Store for the single primary timer. `None` means no timer is configured.
#[derive(Debug)]
pub struct PrimaryTimerStore {
    tx: watch::Sender<Option<TimerRecord>>,
}

impl Default for PrimaryTimerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimaryTimerStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Latest published snapshot. Safe to call concurrently with the writer.
    pub fn current(&self) -> Option<TimerRecord> {
        *self.tx.borrow()
    }

    /// Validate and atomically publish a new snapshot.
    ///
    /// The whole write is rejected with `InvalidState` if the record is
    /// internally inconsistent; on success every observer sees the new value
    /// before this call returns.
    pub fn replace(&self, next: Option<TimerRecord>) -> Result<()> {
        if let Some(rec) = &next {
            rec.validate()?;
        }
        self.tx.send_replace(next);
        Ok(())
    }

    /// Atomically transform the live snapshot.
    ///
    /// The closure runs under the channel's write lock, so the transform
    /// cannot interleave with a concurrent batch commit. It must leave the
    /// record consistent (flag flips are; decrements go through the engine).
    /// On `Err` the closure must not have mutated; observers are only
    /// notified on success.
    pub fn try_modify(
        &self,
        f: impl FnOnce(&mut Option<TimerRecord>) -> Result<()>,
    ) -> Result<()> {
        let mut result = Ok(());
        self.tx.send_if_modified(|cur| match f(cur) {
            Ok(()) => true,
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }

    /// Publish the primary record computed by a tick-batch.
    ///
    /// Mutations that landed while the batch was computing win: a concurrent
    /// pause/resume keeps its flag, and a timer reset to absent is not
    /// resurrected by the stale write-back.
    pub fn commit_batch(&self, mut computed: TimerRecord) -> Result<()> {
        computed.validate()?;
        self.tx.send_modify(|cur| {
            if let Some(live) = cur {
                computed.is_paused = live.is_paused;
                *cur = Some(computed);
            }
        });
        Ok(())
    }

    /// Push-style subscription yielding the latest record on every change.
    pub fn subscribe(&self) -> watch::Receiver<Option<TimerRecord>> {
        self.tx.subscribe()
    }
}

/// Store for the extra-timer set.
#[derive(Debug)]
pub struct ExtraTimerStore {
    tx: watch::Sender<ExtraTimerSet>,
}

impl Default for ExtraTimerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtraTimerStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ExtraTimerSet::new());
        Self { tx }
    }

    /// Latest published snapshot of all extra timers.
    pub fn current(&self) -> ExtraTimerSet {
        self.tx.borrow().clone()
    }

    /// Validate every record and atomically publish the whole set.
    ///
    /// A single inconsistent record rejects the entire write.
    pub fn replace(&self, next: ExtraTimerSet) -> Result<()> {
        for rec in next.values() {
            rec.validate()?;
        }
        self.tx.send_replace(next);
        Ok(())
    }

    /// Atomically transform the live set. Same contract as
    /// [`PrimaryTimerStore::try_modify`].
    pub fn try_modify(
        &self,
        f: impl FnOnce(&mut ExtraTimerSet) -> Result<()>,
    ) -> Result<()> {
        let mut result = Ok(());
        self.tx.send_if_modified(|cur| match f(cur) {
            Ok(()) => true,
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }

    /// Publish the set computed by a tick-batch.
    ///
    /// Only ids still present take their computed record; an id removed
    /// while the batch was computing stays removed, and one added mid-batch
    /// keeps its fresh record for the next batch to pick up.
    pub fn commit_batch(&self, computed: ExtraTimerSet) -> Result<()> {
        for rec in computed.values() {
            rec.validate()?;
        }
        self.tx.send_modify(|cur| {
            for (id, live) in cur.iter_mut() {
                if let Some(mut rec) = computed.get(id).copied() {
                    rec.is_paused = live.is_paused;
                    *live = rec;
                }
            }
        });
        Ok(())
    }

    /// Push-style subscription yielding the latest set on every change.
    pub fn subscribe(&self) -> watch::Receiver<ExtraTimerSet> {
        self.tx.subscribe()
    }
}
