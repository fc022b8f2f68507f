//! Per-originator, per-logical-packet attempt outcomes.
//!
//! A logical packet counts as delivered when at least one of its redundant
//! attempts was decoded. Slots are only opened for packets whose first reported
//! attempt lies strictly inside the classification window; once open, a slot
//! keeps accepting attempts even past the window edge.

use lpwan_abstract::{OriginatorId, SimTime};
use serde::Serialize;
use tracing::debug;

/// The sub-interval `(warmup, trial_end - cooldown)` in which new logical
/// packets are admitted to classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationWindow {
    pub warmup: SimTime,
    pub trial_end: SimTime,
    pub cooldown: SimTime,
}

impl ClassificationWindow {
    pub fn new(warmup: SimTime, trial_end: SimTime, cooldown: SimTime) -> Self {
        Self {
            warmup,
            trial_end,
            cooldown,
        }
    }

    pub fn contains(&self, t: SimTime) -> bool {
        self.warmup < t && t < self.trial_end.saturating_sub(self.cooldown)
    }
}

/// What happened to a reported outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First attempt seen for this logical packet; a slot was opened.
    Created,
    /// Appended to an existing slot.
    Appended,
    /// No slot and outside the window: dropped from classification.
    Excluded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OutcomeMatrix {
    // originator -> logical packet -> attempts; `None` marks an unclassified packet
    slots: Vec<Vec<Option<Vec<bool>>>>,
}

impl OutcomeMatrix {
    pub fn new(device_count: usize) -> Self {
        Self {
            slots: vec![Vec::new(); device_count],
        }
    }

    pub fn record_outcome(
        &mut self,
        originator: OriginatorId,
        logical_seq: u32,
        attempt: u32,
        succeeded: bool,
        now: SimTime,
        window: &ClassificationWindow,
    ) -> RecordOutcome {
        let idx = originator.index();
        let seq = logical_seq as usize;

        if let Some(Some(attempts)) = self.slots.get_mut(idx).and_then(|p| p.get_mut(seq)) {
            attempts.push(succeeded);
            return RecordOutcome::Appended;
        }

        if !window.contains(now) {
            debug!(
                "{} packet {} attempt {} at {} ms excluded from classification",
                originator, logical_seq, attempt, now
            );
            return RecordOutcome::Excluded;
        }

        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, Vec::new);
        }
        let packets = &mut self.slots[idx];
        if seq >= packets.len() {
            packets.resize_with(seq + 1, || None);
        }
        packets[seq] = Some(vec![succeeded]);
        RecordOutcome::Created
    }

    pub fn attempts(&self, originator: OriginatorId, logical_seq: u32) -> Option<&[bool]> {
        self.slots
            .get(originator.index())?
            .get(logical_seq as usize)?
            .as_deref()
    }

    /// Success if any attempt of a logical packet got through, failure otherwise.
    pub fn summarize(&self) -> OutcomeSummary {
        let mut summary = OutcomeSummary::default();
        for attempts in self.slots.iter().flatten().flatten() {
            if attempts.iter().any(|&ok| ok) {
                summary.successes += 1;
            } else {
                summary.failures += 1;
            }
        }
        summary
    }

    /// Number of classified logical packets across all originators.
    pub fn classified(&self) -> usize {
        self.slots.iter().flatten().flatten().count()
    }

    /// Forget every slot, keeping one (empty) row per device.
    pub fn reset(&mut self, device_count: usize) {
        self.slots.clear();
        self.slots.resize_with(device_count, Vec::new);
    }
}
