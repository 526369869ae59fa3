//! Per-keeper value-store context.
//!
//! A keeper runs with eager reclamation switched off: payloads destroyed by
//! `set`, `reset` or `clear` are retired into a deferred list instead of
//! being dropped inline, and a collection drains that list in one batch.
//! The pool's GC pacing measures `usage()` (live plus retired bytes) against
//! its threshold and forces a collection when the shard grows too large.

use crate::transfer::Payload;

/// Retired payloads dropped per incremental step.
const STEP_BUDGET: usize = 32;

/// Accounting context owned by one keeper shard.
#[derive(Debug, Default)]
pub(crate) struct KeeperStore {
    /// Bytes held by payloads currently queued in slots.
    live: usize,
    /// Destroyed payloads awaiting collection.
    retired: Vec<Payload>,
    retired_bytes: usize,
}

impl KeeperStore {
    /// Accounts for payloads entering a slot.
    pub fn charge(&mut self, bytes: usize) {
        self.live += bytes;
    }

    /// Accounts for payloads leaving the keeper toward a caller.
    pub fn release(&mut self, bytes: usize) {
        debug_assert!(bytes <= self.live);
        self.live = self.live.saturating_sub(bytes);
    }

    /// Defers destruction of a payload that left a slot without a reader.
    pub fn retire(&mut self, payload: Payload) {
        self.release(payload.cost());
        self.retired_bytes += payload.cost();
        self.retired.push(payload);
    }

    /// Retires a whole batch, e.g. a reset slot's former contents.
    pub fn retire_all<I: IntoIterator<Item = Payload>>(&mut self, payloads: I) {
        for payload in payloads {
            self.retire(payload);
        }
    }

    /// Live plus retired bytes; what GC pacing compares to its threshold.
    pub fn usage(&self) -> usize {
        self.live + self.retired_bytes
    }

    /// Drains the retired list. Returns usage after the collection.
    pub fn collect(&mut self) -> usize {
        self.retired.clear();
        self.retired.shrink_to_fit();
        self.retired_bytes = 0;
        self.live
    }

    /// One incremental reclamation step: drops a bounded chunk of the
    /// retired list.
    pub fn step(&mut self) {
        let keep = self.retired.len().saturating_sub(STEP_BUDGET);
        for payload in self.retired.drain(keep..) {
            self.retired_bytes = self.retired_bytes.saturating_sub(payload.cost());
        }
    }

    /// Full teardown, used when the pool closes.
    pub fn teardown(&mut self) {
        self.live = 0;
        self.collect();
    }
}
