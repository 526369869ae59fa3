//! One keyed FIFO inside a keeper.

use std::collections::VecDeque;

use crate::transfer::Payload;

/// The unbounded capacity marker.
pub(crate) const UNBOUNDED: isize = -1;

/// A bounded FIFO of opaque payloads.
///
/// `first` is the 1-based index of the oldest queued value, kept for
/// diagnostics and rebased to 1 whenever the slot drains so indices never
/// grow without bound. The capacity `limit` is `-1` for unbounded; a
/// non-negative limit caps the queue length. Every method assumes the owning
/// keeper's mutex is held.
#[derive(Debug)]
pub(crate) struct Slot {
    first: usize,
    limit: isize,
    storage: VecDeque<Payload>,
}

impl Slot {
    /// An empty, unbounded slot.
    pub fn new() -> Slot {
        Slot {
            first: 1,
            limit: UNBOUNDED,
            storage: VecDeque::new(),
        }
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn count(&self) -> usize {
        self.storage.len()
    }

    pub fn limit(&self) -> isize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: isize) {
        debug_assert!(limit >= UNBOUNDED);
        self.limit = limit;
    }

    /// Whether `n` more values fit under the current limit.
    pub fn has_room_for(&self, n: usize) -> bool {
        self.limit < 0 || self.count() + n <= self.limit as usize
    }

    /// Whether a writer would currently be blocked by this slot.
    ///
    /// Matches the wake-writers precondition of `set`: a zero limit never
    /// admits a writer, so there is no fullness to relieve.
    pub fn is_full(&self) -> bool {
        self.limit > 0 && self.count() >= self.limit as usize
    }

    /// Appends payloads in order.
    ///
    /// `send` checks room first; `set` is allowed to overfill a limited
    /// slot, so no limit is enforced here.
    pub fn push<I: IntoIterator<Item = Payload>>(&mut self, payloads: I) {
        self.storage.extend(payloads);
    }

    /// Removes and returns the oldest `n` payloads in FIFO order.
    ///
    /// Requires `1 <= n <= count`. Rebases `first` to 1 when the slot
    /// drains; otherwise advances it by `n`.
    pub fn pop(&mut self, n: usize) -> Vec<Payload> {
        debug_assert!(n >= 1 && n <= self.count());
        let popped: Vec<Payload> = self.storage.drain(..n).collect();
        self.first = if self.storage.is_empty() {
            1
        } else {
            self.first + n
        };
        popped
    }

    /// Clones of the oldest `n` payloads, in FIFO order. No mutation.
    pub fn peek(&self, n: usize) -> Vec<Payload> {
        debug_assert!(n >= 1 && n <= self.count());
        self.storage.iter().take(n).cloned().collect()
    }

    /// Clones of the whole queue, oldest first. Used by dump.
    pub fn peek_all(&self) -> Vec<Payload> {
        self.storage.iter().cloned().collect()
    }

    /// Empties the slot, preserving its limit. Returns the former contents
    /// so the caller can retire them.
    pub fn reset(&mut self) -> Vec<Payload> {
        self.first = 1;
        self.storage.drain(..).collect()
    }

    /// Consumes the slot, yielding whatever was still queued.
    pub fn into_payloads(self) -> VecDeque<Payload> {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::PayloadRepr;

    fn ints(range: std::ops::Range<i64>) -> Vec<Payload> {
        range.map(|i| Payload::new(PayloadRepr::Int(i))).collect()
    }

    fn as_ints(payloads: &[Payload]) -> Vec<i64> {
        payloads
            .iter()
            .map(|p| match p.repr() {
                PayloadRepr::Int(i) => *i,
                other => panic!("unexpected payload {:?}", other),
            })
            .collect()
    }

    #[test]
    fn fifo_order() {
        let mut slot = Slot::new();
        slot.push(ints(0..5));
        assert_eq!(as_ints(&slot.pop(2)), vec![0, 1]);
        assert_eq!(as_ints(&slot.peek(2)), vec![2, 3]);
        assert_eq!(as_ints(&slot.pop(3)), vec![2, 3, 4]);
        assert_eq!(slot.count(), 0);
    }

    #[test]
    fn first_advances_then_rebases() {
        let mut slot = Slot::new();
        slot.push(ints(0..4));
        assert_eq!(slot.first(), 1);
        slot.pop(1);
        assert_eq!(slot.first(), 2);
        slot.pop(2);
        assert_eq!(slot.first(), 4);
        // draining the slot resets the index
        slot.pop(1);
        assert_eq!(slot.first(), 1);
    }

    #[test]
    fn reset_preserves_limit() {
        let mut slot = Slot::new();
        slot.set_limit(3);
        slot.push(ints(0..3));
        let drained = slot.reset();
        assert_eq!(drained.len(), 3);
        assert_eq!(slot.count(), 0);
        assert_eq!(slot.first(), 1);
        assert_eq!(slot.limit(), 3);
    }

    #[test]
    fn room_checks() {
        let mut slot = Slot::new();
        assert!(slot.has_room_for(1_000_000));
        slot.set_limit(2);
        assert!(slot.has_room_for(2));
        slot.push(ints(0..2));
        assert!(!slot.has_room_for(1));
        assert!(slot.is_full());
        slot.set_limit(0);
        // a zero limit rejects writers but is never "full" for wake purposes
        assert!(!slot.has_room_for(1));
        slot.reset();
        assert!(!slot.is_full());
    }
}
