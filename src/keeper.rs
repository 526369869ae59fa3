//! Keeper shards: the storage engine behind every linda operation.
//!
//! A keeper owns a mutex, a value-store context, and a map from linda
//! identity to that linda's keyed slots. Primitives run with the shard mutex
//! held by the caller (the linda layer) and never touch another keeper, so
//! one lock per shard is the only lock in the system.

use std::collections::HashMap;

use foldhash::fast::FixedState;
use parking_lot::Mutex;

use crate::key::Key;
use crate::slot::Slot;
use crate::store::KeeperStore;
use crate::transfer::Payload;

/// Identity of a linda inside keeper maps: the deep object's address.
///
/// Equal across every proxy of the same underlying linda, which makes it
/// usable as a map key on the host side too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LindaId(pub(crate) usize);

impl LindaId {
    /// The raw address value.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

type KeyMap = HashMap<Key, Slot, FixedState>;

/// One storage shard.
pub(crate) struct Keeper {
    pub(crate) shard: Mutex<KeeperShard>,
}

impl Keeper {
    pub fn new() -> Keeper {
        Keeper {
            shard: Mutex::new(KeeperShard::default()),
        }
    }
}

/// Everything a keeper's mutex protects.
#[derive(Default)]
pub(crate) struct KeeperShard {
    lindas: HashMap<LindaId, KeyMap, FixedState>,
    pub(crate) store: KeeperStore,
}

/// Reply of the count primitive, shaped by the number of keys supplied.
pub(crate) enum CountReply {
    /// No keys: every existing slot's count.
    All(Vec<(Key, usize)>),
    /// One key: its count, or absent.
    One(Option<usize>),
    /// Several keys: counts restricted to those that have a slot.
    Keys(Vec<(Key, usize)>),
}

/// Internal snapshot of one slot, produced by the dump primitive.
pub(crate) struct SlotSnapshot {
    pub first: usize,
    pub count: usize,
    pub limit: isize,
    pub storage: Vec<Payload>,
}

impl KeeperShard {
    /// Removes everything stored for `id`. Never fails; bypasses GC pacing
    /// because it runs during teardown.
    pub fn clear(&mut self, id: LindaId) {
        if let Some(keys) = self.lindas.remove(&id) {
            for slot in keys.into_values() {
                self.store.retire_all(slot.into_payloads());
            }
        }
    }

    /// Appends `payloads` to the slot for `(id, key)`, creating it on first
    /// write. Returns false (leaving `payloads` untouched) when a limit
    /// would be exceeded; nothing is enqueued in that case.
    pub fn send(&mut self, id: LindaId, key: &Key, payloads: &mut Vec<Payload>) -> bool {
        let slot = self
            .lindas
            .entry(id)
            .or_default()
            .entry(key.clone())
            .or_insert_with(Slot::new);
        if !slot.has_room_for(payloads.len()) {
            return false;
        }
        let bytes: usize = payloads.iter().map(Payload::cost).sum();
        slot.push(payloads.drain(..));
        self.store.charge(bytes);
        true
    }

    /// Pops one value from the first key in `keys` whose slot has data.
    /// The argument order is the priority order.
    pub fn receive(&mut self, id: LindaId, keys: &[Key]) -> Option<(Key, Payload)> {
        let map = self.lindas.get_mut(&id)?;
        for key in keys {
            if let Some(slot) = map.get_mut(key) {
                if slot.count() > 0 {
                    let mut popped = slot.pop(1);
                    let payload = popped.pop()?;
                    self.store.release(payload.cost());
                    return Some((key.clone(), payload));
                }
            }
        }
        None
    }

    /// Pops between `min` and `max` values from one slot, or nothing when
    /// fewer than `min` are queued. Bounds are validated by the caller.
    pub fn receive_batched(
        &mut self,
        id: LindaId,
        key: &Key,
        min: usize,
        max: usize,
    ) -> Vec<Payload> {
        debug_assert!(min >= 1 && max >= min);
        let Some(slot) = self.lindas.get_mut(&id).and_then(|map| map.get_mut(key)) else {
            return Vec::new();
        };
        if slot.count() < min {
            return Vec::new();
        }
        let popped = slot.pop(max.min(slot.count()));
        let bytes: usize = popped.iter().map(Payload::cost).sum();
        self.store.release(bytes);
        popped
    }

    /// Replaces the contents of `(id, key)` with `payloads`.
    ///
    /// With no payloads this empties the slot: an unbounded slot is removed
    /// outright, a limited one is reset with its limit preserved. Returns
    /// the wake-writers indication: true when the slot was full and the new
    /// fill leaves room again.
    pub fn set(&mut self, id: LindaId, key: &Key, payloads: Vec<Payload>) -> bool {
        let map = self.lindas.entry(id).or_default();
        if payloads.is_empty() {
            let Some(slot) = map.get_mut(key) else {
                // setting a nonexistent key to nothing is a no-op
                return false;
            };
            if slot.limit() < 0 {
                if let Some(slot) = map.remove(key) {
                    self.store.retire_all(slot.into_payloads());
                }
                return false;
            }
            let wake_writers = slot.is_full();
            let drained = slot.reset();
            self.store.retire_all(drained);
            wake_writers
        } else {
            let n = payloads.len();
            let bytes: usize = payloads.iter().map(Payload::cost).sum();
            match map.get_mut(key) {
                None => {
                    // no writer can be waiting on a key that never existed
                    let mut slot = Slot::new();
                    slot.push(payloads);
                    map.insert(key.clone(), slot);
                    self.store.charge(bytes);
                    false
                }
                Some(slot) => {
                    let wake_writers = slot.is_full() && n < slot.limit() as usize;
                    let drained = slot.reset();
                    self.store.retire_all(drained);
                    slot.push(payloads);
                    self.store.charge(bytes);
                    wake_writers
                }
            }
        }
    }

    /// Clones of the oldest `min(n, count)` values. Non-destructive; empty
    /// when the slot is missing or empty.
    pub fn get(&self, id: LindaId, key: &Key, n: usize) -> Vec<Payload> {
        debug_assert!(n >= 1);
        let Some(slot) = self.lindas.get(&id).and_then(|map| map.get(key)) else {
            return Vec::new();
        };
        if slot.count() == 0 {
            return Vec::new();
        }
        slot.peek(n.min(slot.count()))
    }

    /// Assigns a new limit, creating the slot if needed. Returns the
    /// wake-writers indication: the slot counted as full under the old
    /// limit and no longer does under the new one.
    pub fn limit(&mut self, id: LindaId, key: &Key, new_limit: isize) -> bool {
        let slot = self
            .lindas
            .entry(id)
            .or_default()
            .entry(key.clone())
            .or_insert_with(Slot::new);
        let wake_writers = slot.limit() >= 0
            && slot.count() >= slot.limit() as usize
            && (new_limit < 0 || slot.count() < new_limit as usize);
        slot.set_limit(new_limit);
        wake_writers
    }

    /// Slot counts, shaped by how many keys were asked about.
    pub fn count(&self, id: LindaId, keys: &[Key]) -> CountReply {
        let map = self.lindas.get(&id);
        match keys.len() {
            0 => CountReply::All(
                map.map(|map| {
                    map.iter()
                        .map(|(key, slot)| (key.clone(), slot.count()))
                        .collect()
                })
                .unwrap_or_default(),
            ),
            1 => CountReply::One(
                map.and_then(|map| map.get(&keys[0])).map(Slot::count),
            ),
            _ => CountReply::Keys(
                keys.iter()
                    .filter_map(|key| {
                        map.and_then(|map| map.get(key))
                            .map(|slot| (key.clone(), slot.count()))
                    })
                    .collect(),
            ),
        }
    }

    /// Read-only snapshot of every slot of `id`, for diagnostics.
    pub fn dump(&self, id: LindaId) -> Vec<(Key, SlotSnapshot)> {
        let Some(map) = self.lindas.get(&id) else {
            return Vec::new();
        };
        map.iter()
            .map(|(key, slot)| {
                (
                    key.clone(),
                    SlotSnapshot {
                        first: slot.first(),
                        count: slot.count(),
                        limit: slot.limit(),
                        storage: slot.peek_all(),
                    },
                )
            })
            .collect()
    }

    /// Drops every linda's storage; used when the pool closes.
    pub fn teardown(&mut self) {
        self.lindas.clear();
        self.store.teardown();
    }
}
