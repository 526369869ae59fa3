//! The fixed set of keeper shards.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;
use crate::keeper::{Keeper, KeeperShard};

/// All keepers of a universe, plus the GC pacing threshold.
///
/// Shard assignment is fixed at linda construction: `group % len`. Once the
/// closing flag is set no keeper can be acquired, so operations racing a
/// teardown observe "unavailable" instead of touching a dying shard.
pub(crate) struct KeeperPool {
    keepers: Box<[Keeper]>,
    closing: AtomicBool,
    gc_threshold: isize,
}

impl KeeperPool {
    pub fn new(keeper_count: usize, gc_threshold: isize) -> KeeperPool {
        KeeperPool {
            keepers: (0..keeper_count).map(|_| Keeper::new()).collect(),
            closing: AtomicBool::new(false),
            gc_threshold,
        }
    }

    /// Number of usable keepers; zero once the pool is closing.
    pub fn len(&self) -> usize {
        if self.closing.load(Ordering::Acquire) {
            0
        } else {
            self.keepers.len()
        }
    }

    /// The keeper assigned to `group`, unless the pool is closing or empty.
    pub fn keeper_for(&self, group: usize) -> Option<&Keeper> {
        if self.closing.load(Ordering::Acquire) || self.keepers.is_empty() {
            return None;
        }
        Some(&self.keepers[group % self.keepers.len()])
    }

    /// Single-pass shutdown. The second call is a no-op (and trips a debug
    /// assertion, since nothing should ever close the pool twice).
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            debug_assert!(false, "keeper pool closed twice");
            return;
        }
        log::debug!("closing keeper pool ({} shards)", self.keepers.len());
        for keeper in self.keepers.iter() {
            keeper.shard.lock().teardown();
        }
    }

    /// GC pacing, run after every keeper primitive except `clear`.
    ///
    /// A negative threshold disables pacing. Zero runs one incremental
    /// reclamation step per call. A positive threshold forces a full
    /// collection once shard usage reaches it, and reports a configuration
    /// error when even a full collection cannot get back under.
    pub fn pace(&self, shard: &mut KeeperShard) -> Result<(), Error> {
        let threshold = self.gc_threshold;
        if threshold < 0 {
            return Ok(());
        }
        if threshold == 0 {
            shard.store.step();
            return Ok(());
        }
        let threshold = threshold as usize;
        if shard.store.usage() >= threshold {
            let needed = shard.store.collect();
            if needed > threshold {
                return Err(Error::GcThreshold { needed });
            }
        }
        Ok(())
    }
}
