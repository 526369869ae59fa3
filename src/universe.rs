//! The universe: process-wide home of the transfer engine and keeper pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::Error;
use crate::pool::KeeperPool;
use crate::transfer::{DeepCopyEngine, TransferEngine};

/// Configuration consumed once at universe construction.
pub struct UniverseConfig {
    /// Number of keeper shards. Zero builds a universe that cannot host
    /// lindas (creation fails with [`Error::ZeroKeepers`]).
    pub keeper_count: usize,
    /// GC pacing threshold in bytes. Negative disables pacing, zero runs an
    /// incremental reclamation step after every primitive, positive forces a
    /// full collection once a shard's usage reaches it.
    pub gc_threshold: isize,
    /// The value-transfer engine used at every keeper boundary crossing.
    pub engine: Arc<dyn TransferEngine>,
}

impl Default for UniverseConfig {
    fn default() -> UniverseConfig {
        UniverseConfig {
            keeper_count: 1,
            gc_threshold: -1,
            engine: Arc::new(DeepCopyEngine),
        }
    }
}

/// Shared state every linda of one universe hangs off: the keeper pool and
/// the transfer engine.
///
/// Universes are explicit values; tests build as many as they like. A
/// process that wants a single ambient one can install it with
/// [`init_global`].
pub struct Universe {
    pub(crate) keepers: KeeperPool,
    pub(crate) engine: Arc<dyn TransferEngine>,
    closed: AtomicBool,
}

impl Universe {
    /// Builds a universe with its own keeper pool.
    pub fn new(config: UniverseConfig) -> Arc<Universe> {
        log::debug!(
            "universe init: {} keepers, gc threshold {}",
            config.keeper_count,
            config.gc_threshold
        );
        Arc::new(Universe {
            keepers: KeeperPool::new(config.keeper_count, config.gc_threshold),
            engine: config.engine,
            closed: AtomicBool::new(false),
        })
    }

    /// Number of usable keepers; zero once the universe is closed.
    pub fn keeper_count(&self) -> usize {
        self.keepers.len()
    }

    /// Single-shot teardown.
    ///
    /// Idempotent: the first call closes the keeper pool, later calls do
    /// nothing. Every operation that observes the teardown gets
    /// [`Error::Unavailable`] instead of a panic.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.keepers.close();
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

static GLOBAL: OnceCell<Arc<Universe>> = OnceCell::new();

/// Installs the process-wide universe. At most one ever exists; a second
/// call fails with [`Error::AlreadyInitialized`] and changes nothing.
pub fn init_global(config: UniverseConfig) -> Result<Arc<Universe>, Error> {
    let universe = Universe::new(config);
    GLOBAL
        .set(universe.clone())
        .map_err(|_| Error::AlreadyInitialized)?;
    Ok(universe)
}

/// The process-wide universe, if one was installed.
pub fn global() -> Option<Arc<Universe>> {
    GLOBAL.get().cloned()
}
