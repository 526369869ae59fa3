//! Lindas: shared rendezvous objects and their operation protocols.
//!
//! A linda is a named set of keyed FIFOs living inside one keeper shard.
//! Blocking operations follow one shape: sample cancellation, run the keeper
//! primitive under the shard mutex, broadcast the appropriate condition
//! variable on success, otherwise wait on the opposite one until retry,
//! timeout or cancellation. The mutex is held exactly while a primitive runs
//! and while broadcasting; condvar waits release and reacquire it
//! atomically.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Condvar;

use crate::cancel::{CancelCell, CancelFlag, CancelMode, CancelRequest};
use crate::error::Error;
use crate::keeper::{CountReply, Keeper, KeeperShard, LindaId};
use crate::key::Key;
use crate::name::LindaName;
use crate::slot::UNBOUNDED;
use crate::universe::Universe;
use crate::value::Value;

/// Result of a blocking send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// All values were queued.
    Sent,
    /// The slot stayed full until the deadline.
    TimedOut,
    /// A soft cancellation was pending.
    Cancelled,
}

/// Result of a blocking single-value receive.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveOutcome {
    /// A value arrived, tagged with the key that held it.
    Value {
        /// The key the value was queued under.
        key: Key,
        /// The received value.
        value: Value,
    },
    /// Every polled slot stayed empty until the deadline.
    TimedOut,
    /// A soft cancellation was pending.
    Cancelled,
}

/// Result of a blocking batched receive.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Between `min` and `max` values, in FIFO order.
    Values(Vec<Value>),
    /// The slot never reached `min` queued values before the deadline.
    TimedOut,
    /// A soft cancellation was pending.
    Cancelled,
}

/// Result of a destructive overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The slot was replaced (or emptied).
    Stored {
        /// True when a blocked writer should have been woken: the slot was
        /// full before and no longer is.
        woke_writers: bool,
    },
    /// The linda is soft-cancelled; nothing was touched.
    Cancelled,
}

/// Result of a non-destructive read.
#[derive(Debug, Clone, PartialEq)]
pub enum GetOutcome {
    /// Up to the requested number of oldest values, unconsumed.
    Values(Vec<Value>),
    /// The linda is soft-cancelled; nothing was read.
    Cancelled,
}

/// Result of a limit change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitOutcome {
    /// The limit was assigned.
    Set {
        /// True when the change unblocked writers.
        woke_writers: bool,
    },
    /// The linda is soft-cancelled; the limit is unchanged.
    Cancelled,
}

/// Diagnostic snapshot of one slot, as returned by [`Linda::dump`].
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDump {
    /// 1-based index of the oldest queued value.
    pub first: usize,
    /// Number of queued values.
    pub count: usize,
    /// Capacity limit; -1 means unbounded.
    pub limit: isize,
    /// The queued values, oldest first.
    pub values: Vec<Value>,
}

/// Everything proxies of one linda share: identity, name, group, the two
/// condition variables and the linda-level cancellation flag.
struct Deep {
    universe: Arc<Universe>,
    name: LindaName,
    group: usize,
    read_happened: Condvar,
    write_happened: Condvar,
    cancel: CancelCell,
}

impl Drop for Deep {
    fn drop(&mut self) {
        // the last proxy is gone; wipe the keeper-side storage. The keeper
        // can already be unavailable during universe teardown, in which case
        // there is nothing left to clear.
        let id = LindaId(self as *const Deep as usize);
        if let Some(keeper) = self.universe.keepers.keeper_for(self.group) {
            keeper.shard.lock().clear(id);
        }
    }
}

/// Which side of the rendezvous a blocking operation is on.
#[derive(Clone, Copy)]
enum Role {
    /// Waits on `read_happened`, broadcasts `write_happened` on success.
    Writer,
    /// Waits on `write_happened`, broadcasts `read_happened` on success.
    Reader,
}

enum WaitEnd<R> {
    Got(R),
    TimedOut,
    Cancelled,
}

/// A handle on a shared linda.
///
/// Cloning is cheap and every clone addresses the same underlying object;
/// [`Linda::for_worker`] binds a clone to a worker's cancellation flag so
/// blocking operations can observe worker-level cancel requests. When the
/// last handle drops, the linda's keeper storage is cleared.
#[derive(Clone)]
pub struct Linda {
    deep: Arc<Deep>,
    worker: Option<CancelFlag>,
}

fn check_key(key: &Key) -> Result<(), Error> {
    if key.is_reserved() {
        Err(Error::ReservedKey)
    } else {
        Ok(())
    }
}

fn deadline_from(timeout: Option<Duration>) -> Option<Instant> {
    timeout.map(|d| Instant::now() + d)
}

impl Linda {
    /// Creates a linda in `universe`, assigned to the keeper `group % N`.
    ///
    /// An empty `name` leaves the linda unnamed. Fails when the universe has
    /// no keepers to host it.
    pub fn new(universe: &Arc<Universe>, name: &str, group: usize) -> Result<Linda, Error> {
        if universe.keeper_count() == 0 {
            return Err(if universe.is_closed() {
                Error::Unavailable
            } else {
                Error::ZeroKeepers
            });
        }
        let deep = Arc::new(Deep {
            universe: universe.clone(),
            name: LindaName::new(name),
            group,
            read_happened: Condvar::new(),
            write_happened: Condvar::new(),
            cancel: CancelCell::default(),
        });
        Ok(Linda { deep, worker: None })
    }

    /// A clone of this handle bound to a worker's cancellation flag.
    pub fn for_worker(&self, flag: CancelFlag) -> Linda {
        Linda {
            deep: self.deep.clone(),
            worker: Some(flag),
        }
    }

    /// The linda's name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.deep.name.as_str()
    }

    /// The group used for keeper assignment.
    pub fn group(&self) -> usize {
        self.deep.group
    }

    /// An identity equal across every handle on the same underlying linda,
    /// usable as a map key.
    pub fn deep(&self) -> LindaId {
        self.id()
    }

    fn id(&self) -> LindaId {
        LindaId(Arc::as_ptr(&self.deep) as usize)
    }

    fn keeper(&self) -> Result<&Keeper, Error> {
        self.deep
            .universe
            .keepers
            .keeper_for(self.deep.group)
            .ok_or(Error::Unavailable)
    }

    /// Worker-level requests take precedence over the linda-level flag.
    fn cancel_pending(&self) -> CancelRequest {
        match self.worker.as_ref().map(CancelFlag::pending) {
            Some(request) if request != CancelRequest::None => request,
            _ => self.deep.cancel.get(),
        }
    }

    /// The send/receive protocol: primitive under the shard mutex, broadcast
    /// on success, wait on the opposite condvar otherwise.
    ///
    /// Spurious wakeups only schedule another iteration; a timed-out wait
    /// terminates the loop without another primitive call, and cancellation
    /// is sampled at the top of every iteration.
    fn wait_loop<R>(
        &self,
        deadline: Option<Instant>,
        role: Role,
        mut attempt: impl FnMut(&mut KeeperShard) -> Result<Option<R>, Error>,
    ) -> Result<WaitEnd<R>, Error> {
        let keeper = self.keeper()?;
        let mut shard = keeper.shard.lock();
        let mut try_again = true;
        loop {
            let cancel = self.cancel_pending();
            if !try_again || cancel != CancelRequest::None {
                return match cancel {
                    CancelRequest::Hard => Err(Error::Cancelled),
                    CancelRequest::Soft => Ok(WaitEnd::Cancelled),
                    CancelRequest::None => Ok(WaitEnd::TimedOut),
                };
            }

            let got = attempt(&mut shard)?;
            self.deep.universe.keepers.pace(&mut shard)?;
            if let Some(result) = got {
                match role {
                    Role::Writer => self.deep.write_happened.notify_all(),
                    Role::Reader => self.deep.read_happened.notify_all(),
                };
                return Ok(WaitEnd::Got(result));
            }

            // an elapsed deadline bypasses the wait syscall entirely
            if matches!(deadline, Some(d) if Instant::now() >= d) {
                return Ok(WaitEnd::TimedOut);
            }

            let condvar = match role {
                Role::Writer => &self.deep.read_happened,
                Role::Reader => &self.deep.write_happened,
            };
            try_again = match deadline {
                None => {
                    condvar.wait(&mut shard);
                    true
                }
                Some(d) => !condvar.wait_until(&mut shard, d).timed_out(),
            };
        }
    }

    /// Sends one or more values to `key`, blocking while the slot is full.
    ///
    /// `timeout` of `None` waits forever; `Duration::ZERO` polls. Returns
    /// [`SendOutcome::TimedOut`] only when the key has a limit, and
    /// [`SendOutcome::Cancelled`] under a pending soft cancel.
    pub fn send(
        &self,
        timeout: Option<Duration>,
        key: impl Into<Key>,
        values: &[Value],
    ) -> Result<SendOutcome, Error> {
        let key = key.into();
        check_key(&key)?;
        if values.is_empty() {
            return Err(Error::NoData);
        }
        let deadline = deadline_from(timeout);
        let mut payloads = self
            .deep
            .universe
            .engine
            .to_keeper(values)
            .map_err(|_| Error::UnsupportedType)?;
        let id = self.id();

        let end = self.wait_loop(deadline, Role::Writer, |shard| {
            Ok(if shard.send(id, &key, &mut payloads) {
                Some(())
            } else {
                None
            })
        })?;
        Ok(match end {
            WaitEnd::Got(()) => SendOutcome::Sent,
            WaitEnd::TimedOut => SendOutcome::TimedOut,
            WaitEnd::Cancelled => SendOutcome::Cancelled,
        })
    }

    /// Receives a single value from the first non-empty key in `keys`,
    /// blocking while all of them are empty.
    ///
    /// The argument order is the priority order.
    pub fn receive(
        &self,
        timeout: Option<Duration>,
        keys: &[Key],
    ) -> Result<ReceiveOutcome, Error> {
        if keys.is_empty() {
            return Err(Error::NoKeys);
        }
        for key in keys {
            check_key(key)?;
        }
        let deadline = deadline_from(timeout);
        let id = self.id();

        let end = self.wait_loop(deadline, Role::Reader, |shard| {
            let Some((key, payload)) = shard.receive(id, keys) else {
                return Ok(None);
            };
            let mut values = self
                .deep
                .universe
                .engine
                .from_keeper(std::slice::from_ref(&payload))
                .map_err(|_| Error::UnsupportedType)?;
            let value = values.pop().ok_or(Error::UnsupportedType)?;
            Ok(Some((key, value)))
        })?;
        Ok(match end {
            WaitEnd::Got((key, value)) => ReceiveOutcome::Value { key, value },
            WaitEnd::TimedOut => ReceiveOutcome::TimedOut,
            WaitEnd::Cancelled => ReceiveOutcome::Cancelled,
        })
    }

    /// Receives between `min` and `max` values from one key, blocking while
    /// fewer than `min` are queued. `max` of `None` means exactly `min`.
    pub fn receive_batched(
        &self,
        timeout: Option<Duration>,
        key: impl Into<Key>,
        min: usize,
        max: Option<usize>,
    ) -> Result<BatchOutcome, Error> {
        let key = key.into();
        check_key(&key)?;
        let max = max.unwrap_or(min);
        if min < 1 || max < min {
            return Err(Error::BadBatchRange { min, max });
        }
        let deadline = deadline_from(timeout);
        let id = self.id();

        let end = self.wait_loop(deadline, Role::Reader, |shard| {
            let popped = shard.receive_batched(id, &key, min, max);
            if popped.is_empty() {
                return Ok(None);
            }
            let values = self
                .deep
                .universe
                .engine
                .from_keeper(&popped)
                .map_err(|_| Error::UnsupportedType)?;
            Ok(Some(values))
        })?;
        Ok(match end {
            WaitEnd::Got(values) => BatchOutcome::Values(values),
            WaitEnd::TimedOut => BatchOutcome::TimedOut,
            WaitEnd::Cancelled => BatchOutcome::Cancelled,
        })
    }

    /// Replaces the contents of `key` with `values`, without blocking.
    ///
    /// With no values the slot is emptied: an unbounded slot disappears
    /// entirely, a limited one keeps its limit. Readers are woken when
    /// values were stored; writers when the slot stops being full.
    pub fn set(&self, key: impl Into<Key>, values: &[Value]) -> Result<SetOutcome, Error> {
        let key = key.into();
        check_key(&key)?;
        if self.deep.cancel.get() != CancelRequest::None {
            return Ok(SetOutcome::Cancelled);
        }
        let payloads = self
            .deep
            .universe
            .engine
            .to_keeper(values)
            .map_err(|_| Error::UnsupportedType)?;

        let keeper = self.keeper()?;
        let mut shard = keeper.shard.lock();
        let woke_writers = shard.set(self.id(), &key, payloads);
        self.deep.universe.keepers.pace(&mut shard)?;
        if !values.is_empty() {
            self.deep.write_happened.notify_all();
        }
        if woke_writers {
            self.deep.read_happened.notify_all();
        }
        Ok(SetOutcome::Stored { woke_writers })
    }

    /// Reads up to `n` of the oldest values under `key` without consuming
    /// them. An absent or empty slot yields an empty vector.
    pub fn get(&self, key: impl Into<Key>, n: usize) -> Result<GetOutcome, Error> {
        let key = key.into();
        check_key(&key)?;
        if n < 1 {
            return Err(Error::BadCount);
        }
        if self.deep.cancel.get() != CancelRequest::None {
            return Ok(GetOutcome::Cancelled);
        }

        let keeper = self.keeper()?;
        let mut shard = keeper.shard.lock();
        let payloads = shard.get(self.id(), &key, n);
        self.deep.universe.keepers.pace(&mut shard)?;
        let values = self
            .deep
            .universe
            .engine
            .from_keeper(&payloads)
            .map_err(|_| Error::UnsupportedType)?;
        Ok(GetOutcome::Values(values))
    }

    /// The number of values queued under `key`, or `None` when the key has
    /// no slot.
    pub fn count(&self, key: impl Into<Key>) -> Result<Option<usize>, Error> {
        let key = key.into();
        check_key(&key)?;
        let keeper = self.keeper()?;
        let mut shard = keeper.shard.lock();
        let reply = shard.count(self.id(), std::slice::from_ref(&key));
        self.deep.universe.keepers.pace(&mut shard)?;
        Ok(match reply {
            CountReply::One(count) => count,
            _ => None,
        })
    }

    /// Counts of every key that currently has a slot.
    pub fn counts(&self) -> Result<Vec<(Key, usize)>, Error> {
        let keeper = self.keeper()?;
        let mut shard = keeper.shard.lock();
        let reply = shard.count(self.id(), &[]);
        self.deep.universe.keepers.pace(&mut shard)?;
        Ok(match reply {
            CountReply::All(counts) => counts,
            _ => Vec::new(),
        })
    }

    /// Counts restricted to `keys`, skipping those without a slot.
    pub fn counts_for(&self, keys: &[Key]) -> Result<Vec<(Key, usize)>, Error> {
        for key in keys {
            check_key(key)?;
        }
        let keeper = self.keeper()?;
        let mut shard = keeper.shard.lock();
        let reply = shard.count(self.id(), keys);
        self.deep.universe.keepers.pace(&mut shard)?;
        Ok(match reply {
            CountReply::All(counts) | CountReply::Keys(counts) => counts,
            CountReply::One(count) => count
                .map(|n| vec![(keys[0].clone(), n)])
                .unwrap_or_default(),
        })
    }

    /// Assigns a capacity limit to `key`, creating the slot if needed.
    /// `None` resets it to unbounded. Wakes blocked writers when the change
    /// makes room.
    pub fn limit(
        &self,
        key: impl Into<Key>,
        limit: Option<usize>,
    ) -> Result<LimitOutcome, Error> {
        let key = key.into();
        check_key(&key)?;
        if self.deep.cancel.get() != CancelRequest::None {
            return Ok(LimitOutcome::Cancelled);
        }
        let new_limit = limit.map(|n| n as isize).unwrap_or(UNBOUNDED);

        let keeper = self.keeper()?;
        let mut shard = keeper.shard.lock();
        let woke_writers = shard.limit(self.id(), &key, new_limit);
        self.deep.universe.keepers.pace(&mut shard)?;
        if woke_writers {
            self.deep.read_happened.notify_all();
        }
        Ok(LimitOutcome::Set { woke_writers })
    }

    /// Flags the linda for soft cancellation and wakes the chosen waiters,
    /// or clears the flag with [`CancelMode::None`].
    ///
    /// Clearing does not broadcast; waiters wake on the next data event.
    pub fn cancel(&self, mode: CancelMode) {
        if matches!(mode, CancelMode::None) {
            self.deep.cancel.set(CancelRequest::None);
            return;
        }
        self.deep.cancel.set(CancelRequest::Soft);
        log::debug!("{}: soft cancel, waking {:?} side", self, mode);
        // broadcast under the shard mutex so a waiter between its cancel
        // check and its wait cannot miss the wakeup
        let _guard = self.keeper().ok().map(|keeper| keeper.shard.lock());
        if matches!(mode, CancelMode::Both | CancelMode::Read) {
            self.deep.write_happened.notify_all();
        }
        if matches!(mode, CancelMode::Both | CancelMode::Write) {
            self.deep.read_happened.notify_all();
        }
    }

    /// Diagnostic snapshot of every slot: indices, limit and queued values.
    pub fn dump(&self) -> Result<Vec<(Key, SlotDump)>, Error> {
        let keeper = self.keeper()?;
        let shard = keeper.shard.lock();
        let snapshots = shard.dump(self.id());
        let mut out = Vec::with_capacity(snapshots.len());
        for (key, snapshot) in snapshots {
            let values = self
                .deep
                .universe
                .engine
                .from_keeper(&snapshot.storage)
                .map_err(|_| Error::UnsupportedType)?;
            out.push((
                key,
                SlotDump {
                    first: snapshot.first,
                    count: snapshot.count,
                    limit: snapshot.limit,
                    values,
                },
            ));
        }
        Ok(out)
    }
}

impl fmt::Display for Linda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.deep.name.as_str() {
            Some(name) => write!(f, "Linda: {}", name),
            None => write!(f, "Linda: {:#x}", self.id().as_usize()),
        }
    }
}
