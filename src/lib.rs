//! Linda: sharded rendezvous FIFOs for isolated workers.
//!
//! Workers that cannot share heap coordinate through *lindas*: shared,
//! optionally named sets of keyed bounded FIFOs ("slots") with timeout- and
//! cancel-aware send/receive. Actual storage lives in *keepers*, a fixed
//! pool of mutex-guarded shards; every value crossing the boundary is deep-
//! copied by a pluggable transfer engine, so no worker ever observes another
//! worker's memory.
//!
//! # Key Features
//!
//! - **Keyed bounded FIFOs**: per-key capacity limits, strict FIFO order,
//!   bulk batched receive, non-destructive peek and destructive overwrite.
//! - **Blocking rendezvous**: send blocks while a slot is full, receive
//!   while it is empty, with absolute steady-clock deadlines (`None` waits
//!   forever, a zero duration polls).
//! - **Cooperative cancellation**: soft cancel turns blocked operations into
//!   ordinary cancelled outcomes; hard cancel unwinds them as errors.
//! - **Sharded storage**: lindas are assigned to keepers by group, one mutex
//!   per shard and no other lock in the system.
//! - **Opaque values**: the core never interprets what it queues; a
//!   [`TransferEngine`] moves values in and out all-or-nothing.
//!
//! # Example
//!
//! ```rust
//! use linda::{Linda, ReceiveOutcome, SendOutcome, Universe, UniverseConfig, Value};
//!
//! let universe = Universe::new(UniverseConfig::default());
//! let linda = Linda::new(&universe, "jobs", 0).unwrap();
//!
//! let sent = linda.send(None, "work", &[Value::from(42i64)]).unwrap();
//! assert_eq!(sent, SendOutcome::Sent);
//!
//! match linda.receive(None, &["work".into()]).unwrap() {
//!     ReceiveOutcome::Value { value, .. } => assert_eq!(value, Value::Int(42)),
//!     other => panic!("unexpected outcome {:?}", other),
//! }
//! ```

#![warn(missing_docs)]

mod cancel;
mod error;
mod key;
mod keeper;
mod linda;
mod name;
mod pool;
mod slot;
mod store;
mod transfer;
mod universe;
mod value;

pub use cancel::{CancelFlag, CancelMode, CancelRequest};
pub use error::Error;
pub use key::{Key, Sentinel};
pub use keeper::LindaId;
pub use linda::{
    BatchOutcome, GetOutcome, LimitOutcome, Linda, ReceiveOutcome, SendOutcome, SetOutcome,
    SlotDump,
};
pub use transfer::{DeepCopyEngine, Payload, PayloadRepr, TransferEngine, UnsupportedType};
pub use universe::{global, init_global, Universe, UniverseConfig};
pub use value::Value;
