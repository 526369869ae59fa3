use std::fmt;

/// Typed errors for linda operations.
///
/// Timeouts and soft cancellations are *not* errors: they come back as
/// ordinary outcome values (`SendOutcome::TimedOut` and friends). Everything
/// here terminates the operation at its boundary; the linda itself stays
/// usable afterwards unless it was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `send` was called with no values.
    NoData,
    /// `receive` was called with no keys.
    NoKeys,
    /// A reserved sentinel identity was used as a slot key.
    ReservedKey,
    /// Batched receive bounds are out of order or `min` is zero.
    BadBatchRange {
        /// The minimum count requested.
        min: usize,
        /// The maximum count requested.
        max: usize,
    },
    /// `get` was called with a zero count.
    BadCount,
    /// The transfer engine cannot move one of the values across the keeper
    /// boundary. Nothing was enqueued.
    UnsupportedType,
    /// Keeper memory stayed above the configured pacing threshold even after
    /// a full collection. The threshold needs to be at least `needed` bytes.
    GcThreshold {
        /// Keeper usage observed after the forced collection.
        needed: usize,
    },
    /// The worker carrying this operation was hard-cancelled.
    Cancelled,
    /// The keeper pool is closing; no keeper can be acquired.
    Unavailable,
    /// A universe with zero keepers cannot host lindas.
    ZeroKeepers,
    /// A process-wide universe was already installed.
    AlreadyInitialized,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoData => write!(f, "no data to send"),
            Error::NoKeys => write!(f, "no keys to receive from"),
            Error::ReservedKey => {
                write!(f, "reserved sentinel identity used as a slot key")
            }
            Error::BadBatchRange { min, max } => {
                write!(f, "batched min/max error (min {}, max {})", min, max)
            }
            Error::BadCount => write!(f, "count should be >= 1"),
            Error::UnsupportedType => {
                write!(f, "tried to copy unsupported types")
            }
            Error::GcThreshold { needed } => {
                write!(f, "keeper GC threshold is too low, need at least {}", needed)
            }
            Error::Cancelled => write!(f, "operation was hard-cancelled"),
            Error::Unavailable => write!(f, "keeper pool is unavailable"),
            Error::ZeroKeepers => {
                write!(f, "universe was built with zero keepers")
            }
            Error::AlreadyInitialized => {
                write!(f, "a global universe is already installed")
            }
        }
    }
}

impl std::error::Error for Error {}
