//! Error types.
//!
//! Two kinds of failure exist in this crate:
//!
//! - **Stage failures** ([`StageError`]): a user-supplied transform, predicate,
//!   combiner or sink failed. These never unwind; they are captured as an
//!   [`ErrorContext`](crate::ErrorContext) and routed to an error handler by the
//!   trampoline.
//! - **Protocol misuse** ([`StreamError`]): pushing into a consumer that has
//!   already completed, or into a hub nobody listens to. These are reported at
//!   the call site and cannot be recovered mid-chain.

use thiserror::Error;

/// Failure raised by user code inside a stage.
pub type StageError = Box<dyn std::error::Error + Send + Sync>;

/// Misuse of a consumer or observable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StreamError {
    /// A value was pushed after end-of-stream or after the consumer requested
    /// termination.
    #[error("consumer already completed")]
    AlreadyComplete,

    /// A value was produced into an observable that has no subscribers.
    #[error("observable has no subscribers")]
    NoSubscribers,

    /// A value was produced into an observable after it was finished.
    #[error("observable is closed")]
    Closed,
}
