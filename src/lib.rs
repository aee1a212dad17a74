//! # Contseq: Lazy Sequences and Reactive Streams on a Trampoline
//!
//! Build a chain of operators over a stream of values, attach a terminal, and
//! push values through. Every stage hands the next one a [`Continuation`]
//! instead of calling it, and one explicit-stack drive loop runs them all, so
//! chains of any length run in constant native stack depth and a failing
//! stage becomes a value an error handler can resume from.
//!
//! ## Core Types
//!
//! - **[`Sequence<S, T>`]**: a lazy chain ending in a one-shot [`Consumer`]
//! - **[`Observable<T>`]**: a fan-out hub feeding any number of [`Listener`] chains
//! - **[`Chain`]**: the operator methods both share
//! - **[`Continuation`]**: one resumable step, driven by [`complete`]
//!
//! ## Example
//!
//! ```
//! use contseq::prelude::*;
//!
//! let total = std::sync::Arc::new(parking_lot::Mutex::new(None));
//! let sink = std::sync::Arc::clone(&total);
//! let consumer = source::<u64>()
//!     .filter(|x| x % 3 == 0)
//!     .map(|x| x * x)
//!     .reduce(0, |acc: &mut u64, x| *acc += x)
//!     .for_each(move |sum| {
//!         if sum.is_some() {
//!             *sink.lock() = sum;
//!         }
//!     });
//!
//! for x in 1..=9 {
//!     consumer.push(x).unwrap();
//! }
//! consumer.finish().unwrap();
//! assert_eq!(*total.lock(), Some(9 + 36 + 81));
//! ```
//!
//! ## Common Functions
//!
//! **Building chains:**
//! - [`source()`] - start a [`Sequence`]
//! - [`Observable::listener`] - start a [`Listener`]
//! - [`zip`], [`combine`], [`select`] - join listener chains
//!
//! **Operators** (on any [`Chain`]): `map`, `compact_map`, `filter`,
//! `flat_map`, `collect`, `reduce`, `dispatch`, and `try_*` variants of the
//! fallible ones.
//!
//! **Error handling:**
//! - [`swallow_errors`] - default for consumers: drop the failed value
//! - [`terminate_on_error`] - default for subscriptions: unsubscribe
//! - [`handler`] - anything else, via [`ErrorContext`]

mod chain;
pub mod compose;
pub mod concurrent;
mod consumer;
mod continuation;
mod delivery;
mod error;
mod observable;
pub mod prelude;
pub mod queue;
mod sequence;
pub mod trampoline;

pub use chain::Chain;
pub use compose::Composer;
pub use concurrent::{combine, combine3, combine_all, select, select3, zip, zip3, zip_all};
pub use consumer::Consumer;
pub use continuation::{Continuation, ErrorContext, OperatorKind, Step, Termination};
pub use delivery::{Delivery, Pipeline, StageContext};
pub use error::{StageError, StreamError};
pub use observable::{Listener, Observable, Subscription, SubscriptionId};
pub use queue::{DeferredQueue, InlineQueue, Job, PoolConfig, WorkQueue, WorkerPool};
pub use sequence::{Sequence, source};
pub use trampoline::{ErrorHandler, complete, handler, swallow_errors, terminate_on_error};
