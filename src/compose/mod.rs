//! Operator composers
//!
//! A [`Composer<T, U>`] turns the delivery of the next stage (accepting `U`)
//! into the delivery of this stage (accepting `T`). Every composer here
//! follows the same rules:
//!
//! - `None` is end-of-stream and is forwarded exactly once, after any buffered
//!   state is flushed.
//! - User code that fails is captured as an [`ErrorContext`](crate::ErrorContext)
//!   instead of unwinding.
//! - A value that is deliberately dropped (filtered out, absorbed into an
//!   accumulator) answers `Done(CanContinue)`.
//! - Downstream deliveries are only ever called from inside a `More` step, so
//!   the trampoline, not the call stack, walks the chain.

mod collect;
mod dispatch;
mod flat_map;
mod map;

use std::fmt;
use std::sync::Arc;

use crate::delivery::{Delivery, StageContext};

pub use collect::{collect, reduce, try_collect};
pub use dispatch::dispatch;
pub use flat_map::{flat_map, try_flat_map};
pub use map::{compact_map, filter, map, try_compact_map, try_filter, try_map};

type Build<T, U> = dyn Fn(Delivery<U>, &StageContext) -> Delivery<T> + Send + Sync;

/// Builds a stage's delivery from the delivery of the stage after it.
///
/// Composers are reusable: every materialization of a chain calls
/// [`compose`](Composer::compose) again and gets fresh per-stage state.
pub struct Composer<T, U> {
    build: Arc<Build<T, U>>,
}

impl<T, U> Composer<T, U> {
    /// Wrap a build function.
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(Delivery<U>, &StageContext) -> Delivery<T> + Send + Sync + 'static,
    {
        Composer {
            build: Arc::new(build),
        }
    }

    /// Build this stage in front of `downstream`.
    pub fn compose(&self, downstream: Delivery<U>, ctx: &StageContext) -> Delivery<T> {
        (self.build)(downstream, ctx)
    }
}

impl<T, U> Clone for Composer<T, U> {
    fn clone(&self) -> Self {
        Composer {
            build: Arc::clone(&self.build),
        }
    }
}

impl<T, U> fmt::Debug for Composer<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("input", &std::any::type_name::<T>())
            .field("output", &std::any::type_name::<U>())
            .finish()
    }
}
