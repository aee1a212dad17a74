//! Lazy pull-side chains ending in a [`Consumer`].

use std::fmt;
use std::sync::Arc;

use crate::chain::{Chain, Stages};
use crate::compose::Composer;
use crate::consumer::{Consumer, forward, terminal};
use crate::continuation::Termination;
use crate::delivery::{Delivery, StageContext};
use crate::error::StageError;
use crate::trampoline::{ErrorHandler, swallow_errors};

/// A recorded chain of operators from `S` to `T`, not yet attached to a sink.
///
/// Sequences are immutable; every operator returns a new one. Each terminal
/// call materializes an independent pipeline, so one sequence can be consumed
/// any number of times.
pub struct Sequence<S, T> {
    stages: Stages<S, T>,
}

/// Start a chain whose head accepts `T`.
pub fn source<T: Send + 'static>() -> Sequence<T, T> {
    Sequence {
        stages: Stages::new(),
    }
}

impl<S: Send + 'static, T: Send + 'static> Sequence<S, T> {
    /// Attach `sink` and return the consumer that feeds the chain.
    ///
    /// The sink borrows each value so that a failing sink can hand it to the
    /// error handler. Failures nobody handles drop the failing value; see
    /// [`swallow_errors`].
    pub fn consume<F>(&self, sink: F) -> Consumer<S>
    where
        F: Fn(&Option<T>) -> Result<Termination, StageError> + Send + Sync + 'static,
    {
        self.consume_with(swallow_errors(), sink)
    }

    /// [`consume`](Sequence::consume) with a custom error handler.
    pub fn consume_with<F>(&self, handler: ErrorHandler, sink: F) -> Consumer<S>
    where
        F: Fn(&Option<T>) -> Result<Termination, StageError> + Send + Sync + 'static,
    {
        let ctx = StageContext::new(handler);
        let entry = terminal(Arc::new(sink), ctx.clone());
        self.attach(entry, ctx)
    }

    /// Attach a sink that sees every value and the end-of-stream and never
    /// asks to stop.
    pub fn for_each<F>(&self, f: F) -> Consumer<S>
    where
        F: Fn(Option<T>) + Send + Sync + 'static,
    {
        let ctx = StageContext::new(swallow_errors());
        let sink = move |value: Option<T>| {
            f(value);
            Termination::CanContinue
        };
        self.attach(forward(Arc::new(sink), ctx.clone()), ctx)
    }

    fn attach(&self, entry: Delivery<T>, ctx: StageContext) -> Consumer<S> {
        let pipeline = self.stages.materialize(entry, &ctx);
        tracing::trace!(stages = pipeline.stage_count(), "sequence materialized");
        Consumer::new(pipeline, ctx)
    }

    /// Number of operators recorded so far.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.len() == 0
    }
}

impl<S: Send + 'static, T: Send + 'static> Chain for Sequence<S, T> {
    type Input = S;
    type Output = T;
    type Then<U: Send + 'static> = Sequence<S, U>;

    fn then<U: Send + 'static>(self, composer: Composer<T, U>) -> Sequence<S, U> {
        Sequence {
            stages: self.stages.push(composer),
        }
    }
}

impl<S, T> Clone for Sequence<S, T> {
    fn clone(&self) -> Self {
        Sequence {
            stages: self.stages.clone(),
        }
    }
}

impl<S, T> fmt::Debug for Sequence<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("input", &std::any::type_name::<S>())
            .field("output", &std::any::type_name::<T>())
            .field("stages", &self.stages)
            .finish()
    }
}
