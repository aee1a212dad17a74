//! Joining several listener chains into one
//!
//! Each operator subscribes to its sources, keeps whatever per-source state
//! it needs behind one lock, and re-broadcasts its output through a fresh
//! [`Observable`]. The returned [`Listener`] reads from that hub.
//!
//! - [`zip`]: strict pairing, one value from every source per output.
//! - [`combine`]: latest value from every source, once all have produced.
//! - [`select`]: whichever source produced, tagged by position.

mod combine;
mod select;
mod zip;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::continuation::{Continuation, ErrorContext, Termination};
use crate::error::StreamError;
use crate::observable::{Listener, Observable, Subscription};
use crate::trampoline::handler;

pub use combine::{combine, combine3, combine_all};
pub use select::{select, select3};
pub use zip::{zip, zip3, zip_all};

/// Shared state behind one join: the user-visible output hub, the source
/// subscriptions, and the operator's own buffers.
pub(crate) struct Junction<S, O> {
    state: Mutex<S>,
    out: Observable<O>,
    subscriptions: Mutex<Vec<Subscription>>,
    ended: AtomicBool,
}

impl<S, O> Junction<S, O>
where
    S: Send + 'static,
    O: Clone + Send + 'static,
{
    pub(crate) fn new(state: S) -> Arc<Self> {
        Arc::new(Junction {
            state: Mutex::new(state),
            out: Observable::new(),
            subscriptions: Mutex::new(Vec::new()),
            ended: AtomicBool::new(false),
        })
    }

    /// Subscribe to `source`.
    ///
    /// `on_value` folds a value into the state and may yield one output.
    /// `on_end` records that this source ended and says whether the whole
    /// join is over. A failure in the source's chain counts as that source
    /// ending.
    pub(crate) fn attach<L, X, V, E>(
        self: &Arc<Self>,
        source: &Listener<L, X>,
        on_value: V,
        on_end: E,
    ) where
        L: Clone + Send + 'static,
        X: Send + 'static,
        V: Fn(&mut S, X) -> Option<O> + Send + Sync + 'static,
        E: Fn(&mut S) -> bool + Send + Sync + 'static,
    {
        let on_end = Arc::new(on_end);
        let failed = {
            let junction = Arc::clone(self);
            let on_end = Arc::clone(&on_end);
            handler(move |ctx: ErrorContext| {
                tracing::debug!(op = %ctx.op(), error = %ctx.error(), "join source failed");
                junction.source_ended(on_end.as_ref());
                Continuation::terminate()
            })
        };
        let junction = Arc::clone(self);
        let subscription = source.forward_with(failed, move |value| {
            if junction.ended.load(Ordering::Acquire) {
                return Termination::Terminate;
            }
            match value {
                Some(value) => {
                    // Emit outside the lock: output subscribers may feed back in.
                    let output = on_value(&mut *junction.state.lock(), value);
                    match output {
                        Some(output) => junction.emit(output),
                        None => Termination::CanContinue,
                    }
                }
                None => junction.source_ended(on_end.as_ref()),
            }
        });
        self.subscriptions.lock().push(subscription);
    }

    /// One source is gone; close the join if `on_end` says it is over.
    fn source_ended<E>(&self, on_end: &E) -> Termination
    where
        E: Fn(&mut S) -> bool,
    {
        if self.ended.load(Ordering::Acquire) {
            return Termination::Terminate;
        }
        let over = on_end(&mut *self.state.lock());
        if over {
            self.close()
        } else {
            Termination::Terminate
        }
    }

    fn emit(&self, output: O) -> Termination {
        match self.out.produce(output) {
            Ok(()) | Err(StreamError::NoSubscribers) => Termination::CanContinue,
            Err(_) => Termination::Terminate,
        }
    }

    /// Finish the output and detach from every source. Runs once.
    pub(crate) fn close(&self) -> Termination {
        if !self.ended.swap(true, Ordering::AcqRel) {
            let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
            for subscription in &subscriptions {
                subscription.unsubscribe();
            }
            tracing::debug!(sources = subscriptions.len(), "join ended; sources detached");
            let _ = self.out.finish();
        }
        Termination::Terminate
    }

    pub(crate) fn output(&self) -> Listener<O, O> {
        self.out.listener()
    }
}
