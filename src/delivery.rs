//! Delivery functions and materialized pipelines.
//!
//! A [`Delivery<T>`] accepts one `Option<T>` (where `None` is end-of-stream)
//! and returns the [`Continuation`] that carries the value further.
//!
//! When a chain is materialized, each stage's delivery links to the next
//! through a weak reference and the [`Pipeline`] owns every stage in a flat
//! list. Building, driving and dropping a pipeline therefore never recurses
//! through the stages, however many there are. A delivery whose pipeline has
//! been dropped answers every value with `Done(Terminate)`.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::continuation::Continuation;
use crate::trampoline::ErrorHandler;

type DeliverFn<T> = dyn Fn(Option<T>) -> Continuation + Send + Sync;

enum Link<T> {
    Owned(Arc<DeliverFn<T>>),
    Linked(Weak<DeliverFn<T>>),
}

/// The accept function of one pipeline stage.
pub struct Delivery<T> {
    link: Link<T>,
}

impl<T: Send + 'static> Delivery<T> {
    /// Wrap a closure as a delivery.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<T>) -> Continuation + Send + Sync + 'static,
    {
        Delivery {
            link: Link::Owned(Arc::new(f)),
        }
    }

    /// Hand `value` to this stage.
    pub fn deliver(&self, value: Option<T>) -> Continuation {
        match &self.link {
            Link::Owned(f) => f(value),
            Link::Linked(weak) => match weak.upgrade() {
                Some(f) => f(value),
                None => Continuation::terminate(),
            },
        }
    }

    /// Returns `true` once the pipeline owning this stage has been dropped.
    pub fn is_closed(&self) -> bool {
        match &self.link {
            Link::Owned(_) => false,
            Link::Linked(weak) => weak.strong_count() == 0,
        }
    }

    /// Swap ownership for a weak link, returning the strong half so the
    /// pipeline can keep the stage alive.
    pub(crate) fn into_linked(self) -> (Delivery<T>, Option<Box<dyn Any + Send + Sync>>) {
        match self.link {
            Link::Owned(f) => {
                let weak = Arc::downgrade(&f);
                let keep: Box<dyn Any + Send + Sync> = Box::new(f);
                (
                    Delivery {
                        link: Link::Linked(weak),
                    },
                    Some(keep),
                )
            }
            linked @ Link::Linked(_) => (Delivery { link: linked }, None),
        }
    }
}

impl<T> Clone for Delivery<T> {
    fn clone(&self) -> Self {
        let link = match &self.link {
            Link::Owned(f) => Link::Owned(Arc::clone(f)),
            Link::Linked(weak) => Link::Linked(Weak::clone(weak)),
        };
        Delivery { link }
    }
}

impl<T> fmt::Debug for Delivery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.link {
            Link::Owned(_) => "owned",
            Link::Linked(_) => "linked",
        };
        f.debug_struct("Delivery").field("link", &kind).finish()
    }
}

/// Per-materialization state handed to every composer.
///
/// Carries the error handler of the terminal being built and a flag recording
/// that the terminal is done, either because it asked to stop or because it
/// has seen the end-of-stream. Work that leaves the current drive (see
/// [`dispatch`](crate::compose::dispatch)) uses both to report failures and
/// termination back to the right consumer.
#[derive(Clone)]
pub struct StageContext {
    handler: ErrorHandler,
    terminated: Arc<AtomicBool>,
}

impl StageContext {
    pub(crate) fn new(handler: ErrorHandler) -> Self {
        StageContext {
            handler,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Error handler of the terminal this pipeline feeds.
    pub fn handler(&self) -> &ErrorHandler {
        &self.handler
    }

    /// Record that the terminal returned `Terminate` or saw end-of-stream.
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    /// Whether the terminal is done.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}

/// A fully materialized chain: one entry delivery plus ownership of every
/// stage behind it.
pub struct Pipeline<T> {
    entry: Delivery<T>,
    _stages: Vec<Box<dyn Any + Send + Sync>>,
}

impl<T: Send + 'static> Pipeline<T> {
    pub(crate) fn new(entry: Delivery<T>, stages: Vec<Box<dyn Any + Send + Sync>>) -> Self {
        Pipeline {
            entry,
            _stages: stages,
        }
    }

    /// Push one value in at the head.
    pub fn deliver(&self, value: Option<T>) -> Continuation {
        self.entry.deliver(value)
    }

    /// Number of stages owned, including the terminal.
    pub fn stage_count(&self) -> usize {
        self._stages.len() + 1
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &(self._stages.len() + 1))
            .finish()
    }
}
