//! The operator-chaining surface shared by sequences and listeners.
//!
//! A chain is an immutable list of [`Composer`]s from a head input type to
//! the current output type. Adding an operator records one more composer and
//! does no work; a terminal call later materializes the list into a
//! [`Pipeline`], tail first.
//!
//! ```rust
//! use contseq::prelude::*;
//!
//! let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
//! let sink = std::sync::Arc::clone(&seen);
//! let consumer = source::<i32>()
//!     .map(|x| x * 3)
//!     .filter(|x| x % 2 == 0)
//!     .for_each(move |x| sink.lock().push(x));
//!
//! for x in 1..=4 {
//!     consumer.push(x).unwrap();
//! }
//! consumer.finish().unwrap();
//! assert_eq!(*seen.lock(), vec![Some(6), Some(12), None]);
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::compose::{self, Composer};
use crate::delivery::{Delivery, Pipeline, StageContext};
use crate::error::StageError;
use crate::queue::WorkQueue;

/// Operators available on every chain.
///
/// Implementors supply [`then`](Chain::then); everything else is built on it.
pub trait Chain: Sized {
    /// What the head of the chain accepts.
    type Input: Send + 'static;
    /// What the last stage emits.
    type Output: Send + 'static;
    /// The same kind of chain with one more stage.
    type Then<U: Send + 'static>: Chain<Input = Self::Input, Output = U>;

    /// Append a stage.
    fn then<U: Send + 'static>(self, composer: Composer<Self::Output, U>) -> Self::Then<U>;

    /// See [`compose::map`].
    fn map<U, F>(self, f: F) -> Self::Then<U>
    where
        U: Send + 'static,
        F: Fn(Self::Output) -> U + Send + Sync + 'static,
    {
        self.then(compose::map(f))
    }

    /// See [`compose::try_map`].
    fn try_map<U, E, F>(self, f: F) -> Self::Then<U>
    where
        U: Send + 'static,
        E: Into<StageError>,
        F: Fn(&Self::Output) -> Result<U, E> + Send + Sync + 'static,
    {
        self.then(compose::try_map(f))
    }

    /// See [`compose::compact_map`].
    fn compact_map<U, F>(self, f: F) -> Self::Then<U>
    where
        U: Send + 'static,
        F: Fn(Self::Output) -> Option<U> + Send + Sync + 'static,
    {
        self.then(compose::compact_map(f))
    }

    /// See [`compose::try_compact_map`].
    fn try_compact_map<U, E, F>(self, f: F) -> Self::Then<U>
    where
        U: Send + 'static,
        E: Into<StageError>,
        F: Fn(&Self::Output) -> Result<Option<U>, E> + Send + Sync + 'static,
    {
        self.then(compose::try_compact_map(f))
    }

    /// See [`compose::filter`].
    fn filter<P>(self, predicate: P) -> Self::Then<Self::Output>
    where
        P: Fn(&Self::Output) -> bool + Send + Sync + 'static,
    {
        self.then(compose::filter(predicate))
    }

    /// See [`compose::try_filter`].
    fn try_filter<E, P>(self, predicate: P) -> Self::Then<Self::Output>
    where
        E: Into<StageError>,
        P: Fn(&Self::Output) -> Result<bool, E> + Send + Sync + 'static,
    {
        self.then(compose::try_filter(predicate))
    }

    /// See [`compose::flat_map`].
    fn flat_map<U, I, F>(self, f: F) -> Self::Then<U>
    where
        U: Send + 'static,
        I: IntoIterator<Item = U>,
        I::IntoIter: Send + 'static,
        F: Fn(Self::Output) -> I + Send + Sync + 'static,
    {
        self.then(compose::flat_map(f))
    }

    /// See [`compose::try_flat_map`].
    fn try_flat_map<U, I, E, F>(self, f: F) -> Self::Then<U>
    where
        U: Send + 'static,
        I: IntoIterator<Item = U>,
        I::IntoIter: Send + 'static,
        E: Into<StageError>,
        F: Fn(&Self::Output) -> Result<I, E> + Send + Sync + 'static,
    {
        self.then(compose::try_flat_map(f))
    }

    /// See [`compose::collect`].
    fn collect<A, C, P>(self, initial: A, combine: C, until: P) -> Self::Then<A>
    where
        A: Clone + Send + Sync + 'static,
        C: Fn(&mut A, Self::Output) + Send + Sync + 'static,
        P: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.then(compose::collect(initial, combine, until))
    }

    /// See [`compose::try_collect`].
    fn try_collect<A, E, C, P>(self, initial: A, combine: C, until: P) -> Self::Then<A>
    where
        A: Clone + Send + Sync + 'static,
        E: Into<StageError>,
        C: Fn(&mut A, &Self::Output) -> Result<(), E> + Send + Sync + 'static,
        P: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.then(compose::try_collect(initial, combine, until))
    }

    /// See [`compose::reduce`].
    fn reduce<A, C>(self, initial: A, combine: C) -> Self::Then<A>
    where
        A: Clone + Send + Sync + 'static,
        C: Fn(&mut A, Self::Output) + Send + Sync + 'static,
    {
        self.then(compose::reduce(initial, combine))
    }

    /// See [`compose::dispatch`].
    fn dispatch<Q>(self, queue: Q) -> Self::Then<Self::Output>
    where
        Q: WorkQueue + 'static,
    {
        self.then(compose::dispatch(queue))
    }
}

type Keep = Box<dyn Any + Send + Sync>;

/// Builds one stage: takes the boxed downstream `Delivery`, returns this
/// stage's boxed `Delivery`.
type Link = Arc<
    dyn Fn(Box<dyn Any + Send>, &StageContext, &mut Vec<Keep>) -> Box<dyn Any + Send>
        + Send
        + Sync,
>;

/// Type-erased composer list from `S` to `T`.
///
/// Stored flat so that neither building nor materializing a chain recurses
/// per stage.
pub(crate) struct Stages<S, T> {
    links: Vec<Link>,
    _types: PhantomData<fn(S) -> T>,
}

impl<S: Send + 'static> Stages<S, S> {
    pub(crate) fn new() -> Self {
        Stages {
            links: Vec::new(),
            _types: PhantomData,
        }
    }
}

impl<S: Send + 'static, T: Send + 'static> Stages<S, T> {
    pub(crate) fn push<U: Send + 'static>(self, composer: Composer<T, U>) -> Stages<S, U> {
        let mut links = self.links;
        links.push(Arc::new(move |down, ctx, keep| {
            let down = down
                .downcast::<Delivery<U>>()
                .expect("each stage receives the delivery of its own output type");
            let (down, strong) = (*down).into_linked();
            keep.extend(strong);
            Box::new(composer.compose(down, ctx))
        }));
        Stages {
            links,
            _types: PhantomData,
        }
    }

    /// Build every stage in front of `sink`, last stage first.
    pub(crate) fn materialize(&self, sink: Delivery<T>, ctx: &StageContext) -> Pipeline<S> {
        let mut keep: Vec<Keep> = Vec::with_capacity(self.links.len());
        let mut current: Box<dyn Any + Send> = Box::new(sink);
        for link in self.links.iter().rev() {
            current = link(current, ctx, &mut keep);
        }
        let entry = current
            .downcast::<Delivery<S>>()
            .expect("the first stage accepts the chain's input type");
        Pipeline::new(*entry, keep)
    }

    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }
}

impl<S, T> Clone for Stages<S, T> {
    fn clone(&self) -> Self {
        Stages {
            links: self.links.clone(),
            _types: PhantomData,
        }
    }
}

impl<S, T> fmt::Debug for Stages<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stages")
            .field("len", &self.links.len())
            .finish()
    }
}
