//! Push-side fan-out hubs.
//!
//! An [`Observable<T>`] owns a set of [`Consumer`]s, one per subscribed
//! listener chain, and broadcasts every produced value to all of them.
//!
//! # Design
//!
//! The subscriber map lives behind a `parking_lot::Mutex`. Fan-out clones the
//! current subscribers under the lock and drives each one with the lock
//! released, so a subscriber may subscribe, unsubscribe or produce into other
//! hubs from inside its own delivery, and dispatched stages may call back
//! from worker threads.
//!
//! # Failure Modes
//!
//! - **Failing subscriber**: a subscriber whose chain fails (with the default
//!   [`terminate_on_error`] handler) or whose sink returns `Terminate` is
//!   removed after that delivery. The other subscribers still see the value.
//! - **Nobody listening**: producing into a hub with no subscribers reports
//!   [`StreamError::NoSubscribers`] and the value is dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::chain::{Chain, Stages};
use crate::compose::Composer;
use crate::consumer::{Consumer, forward, terminal};
use crate::continuation::Termination;
use crate::delivery::{Delivery, StageContext};
use crate::error::{StageError, StreamError};
use crate::trampoline::{ErrorHandler, terminate_on_error};

/// Identifies one subscription across every hub in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SubscriptionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The type-independent half of a hub, reachable from a [`Subscription`].
trait Registry: Send + Sync {
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
    fn contains(&self, id: SubscriptionId) -> bool;
}

struct HubState<T> {
    subscribers: BTreeMap<SubscriptionId, Consumer<T>>,
    closed: bool,
}

struct Hub<T> {
    state: Mutex<HubState<T>>,
}

impl<T: Send + 'static> Registry for Hub<T> {
    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.state.lock().subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(subscription = id.get(), "unsubscribed");
        }
        removed
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        self.state.lock().subscribers.contains_key(&id)
    }
}

/// Handle for one listener attached to a hub.
///
/// Dropping the handle leaves the subscription in place; call
/// [`unsubscribe`](Subscription::unsubscribe) to detach it. The handle does
/// not keep the hub alive.
pub struct Subscription {
    id: SubscriptionId,
    hub: Weak<dyn Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Detach this subscription. Returns `false` if it had already ended or
    /// the hub is gone.
    pub fn unsubscribe(&self) -> bool {
        match self.hub.upgrade() {
            Some(hub) => hub.unsubscribe(self.id),
            None => false,
        }
    }

    /// `true` while the hub still holds this subscription.
    pub fn is_active(&self) -> bool {
        self.hub.upgrade().is_some_and(|hub| hub.contains(self.id))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("hub_alive", &(self.hub.strong_count() > 0))
            .finish()
    }
}

/// A broadcast point: every produced value goes to every subscriber.
///
/// Cloning an `Observable` creates a new handle to the same hub.
pub struct Observable<T> {
    hub: Arc<Hub<T>>,
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new() -> Self {
        Observable {
            hub: Arc::new(Hub {
                state: Mutex::new(HubState {
                    subscribers: BTreeMap::new(),
                    closed: false,
                }),
            }),
        }
    }

    /// Start a listener chain fed by this hub.
    pub fn listener(&self) -> Listener<T, T> {
        Listener {
            hub: self.clone(),
            stages: Stages::new(),
        }
    }

    /// Register an already materialized consumer.
    ///
    /// A consumer added after [`finish`](Observable::finish) is finished at
    /// once instead of being stored.
    pub fn add(&self, consumer: Consumer<T>) -> SubscriptionId {
        let id = SubscriptionId::next();
        let rejected = {
            let mut state = self.hub.state.lock();
            if state.closed {
                Some(consumer)
            } else {
                state.subscribers.insert(id, consumer);
                None
            }
        };
        match rejected {
            Some(consumer) => {
                tracing::debug!(subscription = id.get(), "subscribed to a finished hub");
                let _ = consumer.finish();
            }
            None => tracing::debug!(subscription = id.get(), "subscribed"),
        }
        id
    }

    /// Remove a subscriber. Returns `false` if it was not present.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    /// Broadcast one value, or finish the hub on `None`.
    ///
    /// Subscribers are visited in subscription order. Finishing hands the
    /// end-of-stream to every subscriber and leaves the hub empty and closed;
    /// finishing a hub nobody listens to is not an error.
    pub fn process(&self, value: Option<T>) -> Result<(), StreamError> {
        match value {
            Some(value) => self.broadcast(value),
            None => {
                let subscribers = {
                    let mut state = self.hub.state.lock();
                    if state.closed {
                        return Err(StreamError::Closed);
                    }
                    state.closed = true;
                    std::mem::take(&mut state.subscribers)
                };
                tracing::debug!(subscribers = subscribers.len(), "hub finished");
                for consumer in subscribers.into_values() {
                    let _ = consumer.finish();
                }
                Ok(())
            }
        }
    }

    fn broadcast(&self, value: T) -> Result<(), StreamError> {
        let snapshot: Vec<(SubscriptionId, Consumer<T>)> = {
            let state = self.hub.state.lock();
            if state.closed {
                return Err(StreamError::Closed);
            }
            if state.subscribers.is_empty() {
                return Err(StreamError::NoSubscribers);
            }
            state
                .subscribers
                .iter()
                .map(|(id, consumer)| (*id, consumer.clone()))
                .collect()
        };

        let mut ended = Vec::new();
        for (id, consumer) in snapshot {
            match consumer.push(value.clone()) {
                Ok(Termination::CanContinue) if !consumer.is_complete() => {}
                _ => ended.push(id),
            }
        }
        if !ended.is_empty() {
            let mut state = self.hub.state.lock();
            for id in ended {
                if state.subscribers.remove(&id).is_some() {
                    tracing::debug!(subscription = id.get(), "subscriber ended; removed");
                }
            }
        }
        Ok(())
    }

    /// Broadcast one value.
    pub fn produce(&self, value: T) -> Result<(), StreamError> {
        self.process(Some(value))
    }

    /// Finish every subscriber and close the hub.
    pub fn finish(&self) -> Result<(), StreamError> {
        self.process(None)
    }

    pub fn has_subscribers(&self) -> bool {
        !self.hub.state.lock().subscribers.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.state.lock().subscribers.len()
    }

    /// `true` once the hub has been finished.
    pub fn is_terminated(&self) -> bool {
        self.hub.state.lock().closed
    }

    fn subscription(&self, id: SubscriptionId) -> Subscription {
        let hub: Arc<dyn Registry> = self.hub.clone();
        Subscription {
            id,
            hub: Arc::downgrade(&hub),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.hub.state.lock();
        f.debug_struct("Observable")
            .field("subscribers", &state.subscribers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// A recorded chain of operators fed by an [`Observable`].
///
/// Like a [`Sequence`](crate::Sequence), but its terminal subscribes to the
/// hub instead of returning a push handle. Each `listen` materializes an
/// independent pipeline.
pub struct Listener<S, T> {
    hub: Observable<S>,
    stages: Stages<S, T>,
}

impl<S: Clone + Send + 'static, T: Send + 'static> Listener<S, T> {
    /// Subscribe `sink` to the hub through this chain.
    ///
    /// The sink borrows each value so that a failing sink can hand it to the
    /// error handler. A failure nobody handles ends this subscription only;
    /// see [`terminate_on_error`].
    pub fn listen<F>(&self, sink: F) -> Subscription
    where
        F: Fn(&Option<T>) -> Result<Termination, StageError> + Send + Sync + 'static,
    {
        self.listen_with(terminate_on_error(), sink)
    }

    /// [`listen`](Listener::listen) with a custom error handler.
    pub fn listen_with<F>(&self, handler: ErrorHandler, sink: F) -> Subscription
    where
        F: Fn(&Option<T>) -> Result<Termination, StageError> + Send + Sync + 'static,
    {
        let ctx = StageContext::new(handler);
        let entry = terminal(Arc::new(sink), ctx.clone());
        self.subscribe(entry, ctx)
    }

    /// Subscribe a sink that never asks to stop.
    pub fn for_each<F>(&self, f: F) -> Subscription
    where
        F: Fn(Option<T>) + Send + Sync + 'static,
    {
        self.forward_with(terminate_on_error(), move |value| {
            f(value);
            Termination::CanContinue
        })
    }

    /// Subscribe an infallible sink that takes each value by move.
    pub(crate) fn forward_with<F>(&self, handler: ErrorHandler, sink: F) -> Subscription
    where
        F: Fn(Option<T>) -> Termination + Send + Sync + 'static,
    {
        let ctx = StageContext::new(handler);
        let entry = forward(Arc::new(sink), ctx.clone());
        self.subscribe(entry, ctx)
    }

    fn subscribe(&self, entry: Delivery<T>, ctx: StageContext) -> Subscription {
        let pipeline = self.stages.materialize(entry, &ctx);
        let id = self.hub.add(Consumer::new(pipeline, ctx));
        self.hub.subscription(id)
    }

    /// The hub this chain is fed by.
    pub fn source(&self) -> &Observable<S> {
        &self.hub
    }
}

impl<S: Clone + Send + 'static, T: Clone + Send + 'static> Listener<S, T> {
    /// Re-broadcast this chain's output through a new hub.
    ///
    /// The new hub finishes when this chain sees end-of-stream. Values
    /// produced while the new hub has no subscribers are dropped.
    pub fn observe(&self) -> Observable<T> {
        let out = Observable::new();
        let relay = out.clone();
        self.forward_with(terminate_on_error(), move |value| match relay.process(value) {
            Ok(()) | Err(StreamError::NoSubscribers) => Termination::CanContinue,
            Err(_) => Termination::Terminate,
        });
        out
    }
}

impl<S: Clone + Send + 'static, T: Send + 'static> Chain for Listener<S, T> {
    type Input = S;
    type Output = T;
    type Then<U: Send + 'static> = Listener<S, U>;

    fn then<U: Send + 'static>(self, composer: Composer<T, U>) -> Listener<S, U> {
        Listener {
            hub: self.hub,
            stages: self.stages.push(composer),
        }
    }
}

impl<S, T> Clone for Listener<S, T> {
    fn clone(&self) -> Self {
        Listener {
            hub: self.hub.clone(),
            stages: self.stages.clone(),
        }
    }
}

impl<S, T> fmt::Debug for Listener<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("hub", &self.hub)
            .field("stages", &self.stages)
            .finish()
    }
}
