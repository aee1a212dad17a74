use std::sync::Arc;

use parking_lot::Mutex;

use crate::compose::Composer;
use crate::continuation::{Continuation, ErrorContext, OperatorKind};
use crate::delivery::Delivery;
use crate::error::StageError;

/// The user's fold, shared by every materialization.
struct Fold<A, C, P> {
    initial: A,
    combine: C,
    until: P,
}

impl<A: Clone, C, P> Fold<A, C, P> {
    /// Fold `input` into `state`; returns the finished batch when `until` is
    /// met, leaving `state` reset.
    fn absorb<T>(&self, state: &Mutex<A>, input: T) -> Result<Option<A>, (T, StageError)>
    where
        C: Fn(&mut A, T) -> Result<(), (T, StageError)>,
        P: Fn(&A) -> bool,
    {
        let mut state = state.lock();
        (self.combine)(&mut *state, input)?;
        if (self.until)(&*state) {
            Ok(Some(std::mem::replace(&mut *state, self.initial.clone())))
        } else {
            Ok(None)
        }
    }

    fn flush(&self, state: &Mutex<A>) -> A {
        std::mem::replace(&mut *state.lock(), self.initial.clone())
    }
}

fn accumulate<T, A, C, P>(initial: A, combine: C, until: P) -> Composer<T, A>
where
    T: Send + 'static,
    A: Clone + Send + Sync + 'static,
    C: Fn(&mut A, T) -> Result<(), (T, StageError)> + Send + Sync + 'static,
    P: Fn(&A) -> bool + Send + Sync + 'static,
{
    let fold = Arc::new(Fold {
        initial,
        combine,
        until,
    });
    Composer::new(move |down: Delivery<A>, _| {
        let fold = Arc::clone(&fold);
        let state = Arc::new(Mutex::new(fold.initial.clone()));
        Delivery::new(move |value: Option<T>| {
            let fold = Arc::clone(&fold);
            let state = Arc::clone(&state);
            let down = down.clone();
            Continuation::more(move || match value {
                None => {
                    let batch = fold.flush(&state);
                    let end = down.clone();
                    Ok(Continuation::after_then(
                        down.deliver(Some(batch)),
                        Continuation::more(move || Ok(end.deliver(None))),
                    ))
                }
                Some(input) => match fold.absorb(&state, input) {
                    Ok(Some(batch)) => Ok(down.deliver(Some(batch))),
                    Ok(None) => Ok(Continuation::done()),
                    Err((input, error)) => Err(ErrorContext::new(
                        OperatorKind::Collect,
                        input,
                        error,
                        down,
                    )),
                },
            })
        })
    })
}

/// Accumulate values and emit a batch whenever `until` holds.
///
/// `combine` folds each value into the state, then `until` sees the updated
/// state; when it returns `true` the state is emitted and reset to a clone of
/// `initial`. End-of-stream always flushes once more (even an untouched
/// `initial`) and then forwards the end.
///
/// ```rust
/// use contseq::prelude::*;
///
/// let batches = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
/// let sink = std::sync::Arc::clone(&batches);
/// let consumer = source::<u32>()
///     .collect(Vec::new(), |acc: &mut Vec<u32>, x| acc.push(x), |acc| acc.len() == 2)
///     .for_each(move |batch| sink.lock().extend(batch));
///
/// for x in 1..=3 {
///     consumer.push(x).unwrap();
/// }
/// consumer.finish().unwrap();
/// assert_eq!(*batches.lock(), vec![vec![1, 2], vec![3]]);
/// ```
pub fn collect<T, A, C, P>(initial: A, combine: C, until: P) -> Composer<T, A>
where
    T: Send + 'static,
    A: Clone + Send + Sync + 'static,
    C: Fn(&mut A, T) + Send + Sync + 'static,
    P: Fn(&A) -> bool + Send + Sync + 'static,
{
    accumulate(
        initial,
        move |state: &mut A, input: T| {
            combine(state, input);
            Ok(())
        },
        until,
    )
}

/// Fallible [`collect`]; `combine` sees the input by reference so a failure
/// can report it.
pub fn try_collect<T, A, E, C, P>(initial: A, combine: C, until: P) -> Composer<T, A>
where
    T: Send + 'static,
    A: Clone + Send + Sync + 'static,
    E: Into<StageError>,
    C: Fn(&mut A, &T) -> Result<(), E> + Send + Sync + 'static,
    P: Fn(&A) -> bool + Send + Sync + 'static,
{
    accumulate(
        initial,
        move |state: &mut A, input: T| {
            combine(state, &input).map_err(|error| (input, error.into()))
        },
        until,
    )
}

/// Fold the whole stream into one value, emitted at end-of-stream.
pub fn reduce<T, A, C>(initial: A, combine: C) -> Composer<T, A>
where
    T: Send + 'static,
    A: Clone + Send + Sync + 'static,
    C: Fn(&mut A, T) + Send + Sync + 'static,
{
    collect(initial, combine, |_: &A| false)
}
