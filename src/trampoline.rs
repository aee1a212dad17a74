//! Driving continuations to completion.
//!
//! [`complete`] runs a [`Continuation`] until it is `Done`, keeping nested
//! `AfterThen` branches on a heap stack rather than the call stack. However
//! long the chain, and however many values a stage expands into, the native
//! stack stays the same depth.
//!
//! Failures reach the loop as `Error` continuations and are passed to an
//! [`ErrorHandler`]. Two handlers ship with the crate:
//!
//! - [`swallow_errors`]: drop the failed value and keep going. This is the
//!   default for [`Consumer`](crate::Consumer)s, so an unhandled failure
//!   silently loses exactly one value.
//! - [`terminate_on_error`]: stop the consumer. This is the default for
//!   [`Observable`](crate::Observable) subscriptions, so a failing subscriber
//!   is unsubscribed without disturbing the others.

use std::sync::Arc;

use crate::continuation::{Continuation, ErrorContext, Termination};

/// Decides how to continue after an operator failed.
pub type ErrorHandler = Arc<dyn Fn(ErrorContext) -> Continuation + Send + Sync>;

/// Drive `continuation` until it is done.
///
/// `AfterThen(a, b)` pushes `b` and runs `a`; every `Done(CanContinue)` pops
/// the most recently pushed branch, so branches run left first and depth
/// first. The result of an error handler is driven by the same loop, so
/// branches queued before a failure still run afterwards.
///
/// `Done(Terminate)` ends the drive at once and discards queued branches:
/// they would all deliver into the consumer that just asked to stop.
///
/// ```rust
/// use contseq::{Continuation, Termination, complete, swallow_errors};
///
/// let nested = Continuation::after_then(
///     Continuation::after_then(Continuation::done(), Continuation::done()),
///     Continuation::more(|| Ok(Continuation::done())),
/// );
/// assert_eq!(complete(nested, swallow_errors().as_ref()), Termination::CanContinue);
/// ```
pub fn complete<H>(continuation: Continuation, handler: &H) -> Termination
where
    H: Fn(ErrorContext) -> Continuation + ?Sized,
{
    let mut pending: Vec<Continuation> = Vec::new();
    let mut current = continuation;
    let mut steps = 0_usize;

    loop {
        current = match current {
            Continuation::More(step) => {
                steps += 1;
                match step() {
                    Ok(next) => next,
                    Err(ctx) => Continuation::Error(ctx),
                }
            }
            Continuation::Error(ctx) => {
                tracing::trace!(op = %ctx.op(), "handing stage failure to error handler");
                handler(ctx)
            }
            Continuation::AfterThen(first, second) => {
                pending.push(*second);
                *first
            }
            Continuation::Done(Termination::Terminate) => {
                tracing::trace!(steps, discarded = pending.len(), "drive terminated");
                return Termination::Terminate;
            }
            Continuation::Done(Termination::CanContinue) => match pending.pop() {
                Some(next) => next,
                None => {
                    tracing::trace!(steps, "drive finished");
                    return Termination::CanContinue;
                }
            },
        };
    }
}

/// Handler that drops the failed value and keeps the stream open.
pub fn swallow_errors() -> ErrorHandler {
    Arc::new(|ctx: ErrorContext| {
        tracing::warn!(
            op = %ctx.op(),
            error = %ctx.error(),
            "dropping value after unhandled stage failure"
        );
        ctx.skip()
    })
}

/// Handler that ends the consumer on the first failure.
pub fn terminate_on_error() -> ErrorHandler {
    Arc::new(|ctx: ErrorContext| {
        tracing::debug!(op = %ctx.op(), error = %ctx.error(), "terminating after stage failure");
        Continuation::terminate()
    })
}

/// Build an [`ErrorHandler`] from a closure.
pub fn handler<F>(f: F) -> ErrorHandler
where
    F: Fn(ErrorContext) -> Continuation + Send + Sync + 'static,
{
    Arc::new(f)
}
