//! Resumable steps and the values the trampoline drives.
//!
//! A [`Continuation`] is one of four things: more work to run, a captured
//! failure, two continuations to run in order, or a finished drive. Every
//! delivery in a pipeline returns one, and nothing in this crate calls the next
//! stage directly; the [trampoline](crate::trampoline) does that.
//!
//! # Examples
//!
//! ```rust
//! use contseq::{Continuation, Termination, complete, swallow_errors};
//!
//! let step = Continuation::after_then(
//!     Continuation::more(|| Ok(Continuation::done())),
//!     Continuation::terminate(),
//! );
//! assert_eq!(complete(step, swallow_errors().as_ref()), Termination::Terminate);
//! ```

use std::any::Any;
use std::fmt;

use crate::delivery::Delivery;
use crate::error::StageError;

/// Outcome of a finished drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Termination {
    /// The consumer accepts more input.
    #[default]
    CanContinue,
    /// The consumer asked to stop receiving input.
    Terminate,
}

impl Termination {
    /// Returns `true` for [`Termination::Terminate`].
    #[inline]
    pub const fn is_terminate(self) -> bool {
        matches!(self, Termination::Terminate)
    }
}

/// One step of work returned by a `More` continuation.
pub type Step = Box<dyn FnOnce() -> Result<Continuation, ErrorContext> + Send>;

/// A resumable unit of pipeline work.
///
/// Only `More` and `Error` produce further continuations. `AfterThen` always
/// splits into exactly two, run left first: the first half is drained
/// completely, including anything it nests, before the second half starts.
pub enum Continuation {
    /// Run the step to get the next continuation. A step fails by returning
    /// an [`ErrorContext`].
    More(Step),
    /// An operator failed and the error handler decides what happens next.
    Error(ErrorContext),
    /// Run the first continuation to completion, then the second.
    AfterThen(Box<Continuation>, Box<Continuation>),
    /// Nothing left to drive.
    Done(Termination),
}

impl Continuation {
    /// Wrap a step as `More`.
    #[inline]
    pub fn more<F>(step: F) -> Self
    where
        F: FnOnce() -> Result<Continuation, ErrorContext> + Send + 'static,
    {
        Continuation::More(Box::new(step))
    }

    /// Sequence `first` before `second`.
    #[inline]
    pub fn after_then(first: Continuation, second: Continuation) -> Self {
        Continuation::AfterThen(Box::new(first), Box::new(second))
    }

    /// `Done(CanContinue)`: nothing to drive, stream still open.
    #[inline]
    pub const fn done() -> Self {
        Continuation::Done(Termination::CanContinue)
    }

    /// `Done(Terminate)`: the consumer wants no more input.
    #[inline]
    pub const fn terminate() -> Self {
        Continuation::Done(Termination::Terminate)
    }

    /// Returns `true` if this is a `Done`.
    #[inline]
    pub const fn is_done(&self) -> bool {
        matches!(self, Continuation::Done(_))
    }
}

impl From<Termination> for Continuation {
    fn from(termination: Termination) -> Self {
        Continuation::Done(termination)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuation::More(_) => f.write_str("More(..)"),
            Continuation::Error(ctx) => f.debug_tuple("Error").field(ctx).finish(),
            Continuation::AfterThen(a, b) => f.debug_tuple("AfterThen").field(a).field(b).finish(),
            Continuation::Done(t) => f.debug_tuple("Done").field(t).finish(),
        }
    }
}

/// Which kind of operator produced an [`ErrorContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Map,
    CompactMap,
    Filter,
    FlatMap,
    Collect,
    /// The terminal delivery of a consumer or subscription.
    Sink,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperatorKind::Map => "map",
            OperatorKind::CompactMap => "compact_map",
            OperatorKind::Filter => "filter",
            OperatorKind::FlatMap => "flat_map",
            OperatorKind::Collect => "collect",
            OperatorKind::Sink => "sink",
        };
        f.write_str(name)
    }
}

/// Everything needed to resume after an operator failed.
///
/// Holds the failing operator's kind, the input that caused the failure, the
/// error itself and the delivery that would have received the operator's
/// output. A handler can [`resume`](ErrorContext::resume) with a substitute
/// output, [`end`](ErrorContext::end) the downstream, or
/// [`skip`](ErrorContext::skip) the value.
pub struct ErrorContext {
    op: OperatorKind,
    value: Box<dyn Any + Send>,
    value_type: &'static str,
    error: StageError,
    downstream: Box<dyn Any + Send>,
    end: fn(Box<dyn Any + Send>) -> Continuation,
}

impl ErrorContext {
    /// Capture a failure of `op` on `value`; `downstream` is the delivery the
    /// operator's output was headed for.
    pub fn new<T, U>(
        op: OperatorKind,
        value: T,
        error: impl Into<StageError>,
        downstream: Delivery<U>,
    ) -> Self
    where
        T: Send + 'static,
        U: Send + 'static,
    {
        ErrorContext {
            op,
            value: Box::new(value),
            value_type: std::any::type_name::<T>(),
            error: error.into(),
            downstream: Box::new(downstream),
            end: end_downstream::<U>,
        }
    }

    /// The operator that failed.
    #[inline]
    pub fn op(&self) -> OperatorKind {
        self.op
    }

    /// The offending input, if it is a `T`.
    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// The underlying failure.
    #[inline]
    pub fn error(&self) -> &StageError {
        &self.error
    }

    /// Deliver `value` downstream in place of the failed output.
    ///
    /// Hands the context back unchanged if `U` is not the type the downstream
    /// delivery accepts.
    pub fn resume<U: Send + 'static>(self, value: U) -> Result<Continuation, ErrorContext> {
        let ErrorContext {
            op,
            value: input,
            value_type,
            error,
            downstream,
            end,
        } = self;
        match downstream.downcast::<Delivery<U>>() {
            Ok(delivery) => Ok(delivery.deliver(Some(value))),
            Err(downstream) => Err(ErrorContext {
                op,
                value: input,
                value_type,
                error,
                downstream,
                end,
            }),
        }
    }

    /// Deliver end-of-stream downstream.
    pub fn end(self) -> Continuation {
        (self.end)(self.downstream)
    }

    /// Drop the failed value and keep the stream open.
    #[inline]
    pub fn skip(self) -> Continuation {
        Continuation::done()
    }
}

fn end_downstream<U: Send + 'static>(downstream: Box<dyn Any + Send>) -> Continuation {
    match downstream.downcast::<Delivery<U>>() {
        Ok(delivery) => delivery.deliver(None),
        Err(_) => Continuation::done(),
    }
}

impl fmt::Debug for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorContext")
            .field("op", &self.op)
            .field("value_type", &self.value_type)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed on {}: {}", self.op, self.value_type, self.error)
    }
}

impl std::error::Error for ErrorContext {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}
