//! One-shot terminals.
//!
//! A [`Consumer`] owns one materialized pipeline and is the only way to push
//! values into it. It completes once an end-of-stream is pushed or reaches its
//! sink from inside the chain, or when its sink asks to stop, and reports
//! every later push as
//! [`StreamError::AlreadyComplete`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::continuation::{Continuation, ErrorContext, OperatorKind, Termination};
use crate::delivery::{Delivery, Pipeline, StageContext};
use crate::error::{StageError, StreamError};
use crate::trampoline::complete;

/// Wrap a fallible user sink as the last delivery of a pipeline.
///
/// The sink borrows its input so a failure can be reported as an
/// [`OperatorKind::Sink`] error carrying the `Option<T>` it was handed. The
/// context's downstream is the sink itself: resuming with a `T` retries the
/// sink and ending hands it the end-of-stream.
pub(crate) fn terminal<T, F>(sink: Arc<F>, ctx: StageContext) -> Delivery<T>
where
    T: Send + 'static,
    F: Fn(&Option<T>) -> Result<Termination, StageError> + Send + Sync + 'static,
{
    Delivery::new(move |value: Option<T>| {
        let sink = Arc::clone(&sink);
        let ctx = ctx.clone();
        Continuation::more(move || match sink(&value) {
            Ok(termination) => {
                seal(&ctx, value.is_none());
                Ok(termination.into())
            }
            Err(error) => {
                let retry = terminal(sink, ctx);
                Err(ErrorContext::new(OperatorKind::Sink, value, error, retry))
            }
        })
    })
}

/// Wrap an infallible sink that takes its input by value.
pub(crate) fn forward<T, F>(sink: Arc<F>, ctx: StageContext) -> Delivery<T>
where
    T: Send + 'static,
    F: Fn(Option<T>) -> Termination + Send + Sync + 'static,
{
    Delivery::new(move |value: Option<T>| {
        let sink = Arc::clone(&sink);
        let ctx = ctx.clone();
        Continuation::more(move || {
            let ended = value.is_none();
            let termination = sink(value);
            seal(&ctx, ended);
            Ok(termination.into())
        })
    })
}

/// Once the end-of-stream reached the sink nothing else may, whoever sent it.
fn seal(ctx: &StageContext, ended: bool) {
    if ended && !ctx.is_terminated() {
        ctx.terminate();
        tracing::debug!("terminal saw end-of-stream");
    }
}

struct ConsumerInner<T> {
    pipeline: Pipeline<T>,
    ctx: StageContext,
    ended: AtomicBool,
}

/// Push handle for a materialized pipeline.
///
/// Cloning is cheap and every clone drives the same pipeline.
pub struct Consumer<T> {
    inner: Arc<ConsumerInner<T>>,
}

impl<T: Send + 'static> Consumer<T> {
    pub(crate) fn new(pipeline: Pipeline<T>, ctx: StageContext) -> Self {
        Consumer {
            inner: Arc::new(ConsumerInner {
                pipeline,
                ctx,
                ended: AtomicBool::new(false),
            }),
        }
    }

    /// Drive one value (or the end-of-stream) through the pipeline.
    ///
    /// End-of-stream marks the consumer complete before any stage runs, so a
    /// push made from inside that same drive is already rejected.
    pub fn process(&self, value: Option<T>) -> Result<Termination, StreamError> {
        if self.is_complete() {
            return Err(StreamError::AlreadyComplete);
        }
        if value.is_none() && self.inner.ended.swap(true, Ordering::AcqRel) {
            return Err(StreamError::AlreadyComplete);
        }

        let ctx = &self.inner.ctx;
        let termination = complete(self.inner.pipeline.deliver(value), ctx.handler().as_ref());
        if termination.is_terminate() && !ctx.is_terminated() {
            ctx.terminate();
            tracing::debug!("consumer terminated by its sink");
        }
        Ok(termination)
    }

    /// Push one value.
    pub fn push(&self, value: T) -> Result<Termination, StreamError> {
        self.process(Some(value))
    }

    /// Push the end-of-stream.
    pub fn finish(&self) -> Result<Termination, StreamError> {
        self.process(None)
    }

    /// `true` once end-of-stream has been pushed or has reached the sink, or
    /// the sink returned `Terminate`.
    pub fn is_complete(&self) -> bool {
        self.inner.ended.load(Ordering::Acquire) || self.inner.ctx.is_terminated()
    }
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Consumer {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("ended", &self.inner.ended.load(Ordering::Acquire))
            .field("terminated", &self.inner.ctx.is_terminated())
            .field("pipeline", &self.inner.pipeline)
            .finish()
    }
}
