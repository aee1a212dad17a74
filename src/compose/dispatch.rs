use std::sync::Arc;

use crate::compose::Composer;
use crate::continuation::{Continuation, Termination};
use crate::delivery::Delivery;
use crate::queue::WorkQueue;
use crate::trampoline::complete;

/// Move the rest of the chain onto `queue`.
///
/// Each value (and the end-of-stream) becomes a job that drives the
/// downstream stages to completion on whatever thread the queue runs it. The
/// upstream drive returns `Done(CanContinue)` immediately, so it never sees a
/// downstream `Terminate`. Instead the job records it on the stage context,
/// and later jobs for the same materialization are dropped unrun.
///
/// Ordering between values is exactly the queue's ordering.
pub fn dispatch<T, Q>(queue: Q) -> Composer<T, T>
where
    T: Send + 'static,
    Q: WorkQueue + 'static,
{
    let queue = Arc::new(queue);
    Composer::new(move |down: Delivery<T>, ctx| {
        let queue = Arc::clone(&queue);
        let ctx = ctx.clone();
        Delivery::new(move |value: Option<T>| {
            if ctx.is_terminated() {
                return Continuation::terminate();
            }
            let down = down.clone();
            let ctx = ctx.clone();
            queue.enqueue(Box::new(move || {
                if ctx.is_terminated() {
                    tracing::trace!("dropping dispatched value after terminate");
                    return;
                }
                if complete(down.deliver(value), ctx.handler().as_ref()) == Termination::Terminate {
                    ctx.terminate();
                }
            }));
            Continuation::done()
        })
    })
}
