use std::sync::Arc;

use crate::compose::Composer;
use crate::continuation::{Continuation, ErrorContext, OperatorKind};
use crate::delivery::Delivery;
use crate::error::StageError;

/// Emit the rest of `items` one `AfterThen` at a time.
///
/// Each element is paired with a `More` that resumes the iterator, so the
/// trampoline's pending stack never holds more than one entry for this
/// expansion however long it is.
fn drain<I, U>(mut items: I, down: Delivery<U>) -> Continuation
where
    I: Iterator<Item = U> + Send + 'static,
    U: Send + 'static,
{
    match items.next() {
        None => Continuation::done(),
        Some(item) => {
            let emitted = down.deliver(Some(item));
            Continuation::after_then(
                emitted,
                Continuation::more(move || Ok(drain(items, down))),
            )
        }
    }
}

fn expand<T, U, I, F>(f: F) -> Composer<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    I: IntoIterator<Item = U>,
    I::IntoIter: Send + 'static,
    F: Fn(T) -> Result<I, (T, StageError)> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Composer::new(move |down: Delivery<U>, _| {
        let f = Arc::clone(&f);
        Delivery::new(move |value: Option<T>| {
            let f = Arc::clone(&f);
            let down = down.clone();
            Continuation::more(move || match value {
                None => Ok(down.deliver(None)),
                Some(input) => match f(input) {
                    Ok(items) => Ok(drain(items.into_iter(), down)),
                    Err((input, error)) => {
                        Err(ErrorContext::new(OperatorKind::FlatMap, input, error, down))
                    }
                },
            })
        })
    })
}

/// Expand every value into zero or more values.
///
/// The expansion is drained completely, in order, before the next upstream
/// value is accepted. Upstream end-of-stream is forwarded once.
pub fn flat_map<T, U, I, F>(f: F) -> Composer<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    I: IntoIterator<Item = U>,
    I::IntoIter: Send + 'static,
    F: Fn(T) -> I + Send + Sync + 'static,
{
    expand(move |input| Ok(f(input)))
}

/// Fallible [`flat_map`]. Only building the expansion can fail.
pub fn try_flat_map<T, U, I, E, F>(f: F) -> Composer<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    I: IntoIterator<Item = U>,
    I::IntoIter: Send + 'static,
    E: Into<StageError>,
    F: Fn(&T) -> Result<I, E> + Send + Sync + 'static,
{
    expand(move |input| f(&input).map_err(|error| (input, error.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::testing::{recorder, run_default};
    use crate::continuation::Termination;
    use crate::delivery::StageContext;
    use crate::trampoline::{complete, swallow_errors};

    #[test]
    fn test_flat_map_expands_in_order() {
        let repeat = flat_map(|n: usize| std::iter::repeat_n(n, n));
        let seen = run_default(&repeat, vec![Some(1), Some(0), Some(3), None]);
        assert_eq!(seen, vec![Some(1), Some(3), Some(3), Some(3), None]);
    }

    #[test]
    fn test_flat_map_end_is_forwarded_once() {
        let pair = flat_map(|n: u8| [n, n]);
        let seen = run_default(&pair, vec![None]);
        assert_eq!(seen, vec![None]);
    }

    #[test]
    fn test_large_expansion_keeps_stack_flat() {
        let many = flat_map(|n: u32| 0..n);
        let seen = run_default(&many, vec![Some(250_000), None]);
        assert_eq!(seen.len(), 250_001);
        assert_eq!(seen[249_999], Some(249_999));
    }

    #[test]
    fn test_terminate_stops_expansion() {
        let (sink, log) = recorder::<u32>();
        let ctx = StageContext::new(swallow_errors());
        let stop_at_two = Delivery::new(move |value: Option<u32>| {
            let stop = value == Some(2);
            sink.deliver(value);
            if stop {
                Continuation::terminate()
            } else {
                Continuation::done()
            }
        });
        let stage = flat_map(|n: u32| 0..n).compose(stop_at_two, &ctx);

        let termination = complete(stage.deliver(Some(10)), ctx.handler().as_ref());
        assert_eq!(termination, Termination::Terminate);
        assert_eq!(*log.lock(), vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_try_flat_map_failure_skips_value() {
        let split = try_flat_map(|s: &String| {
            if s.is_empty() {
                Err("empty")
            } else {
                Ok(s.chars().collect::<Vec<_>>())
            }
        });
        let seen = run_default(
            &split,
            vec![Some("ab".to_string()), Some(String::new()), Some("c".to_string()), None],
        );
        assert_eq!(seen, vec![Some('a'), Some('b'), Some('c'), None]);
    }
}
