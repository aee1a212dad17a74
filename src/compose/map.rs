use std::sync::Arc;

use crate::compose::Composer;
use crate::continuation::{Continuation, ErrorContext, OperatorKind};
use crate::delivery::Delivery;
use crate::error::StageError;

/// The one shape behind map, compact_map and filter: each input yields zero
/// or one output, or fails and hands the input back for the error context.
fn zero_or_one<T, U, F>(op: OperatorKind, f: F) -> Composer<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Result<Option<U>, (T, StageError)> + Send + Sync + 'static,
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
                    Ok(Some(output)) => Ok(down.deliver(Some(output))),
                    Ok(None) => Ok(Continuation::done()),
                    Err((input, error)) => Err(ErrorContext::new(op, input, error, down)),
                },
            })
        })
    })
}

/// Transform every value one to one.
pub fn map<T, U, F>(f: F) -> Composer<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    zero_or_one(OperatorKind::Map, move |input| Ok(Some(f(input))))
}

/// Fallible [`map`]. A failure is reported with the input that caused it.
pub fn try_map<T, U, E, F>(f: F) -> Composer<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    E: Into<StageError>,
    F: Fn(&T) -> Result<U, E> + Send + Sync + 'static,
{
    zero_or_one(OperatorKind::Map, move |input| match f(&input) {
        Ok(output) => Ok(Some(output)),
        Err(error) => Err((input, error.into())),
    })
}

/// Transform every value, dropping those that map to `None`.
///
/// A dropped value is not end-of-stream; only an upstream `None` ends the
/// stream.
pub fn compact_map<T, U, F>(f: F) -> Composer<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
{
    zero_or_one(OperatorKind::CompactMap, move |input| Ok(f(input)))
}

/// Fallible [`compact_map`].
pub fn try_compact_map<T, U, E, F>(f: F) -> Composer<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
    E: Into<StageError>,
    F: Fn(&T) -> Result<Option<U>, E> + Send + Sync + 'static,
{
    zero_or_one(OperatorKind::CompactMap, move |input| {
        f(&input).map_err(|error| (input, error.into()))
    })
}

/// Keep the values matching `predicate`.
pub fn filter<T, P>(predicate: P) -> Composer<T, T>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    zero_or_one(OperatorKind::Filter, move |input| {
        Ok(predicate(&input).then_some(input))
    })
}

/// Fallible [`filter`].
pub fn try_filter<T, E, P>(predicate: P) -> Composer<T, T>
where
    T: Send + 'static,
    E: Into<StageError>,
    P: Fn(&T) -> Result<bool, E> + Send + Sync + 'static,
{
    zero_or_one(OperatorKind::Filter, move |input| match predicate(&input) {
        Ok(keep) => Ok(keep.then_some(input)),
        Err(error) => Err((input, error.into())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::testing::{run, run_default};
    use crate::trampoline::handler;

    #[test]
    fn test_map_passes_end_through() {
        let seen = run_default(&map(|x: i32| x * 10), vec![Some(1), Some(2), None]);
        assert_eq!(seen, vec![Some(10), Some(20), None]);
    }

    #[test]
    fn test_compact_map_drops_none_results() {
        let parse = compact_map(|s: &'static str| s.parse::<u8>().ok());
        let seen = run_default(&parse, vec![Some("1"), Some("x"), Some("3"), None]);
        assert_eq!(seen, vec![Some(1), Some(3), None]);
    }

    #[test]
    fn test_filter_keeps_matches() {
        let seen = run_default(
            &filter(|x: &u32| x % 2 == 0),
            vec![Some(1), Some(2), Some(3), Some(4), None],
        );
        assert_eq!(seen, vec![Some(2), Some(4), None]);
    }

    #[test]
    fn test_try_map_failure_is_swallowed_by_default() {
        let checked = try_map(|x: &i32| if *x == 5 { Err("five") } else { Ok(*x) });
        let seen = run_default(&checked, vec![Some(4), Some(5), Some(6), None]);
        assert_eq!(seen, vec![Some(4), Some(6), None]);
    }

    #[test]
    fn test_try_map_failure_can_resume_with_substitute() {
        let checked = try_map(|x: &i32| if *x == 5 { Err("five") } else { Ok(*x) });
        let resume = handler(|ctx| {
            assert_eq!(ctx.op(), OperatorKind::Map);
            assert_eq!(ctx.value::<i32>(), Some(&5));
            ctx.resume(0_i32).unwrap_or_else(ErrorContext::skip)
        });
        let seen = run(&checked, resume, vec![Some(5), None]);
        assert_eq!(seen, vec![Some(0), None]);
    }

    #[test]
    fn test_try_filter_reports_filter_kind() {
        let checked = try_filter(|x: &i32| if *x < 0 { Err("negative") } else { Ok(*x > 1) });
        let ops = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let record = {
            let ops = Arc::clone(&ops);
            handler(move |ctx| {
                ops.lock().push(ctx.op());
                ctx.skip()
            })
        };
        let seen = run(&checked, record, vec![Some(-1), Some(1), Some(2), None]);
        assert_eq!(seen, vec![Some(2), None]);
        assert_eq!(*ops.lock(), vec![OperatorKind::Filter]);
    }

    #[test]
    fn test_try_compact_map_end_via_handler() {
        let checked = try_compact_map(|x: &i32| if *x == 0 { Err("zero") } else { Ok(Some(*x)) });
        let stop = handler(ErrorContext::end);
        let seen = run(&checked, stop, vec![Some(1), Some(0)]);
        assert_eq!(seen, vec![Some(1), None]);
    }
}
