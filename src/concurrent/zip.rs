use std::collections::VecDeque;

use crate::concurrent::Junction;
use crate::observable::Listener;

struct Pairs<A, B> {
    left: VecDeque<A>,
    right: VecDeque<B>,
}

impl<A, B> Pairs<A, B> {
    /// At most one side is non-empty between calls, so each arrival completes
    /// at most one pair.
    fn pop(&mut self) -> Option<(A, B)> {
        if self.left.is_empty() || self.right.is_empty() {
            return None;
        }
        let a = self.left.pop_front()?;
        let b = self.right.pop_front()?;
        Some((a, b))
    }
}

/// Pair the values of two chains strictly in arrival order.
///
/// A value waits in its source's queue until the other source produces its
/// partner. The output ends as soon as either source ends; values still
/// queued at that point are discarded.
///
/// ```rust
/// use contseq::prelude::*;
///
/// let letters = Observable::<char>::new();
/// let numbers = Observable::<u32>::new();
/// let pairs = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
/// let sink = std::sync::Arc::clone(&pairs);
/// zip(&letters.listener(), &numbers.listener()).for_each(move |p| sink.lock().push(p));
///
/// letters.produce('a').unwrap();
/// letters.produce('b').unwrap();
/// numbers.produce(1).unwrap();
/// numbers.finish().unwrap();
/// assert_eq!(*pairs.lock(), vec![Some(('a', 1)), None]);
/// ```
pub fn zip<SA, A, SB, B>(a: &Listener<SA, A>, b: &Listener<SB, B>) -> Listener<(A, B), (A, B)>
where
    SA: Clone + Send + 'static,
    SB: Clone + Send + 'static,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let junction = Junction::<_, (A, B)>::new(Pairs {
        left: VecDeque::new(),
        right: VecDeque::new(),
    });
    junction.attach(
        a,
        |pairs: &mut Pairs<A, B>, value| {
            pairs.left.push_back(value);
            pairs.pop()
        },
        |_| true,
    );
    junction.attach(
        b,
        |pairs: &mut Pairs<A, B>, value| {
            pairs.right.push_back(value);
            pairs.pop()
        },
        |_| true,
    );
    junction.output()
}

/// Values from three sources waiting for their partners.
struct Triples<A, B, C> {
    first: VecDeque<A>,
    second: VecDeque<B>,
    third: VecDeque<C>,
}

impl<A, B, C> Triples<A, B, C> {
    fn pop(&mut self) -> Option<(A, B, C)> {
        if self.first.is_empty() || self.second.is_empty() || self.third.is_empty() {
            return None;
        }
        Some((
            self.first.pop_front()?,
            self.second.pop_front()?,
            self.third.pop_front()?,
        ))
    }
}

/// [`zip`] over three chains.
///
/// All three sources feed one join, so the end of any of them detaches the
/// other two.
pub fn zip3<SA, A, SB, B, SC, C>(
    a: &Listener<SA, A>,
    b: &Listener<SB, B>,
    c: &Listener<SC, C>,
) -> Listener<(A, B, C), (A, B, C)>
where
    SA: Clone + Send + 'static,
    SB: Clone + Send + 'static,
    SC: Clone + Send + 'static,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
{
    let junction = Junction::<_, (A, B, C)>::new(Triples {
        first: VecDeque::new(),
        second: VecDeque::new(),
        third: VecDeque::new(),
    });
    junction.attach(
        a,
        |triples: &mut Triples<A, B, C>, value| {
            triples.first.push_back(value);
            triples.pop()
        },
        |_| true,
    );
    junction.attach(
        b,
        |triples: &mut Triples<A, B, C>, value| {
            triples.second.push_back(value);
            triples.pop()
        },
        |_| true,
    );
    junction.attach(
        c,
        |triples: &mut Triples<A, B, C>, value| {
            triples.third.push_back(value);
            triples.pop()
        },
        |_| true,
    );
    junction.output()
}

/// [`zip`] over any number of chains of the same type.
///
/// Emits one `Vec` holding a value from each source, in source order. With
/// no sources the output is finished immediately.
pub fn zip_all<S, T>(sources: &[Listener<S, T>]) -> Listener<Vec<T>, Vec<T>>
where
    S: Clone + Send + 'static,
    T: Clone + Send + 'static,
{
    let queues: Vec<VecDeque<T>> = sources.iter().map(|_| VecDeque::new()).collect();
    let junction = Junction::<_, Vec<T>>::new(queues);
    if sources.is_empty() {
        junction.close();
    }
    for (index, source) in sources.iter().enumerate() {
        junction.attach(
            source,
            move |queues: &mut Vec<VecDeque<T>>, value| {
                queues[index].push_back(value);
                if queues.iter().any(VecDeque::is_empty) {
                    return None;
                }
                queues.iter_mut().map(VecDeque::pop_front).collect()
            },
            |_| true,
        );
    }
    junction.output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::error::StreamError;
    use crate::observable::Observable;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log<T> = Arc<Mutex<Vec<Option<T>>>>;

    fn record<T: Clone + Send + 'static>(listener: &Listener<T, T>) -> Log<T> {
        let log: Log<T> = Arc::default();
        let sink = Arc::clone(&log);
        listener.for_each(move |v| sink.lock().push(v));
        log
    }

    #[test]
    fn test_zip_pairs_in_arrival_order() {
        let a = Observable::<u8>::new();
        let b = Observable::<&'static str>::new();
        let log = record(&zip(&a.listener(), &b.listener()));

        a.produce(1).unwrap();
        a.produce(2).unwrap();
        b.produce("x").unwrap();
        a.produce(3).unwrap();
        b.produce("y").unwrap();
        b.produce("z").unwrap();
        b.produce("w").unwrap();
        a.finish().unwrap();

        assert_eq!(
            *log.lock(),
            vec![Some((1, "x")), Some((2, "y")), Some((3, "z")), None]
        );
    }

    #[test]
    fn test_zip_end_detaches_other_source() {
        let a = Observable::<u8>::new();
        let b = Observable::<u8>::new();
        let out = zip(&a.listener(), &b.listener());
        let _log = record(&out);
        assert_eq!(b.subscriber_count(), 1);

        a.finish().unwrap();
        assert!(out.source().is_terminated());
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn test_zip3_flattens_triples() {
        let a = Observable::<u8>::new();
        let b = Observable::<char>::new();
        let c = Observable::<bool>::new();
        let log = record(&zip3(&a.listener(), &b.listener(), &c.listener()));

        a.produce(1).unwrap();
        b.produce('q').unwrap();
        c.produce(true).unwrap();
        c.finish().unwrap();

        assert_eq!(*log.lock(), vec![Some((1, 'q', true)), None]);
    }

    #[test]
    fn test_zip3_end_detaches_every_source() {
        let a = Observable::<u8>::new();
        let b = Observable::<u8>::new();
        let c = Observable::<u8>::new();
        let out = zip3(&a.listener(), &b.listener(), &c.listener());
        let log = record(&out);

        c.finish().unwrap();
        assert!(out.source().is_terminated());
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        assert_eq!(a.produce(1), Err(StreamError::NoSubscribers));
        assert_eq!(*log.lock(), vec![None]);
    }

    #[test]
    fn test_failing_source_ends_zip() {
        let a = Observable::<i32>::new();
        let b = Observable::<i32>::new();
        let checked = a
            .listener()
            .try_map(|x| if *x < 0 { Err("negative") } else { Ok(*x) });
        let out = zip(&checked, &b.listener());
        let log = record(&out);

        a.produce(1).unwrap();
        b.produce(10).unwrap();
        a.produce(-1).unwrap();

        assert!(out.source().is_terminated());
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        assert_eq!(*log.lock(), vec![Some((1, 10)), None]);
    }

    #[test]
    fn test_zip_all_waits_for_every_source() {
        let hubs: Vec<Observable<u32>> = (0..3).map(|_| Observable::new()).collect();
        let listeners: Vec<_> = hubs.iter().map(Observable::listener).collect();
        let log = record(&zip_all(&listeners));

        hubs[0].produce(1).unwrap();
        hubs[2].produce(3).unwrap();
        assert!(log.lock().is_empty());
        hubs[1].produce(2).unwrap();
        hubs[1].finish().unwrap();

        assert_eq!(*log.lock(), vec![Some(vec![1, 2, 3]), None]);
    }

    #[test]
    fn test_zip_all_of_nothing_is_finished() {
        let out = zip_all::<u8, u8>(&[]);
        assert!(out.source().is_terminated());
    }
}
