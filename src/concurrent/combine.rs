use crate::concurrent::Junction;
use crate::observable::Listener;

/// Latest value from each of two sources.
struct Latest<A, B> {
    left: Option<A>,
    right: Option<B>,
}

impl<A: Clone, B: Clone> Latest<A, B> {
    fn snapshot(&self) -> Option<(A, B)> {
        Some((self.left.clone()?, self.right.clone()?))
    }
}

/// Emit the latest value of each chain whenever either one updates.
///
/// Nothing is emitted until both sources have produced at least once. The
/// output ends as soon as either source ends.
pub fn combine<SA, A, SB, B>(a: &Listener<SA, A>, b: &Listener<SB, B>) -> Listener<(A, B), (A, B)>
where
    SA: Clone + Send + 'static,
    SB: Clone + Send + 'static,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let junction = Junction::<_, (A, B)>::new(Latest {
        left: None,
        right: None,
    });
    junction.attach(
        a,
        |latest: &mut Latest<A, B>, value| {
            latest.left = Some(value);
            latest.snapshot()
        },
        |_| true,
    );
    junction.attach(
        b,
        |latest: &mut Latest<A, B>, value| {
            latest.right = Some(value);
            latest.snapshot()
        },
        |_| true,
    );
    junction.output()
}

/// Latest value from each of three sources.
struct Latest3<A, B, C> {
    first: Option<A>,
    second: Option<B>,
    third: Option<C>,
}

impl<A: Clone, B: Clone, C: Clone> Latest3<A, B, C> {
    fn snapshot(&self) -> Option<(A, B, C)> {
        Some((
            self.first.clone()?,
            self.second.clone()?,
            self.third.clone()?,
        ))
    }
}

/// [`combine`] over three chains.
///
/// All three sources feed one join, so the end of any of them detaches the
/// other two.
pub fn combine3<SA, A, SB, B, SC, C>(
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
    let junction = Junction::<_, (A, B, C)>::new(Latest3 {
        first: None,
        second: None,
        third: None,
    });
    junction.attach(
        a,
        |latest: &mut Latest3<A, B, C>, value| {
            latest.first = Some(value);
            latest.snapshot()
        },
        |_| true,
    );
    junction.attach(
        b,
        |latest: &mut Latest3<A, B, C>, value| {
            latest.second = Some(value);
            latest.snapshot()
        },
        |_| true,
    );
    junction.attach(
        c,
        |latest: &mut Latest3<A, B, C>, value| {
            latest.third = Some(value);
            latest.snapshot()
        },
        |_| true,
    );
    junction.output()
}

/// [`combine`] over any number of chains of the same type.
///
/// Emits a `Vec` of the latest values, in source order. With no sources the
/// output is finished immediately.
pub fn combine_all<S, T>(sources: &[Listener<S, T>]) -> Listener<Vec<T>, Vec<T>>
where
    S: Clone + Send + 'static,
    T: Clone + Send + 'static,
{
    let latest: Vec<Option<T>> = vec![None; sources.len()];
    let junction = Junction::<_, Vec<T>>::new(latest);
    if sources.is_empty() {
        junction.close();
    }
    for (index, source) in sources.iter().enumerate() {
        junction.attach(
            source,
            move |latest: &mut Vec<Option<T>>, value| {
                latest[index] = Some(value);
                latest.iter().cloned().collect()
            },
            |_| true,
        );
    }
    junction.output()
}
