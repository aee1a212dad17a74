use either::Either;

use crate::chain::Chain;
use crate::concurrent::Junction;
use crate::observable::Listener;

/// Merge two chains, tagging each value with the side it came from.
///
/// A value from `a` is emitted as `(Some(a), None)` and a value from `b` as
/// `(None, Some(b))`; nothing is buffered. The output ends once both
/// sources have ended.
pub fn select<SA, A, SB, B>(
    a: &Listener<SA, A>,
    b: &Listener<SB, B>,
) -> Listener<(Option<A>, Option<B>), (Option<A>, Option<B>)>
where
    SA: Clone + Send + 'static,
    SB: Clone + Send + 'static,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let junction = Junction::<_, (Option<A>, Option<B>)>::new(2_usize);
    let tag = |_: &mut usize, value: Either<A, B>| {
        Some(value.either(|a| (Some(a), None), |b| (None, Some(b))))
    };
    let end = |open: &mut usize| {
        *open -= 1;
        *open == 0
    };
    junction.attach(&a.clone().map(Either::<A, B>::Left), tag, end);
    junction.attach(&b.clone().map(Either::<A, B>::Right), tag, end);
    junction.output()
}

/// [`select`] over three chains.
pub fn select3<SA, A, SB, B, SC, C>(
    a: &Listener<SA, A>,
    b: &Listener<SB, B>,
    c: &Listener<SC, C>,
) -> Listener<(Option<A>, Option<B>, Option<C>), (Option<A>, Option<B>, Option<C>)>
where
    SA: Clone + Send + 'static,
    SB: Clone + Send + 'static,
    SC: Clone + Send + 'static,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
{
    select(&select(a, b), c)
        .map(|(ab, c)| match ab {
            Some((a, b)) => (a, b, None),
            None => (None, None, c),
        })
        .observe()
        .listener()
}
