//! Iterator extension methods.

use std::iter::Zip;

/// A variant of [`Iterator::zip`] that panics if the iterators have different lengths.
///
/// The anchor table and the network output tensors have to stay in lockstep (anchor
/// row *i* describes output row *i*), so silently truncating to the shorter iterator
/// would hide a broken contract. Use this instead of [`Iterator::zip`] whenever both
/// sides are required to have the same length.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let a = a.into_iter();
    let b = b.into_iter();
    assert_eq!(
        a.len(),
        b.len(),
        "`zip_exact` called on iterators with different lengths"
    );

    a.zip(b)
}
