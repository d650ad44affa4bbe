//! Set type used for hash and path membership checks.
//!
//! Switches between gxhash and the std hasher based on the `gxhash` feature,
//! so the crate still builds on CPUs without AES-NI/SSE2 intrinsics. Only
//! membership is ever queried, never iteration order, so the choice of
//! hasher cannot leak into digests or diff output.

#[cfg(feature = "gxhash")]
pub use gxhash::{HashSet as GxHashSet, HashSetExt};

#[cfg(not(feature = "gxhash"))]
use std::collections::HashSet as StdHashSet;

/// HashSet that uses gxhash when available, std otherwise
#[cfg(feature = "gxhash")]
pub type HashSet<T> = GxHashSet<T>;

/// HashSet that uses gxhash when available, std otherwise
#[cfg(not(feature = "gxhash"))]
pub type HashSet<T> = StdHashSet<T>;

/// Capacity constructor mirroring the gxhash extension trait
#[cfg(not(feature = "gxhash"))]
pub trait HashSetExt {
    /// Creates a new HashSet with specified capacity
    fn with_capacity(capacity: usize) -> Self;
}

#[cfg(not(feature = "gxhash"))]
impl<T> HashSetExt for StdHashSet<T> {
    fn with_capacity(capacity: usize) -> Self {
        StdHashSet::with_capacity(capacity)
    }
}

/// Collect borrowed digests or paths into a membership set
pub fn str_set<'a, I>(items: I) -> HashSet<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let iter = items.into_iter();
    let mut set = <HashSet<&'a str> as HashSetExt>::with_capacity(iter.size_hint().0);
    set.extend(iter);
    set
}
