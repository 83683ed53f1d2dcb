//! [Nearest neighbor search](https://en.wikipedia.org/wiki/Nearest_neighbor_search) interfaces.

use crate::distance::Distance;
use crate::error::{Error, Result};
use crate::util::Ordered;

use num_traits::zero;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::{self, Debug, Display, Formatter};

/// One result of a nearest neighbor query: a stored point and its distance from the target.
///
/// The target itself is not recorded.
#[derive(Debug, PartialEq)]
pub struct Entry<'a, T, D> {
    /// The stored point.
    pub point: &'a T,
    /// Its distance from the query point.
    pub distance: D,
}

impl<'a, T, D> Entry<'a, T, D> {
    /// Create a new Entry.
    pub fn new(point: &'a T, distance: D) -> Self {
        Self { point, distance }
    }
}

// Can't derive(Clone, Copy) without requiring T: Copy
impl<T, D: Clone> Clone for Entry<'_, T, D> {
    fn clone(&self) -> Self {
        Self::new(self.point, self.distance.clone())
    }
}

impl<T, D: Copy> Copy for Entry<'_, T, D> {}

impl<T: Display, D: Display> Display for Entry<'_, T, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} at distance {}", self.point, self.distance)
    }
}

/// Sort query results by ascending distance.
///
/// Ties keep no particular order.
///
/// # Panics
///
/// If two distances are unordered (e.g. NaN).
pub fn sort_by_distance<T, D: PartialOrd + Copy>(entries: &mut [Entry<'_, T, D>]) {
    entries.sort_unstable_by_key(|e| Ordered::new(e.distance));
}

/// A candidate held by a [Neighborhood], ordered by distance alone.
struct Candidate<'a, T, D> {
    distance: Ordered<D>,
    point: &'a T,
}

impl<T, D: PartialOrd> PartialEq for Candidate<'_, T, D> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl<T, D: PartialOrd> Eq for Candidate<'_, T, D> {}

impl<T, D: PartialOrd> PartialOrd for Candidate<'_, T, D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, D: PartialOrd> Ord for Candidate<'_, T, D> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.cmp(&other.distance)
    }
}

impl<'a, T, D> From<Candidate<'a, T, D>> for Entry<'a, T, D> {
    fn from(candidate: Candidate<'a, T, D>) -> Self {
        Entry::new(candidate.point, candidate.distance.into_inner())
    }
}

/// Check that a search radius is usable.
pub(crate) fn check_radius<D: Distance>(radius: D) -> Result<D> {
    match radius.partial_cmp(&zero()) {
        Some(Ordering::Greater | Ordering::Equal) => Ok(radius),
        _ => Err(Error::InvalidRadius),
    }
}

/// Accumulates the results of a nearest neighbor search.
///
/// A neighborhood holds at most `k` candidates in a max-heap keyed on distance, so the worst
/// accepted candidate is always at hand.  Once it is full, its radius shrinks to that candidate's
/// distance, which lets the indexes prune any subtree that can't contain anything closer.
pub struct Neighborhood<'a, T, D, F> {
    /// The maximum number of candidates.
    k: usize,
    /// The current search radius, if any.
    radius: Option<D>,
    /// Candidates must also satisfy this predicate.
    filter: F,
    /// The accepted candidates, farthest on top.
    heap: BinaryHeap<Candidate<'a, T, D>>,
}

/// The predicate type of unfiltered searches.
pub type AcceptAll<T> = fn(&T) -> bool;

fn accept_all<T>(_: &T) -> bool {
    true
}

impl<'a, T, D: Distance> Neighborhood<'a, T, D, AcceptAll<T>> {
    /// Create a neighborhood for the `k` nearest neighbors, with no radius or filter.
    pub fn unbounded(k: usize) -> Self {
        Self {
            k,
            radius: None,
            filter: accept_all::<T>,
            heap: BinaryHeap::new(),
        }
    }
}

impl<'a, T, D, F> Neighborhood<'a, T, D, F>
where
    D: Distance,
    F: FnMut(&T) -> bool,
{
    /// Create a neighborhood for the `k` nearest neighbors.
    ///
    /// Only points within `radius` of the target (if given) and accepted by `filter` are kept.
    /// A negative or NaN radius is an [Error::InvalidRadius].
    pub fn new(k: usize, radius: Option<D>, filter: F) -> Result<Self> {
        let radius = radius.map(check_radius).transpose()?;

        Ok(Self {
            k,
            radius,
            filter,
            heap: BinaryHeap::new(),
        })
    }

    /// The maximum number of neighbors to collect.
    pub fn k(&self) -> usize {
        self.k
    }

    /// The current search radius.  `None` means unbounded.
    pub fn radius(&self) -> Option<D> {
        self.radius
    }

    /// Check whether a point at the given distance (or a lower bound on it) could be accepted.
    pub fn contains(&self, distance: D) -> bool {
        self.k > 0 && self.radius.map_or(true, |r| distance <= r)
    }

    /// Offer a point at the given distance from the target.
    ///
    /// Returns whether the point was accepted, though it may later be evicted by a closer one.
    pub fn consider(&mut self, point: &'a T, distance: D) -> bool {
        if !self.contains(distance) || !(self.filter)(point) {
            return false;
        }

        self.heap.push(Candidate {
            distance: Ordered::new(distance),
            point,
        });
        if self.heap.len() > self.k {
            self.heap.pop();
        }
        if self.heap.len() == self.k {
            self.radius = self.heap.peek().map(|c| c.distance.into_inner());
        }

        true
    }

    /// The number of candidates currently held.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check whether any candidate has been accepted.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The collected neighbors, in no particular order.
    pub fn into_entries(self) -> Vec<Entry<'a, T, D>> {
        self.heap.into_vec().into_iter().map(Entry::from).collect()
    }

    /// The collected neighbors, nearest first.
    pub fn into_sorted(self) -> Vec<Entry<'a, T, D>> {
        self.heap.into_sorted_vec().into_iter().map(Entry::from).collect()
    }
}

impl<T, D: Debug, F> Debug for Neighborhood<'_, T, D, F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neighborhood")
            .field("k", &self.k)
            .field("radius", &self.radius)
            .field("len", &self.heap.len())
            .finish_non_exhaustive()
    }
}

/// A nearest neighbor search index over points of type `T`.
///
/// Every query returns its results in an unspecified order; use [sort_by_distance] if you need
/// them sorted.
pub trait NearestNeighbors<T> {
    /// The type of distances between points.
    type Distance: Distance;

    /// The iterator returned by [iter](Self::iter).
    type Iter<'a>: Iterator<Item = &'a T>
    where
        Self: 'a,
        T: 'a;

    /// A short name for this kind of index, used in error messages.
    const NAME: &'static str;

    /// Get the number of points in this index.
    fn len(&self) -> usize;

    /// Check whether this index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every stored point exactly once, in no particular order.
    fn iter(&self) -> Self::Iter<'_>;

    /// Offer every stored point that could belong to `neighborhood` to it.
    fn search<'a, F>(&'a self, target: &T, neighborhood: &mut Neighborhood<'a, T, Self::Distance, F>)
    where
        F: FnMut(&T) -> bool;

    /// Find the nearest neighbor of `target`, if any.
    fn nearest(&self, target: &T) -> Option<Entry<'_, T, Self::Distance>> {
        self.k_nearest(target, 1).pop()
    }

    /// Find up to `k` nearest neighbors of `target`.
    fn k_nearest(&self, target: &T, k: usize) -> Vec<Entry<'_, T, Self::Distance>> {
        let mut neighborhood = Neighborhood::unbounded(k);
        self.search(target, &mut neighborhood);
        neighborhood.into_entries()
    }

    /// Find up to `k` nearest neighbors of `target` within `radius`.
    fn k_nearest_within(
        &self,
        target: &T,
        k: usize,
        radius: Self::Distance,
    ) -> Result<Vec<Entry<'_, T, Self::Distance>>> {
        self.k_nearest_filtered(target, k, Some(radius), accept_all)
    }

    /// Find up to `k` nearest neighbors of `target` that lie within `radius` (if given) and
    /// satisfy `filter`.
    fn k_nearest_filtered<F>(
        &self,
        target: &T,
        k: usize,
        radius: Option<Self::Distance>,
        filter: F,
    ) -> Result<Vec<Entry<'_, T, Self::Distance>>>
    where
        F: FnMut(&T) -> bool,
    {
        let mut neighborhood = Neighborhood::new(k, radius, filter)?;
        self.search(target, &mut neighborhood);
        Ok(neighborhood.into_entries())
    }

    /// Find every point within `radius` of `target`.
    fn within_radius(
        &self,
        target: &T,
        radius: Self::Distance,
    ) -> Result<Vec<Entry<'_, T, Self::Distance>>> {
        self.k_nearest_within(target, usize::MAX, radius)
    }

    /// Add a point to this index, returning whether it was stored.
    ///
    /// Indexes that can't grow after construction return [Error::Unsupported].
    fn insert(&mut self, _point: T) -> Result<bool> {
        Err(Error::unsupported("insertion", Self::NAME))
    }

    /// Remove a point from this index.
    ///
    /// None of the indexes in this crate support removal, so this always returns
    /// [Error::Unsupported] unless overridden.
    fn remove(&mut self, _point: &T) -> Result<bool> {
        Err(Error::unsupported("removal", Self::NAME))
    }
}
