//! [BK-trees](https://en.wikipedia.org/wiki/BK-tree).

use crate::distance::{DiscreteValue, DistanceOf, Metric};
use crate::knn::{NearestNeighbors, Neighborhood};
use crate::traversal::{Subtree, Traversal};

use log::{debug, trace};
use num_traits::zero;
use rayon::iter::plumbing::{bridge_unindexed, UnindexedConsumer};
use rayon::prelude::*;

use std::collections::btree_map::{self, BTreeMap};
use std::fmt::{self, Debug, Formatter};

/// A node in a BK-tree.
#[derive(Debug)]
struct BkNode<T, D> {
    /// The point stored here.
    item: T,
    /// Children keyed by their exact distance from `item`.
    children: BTreeMap<D, BkNode<T, D>>,
}

impl<T, D: DiscreteValue> BkNode<T, D> {
    /// Create a new leaf.
    fn new(item: T) -> Self {
        Self {
            item,
            children: BTreeMap::new(),
        }
    }

    /// Insert a point somewhere below this node.
    fn insert<M>(&mut self, metric: &M, item: T, allow_duplicates: bool) -> bool
    where
        M: Metric<T, Distance = D>,
    {
        let mut node = self;
        loop {
            let distance = metric.distance(&item, &node.item);
            if distance.is_zero() && !allow_duplicates {
                return false;
            }

            match node.children.entry(distance) {
                btree_map::Entry::Occupied(child) => node = child.into_mut(),
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(Self::new(item));
                    return true;
                }
            }
        }
    }

    /// Check whether a point at distance zero from `item` is stored below this node.
    ///
    /// Such a point is the same distance from every node as `item` is, so it can only be found
    /// along `item`'s own insertion path.
    fn contains<M>(&self, metric: &M, item: &T) -> bool
    where
        M: Metric<T, Distance = D>,
    {
        let mut node = self;
        loop {
            let distance = metric.distance(item, &node.item);
            if distance.is_zero() {
                return true;
            }

            match node.children.get(&distance) {
                Some(child) => node = child,
                None => return false,
            }
        }
    }

    /// Recursively search for nearest neighbors.
    fn search<'a, M, F>(&'a self, metric: &M, target: &T, neighborhood: &mut Neighborhood<'a, T, D, F>)
    where
        M: Metric<T, Distance = D>,
        F: FnMut(&T) -> bool,
    {
        let distance = metric.distance(target, &self.item);
        neighborhood.consider(&self.item, distance);

        // Everything under the child keyed `key` is at least |distance - key| from the target
        let lower = match neighborhood.radius() {
            Some(radius) if radius < distance => distance - radius,
            _ => zero(),
        };

        for (&key, child) in self.children.range(lower..) {
            if key <= distance {
                if neighborhood.contains(distance - key) {
                    child.search(metric, target, neighborhood);
                }
            } else if neighborhood.contains(key - distance) {
                child.search(metric, target, neighborhood);
            } else {
                break;
            }
        }
    }
}

impl<'a, T, D> Subtree<'a> for &'a BkNode<T, D> {
    type Item = T;

    fn item(self) -> &'a T {
        &self.item
    }

    fn push_children(self, stack: &mut Vec<Self>) {
        stack.extend(self.children.values());
    }
}

/// A [BK-tree](https://en.wikipedia.org/wiki/BK-tree).
///
/// Every child sits under the exact (integer) distance between it and its parent, so a search
/// only needs to visit the children whose keys lie within its radius of the target's distance
/// to the parent.  Unlike a [VpTree](crate::VpTree), a BK-tree can grow after construction, but
/// it is not balanced: its shape depends on insertion order.
///
/// By default, points at distance zero from a stored point are stored too.  Trees created with
/// [BkTree::without_duplicates] reject them instead.
pub struct BkTree<T, M: Metric<T>> {
    metric: M,
    root: Option<BkNode<T, DistanceOf<M, T>>>,
    len: usize,
    allow_duplicates: bool,
}

impl<T, M> BkTree<T, M>
where
    M: Metric<T>,
    M::Distance: DiscreteValue,
{
    /// Create an empty tree that stores duplicate points.
    pub fn new(metric: M) -> Self {
        Self {
            metric,
            root: None,
            len: 0,
            allow_duplicates: true,
        }
    }

    /// Create an empty tree that rejects points at distance zero from a stored point.
    pub fn without_duplicates(metric: M) -> Self {
        Self {
            allow_duplicates: false,
            ..Self::new(metric)
        }
    }

    /// Create a tree that stores duplicates, and insert every given point in order.
    pub fn from_points<I: IntoIterator<Item = T>>(metric: M, points: I) -> Self {
        let mut tree = Self::new(metric);
        tree.extend(points);
        debug!("built BK tree with {} points", tree.len);
        tree
    }

    /// Get the metric this tree uses.
    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Check whether this tree stores duplicate points.
    pub fn allows_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    /// Get the number of points in this tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if this tree is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a point, returning whether it was stored.
    ///
    /// Only trees created with [BkTree::without_duplicates] ever return `false`.
    pub fn insert(&mut self, point: T) -> bool {
        let inserted = match &mut self.root {
            Some(root) => root.insert(&self.metric, point, self.allow_duplicates),
            None => {
                self.root = Some(BkNode::new(point));
                true
            }
        };

        if inserted {
            self.len += 1;
        } else {
            trace!("rejected a duplicate point in a BK tree of {} points", self.len);
        }
        inserted
    }

    /// Insert every given point, returning whether any of them was stored.
    pub fn insert_all<I: IntoIterator<Item = T>>(&mut self, points: I) -> bool {
        points
            .into_iter()
            .fold(false, |any, point| self.insert(point) || any)
    }

    /// Check whether a point at distance zero from `point` is stored in this tree.
    pub fn contains(&self, point: &T) -> bool {
        self.root
            .as_ref()
            .is_some_and(|root| root.contains(&self.metric, point))
    }

    /// Remove every point from this tree.
    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }
}

impl<T, M: Metric<T>> BkTree<T, M> {
    /// Iterate over the points stored in this tree, depth first.
    pub fn iter(&self) -> Iter<'_, T, M::Distance> {
        Iter {
            traversal: Traversal::new(self.root.as_ref()),
            remaining: self.len,
        }
    }

    /// Iterate over the points stored in this tree in parallel.
    pub fn par_iter(&self) -> ParIter<'_, T, M::Distance>
    where
        T: Sync,
        M::Distance: Sync,
    {
        ParIter(Traversal::new(self.root.as_ref()))
    }
}

// Can't derive(Debug) since the metric is usually a closure
impl<T, M> Debug for BkTree<T, M>
where
    T: Debug,
    M: Metric<T>,
    M::Distance: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BkTree")
            .field("root", &self.root)
            .field("len", &self.len)
            .field("allow_duplicates", &self.allow_duplicates)
            .finish_non_exhaustive()
    }
}

impl<T, M> Extend<T> for BkTree<T, M>
where
    M: Metric<T>,
    M::Distance: DiscreteValue,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, points: I) {
        for point in points {
            self.insert(point);
        }
    }
}

/// An iterator that moves points out of a BK-tree.
pub struct IntoIter<T, D> {
    stack: Vec<BkNode<T, D>>,
    remaining: usize,
}

impl<T: Debug, D: Debug> Debug for IntoIter<T, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoIter")
            .field("stack", &self.stack)
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl<T, D> Iterator for IntoIter<T, D> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.into_values());
        self.remaining -= 1;
        Some(node.item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, D> ExactSizeIterator for IntoIter<T, D> {}

impl<T, M: Metric<T>> IntoIterator for BkTree<T, M> {
    type Item = T;
    type IntoIter = IntoIter<T, M::Distance>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            stack: self.root.into_iter().collect(),
            remaining: self.len,
        }
    }
}

/// An iterator over the points in a BK-tree.
pub struct Iter<'a, T, D> {
    traversal: Traversal<'a, &'a BkNode<T, D>>,
    remaining: usize,
}

impl<T: Debug, D: Debug> Debug for Iter<'_, T, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("traversal", &self.traversal)
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl<'a, T, D> Iterator for Iter<'a, T, D> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let item = self.traversal.next()?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, D> ExactSizeIterator for Iter<'_, T, D> {}

impl<'a, T, M: Metric<T>> IntoIterator for &'a BkTree<T, M> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, M::Distance>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A parallel iterator over the points in a BK-tree.
///
/// Splitting hands whole pending subtrees to other workers.
pub struct ParIter<'a, T, D>(Traversal<'a, &'a BkNode<T, D>>);

impl<T: Debug, D: Debug> Debug for ParIter<'_, T, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParIter")
            .field(&self.0)
            .finish()
    }
}

impl<'a, T: Sync, D: Sync> ParallelIterator for ParIter<'a, T, D> {
    type Item = &'a T;

    fn drive_unindexed<C>(self, consumer: C) -> C::Result
    where
        C: UnindexedConsumer<Self::Item>,
    {
        bridge_unindexed(self.0, consumer)
    }
}

impl<T, M> NearestNeighbors<T> for BkTree<T, M>
where
    M: Metric<T>,
    M::Distance: DiscreteValue,
{
    type Distance = M::Distance;

    type Iter<'a> = Iter<'a, T, M::Distance>
    where
        Self: 'a,
        T: 'a;

    const NAME: &'static str = "BkTree";

    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> Self::Iter<'_> {
        BkTree::iter(self)
    }

    fn search<'a, F>(&'a self, target: &T, neighborhood: &mut Neighborhood<'a, T, Self::Distance, F>)
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(root) = &self.root {
            root.search(&self.metric, target, neighborhood);
        }
    }

    fn insert(&mut self, point: T) -> crate::Result<bool> {
        Ok(BkTree::insert(self, point))
    }
}
