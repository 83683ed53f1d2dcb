//! [Vantage-point trees](https://en.wikipedia.org/wiki/Vantage-point_tree).

use crate::distance::{DistanceOf, Metric, Value};
use crate::knn::{NearestNeighbors, Neighborhood};
use crate::util::{spread, Ordered};

use log::debug;
use num_traits::zero;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::iter::plumbing::{Consumer, ProducerCallback, UnindexedConsumer};
use rayon::prelude::*;

use std::fmt::{self, Debug, Formatter};

/// A node in a VP tree.
///
/// Nodes are stored in pre-order: a node is followed by the `inside_len` nodes of its inside
/// subtree, then by its outside subtree.
#[derive(Debug)]
struct VpNode<T, D> {
    /// The vantage point itself.
    item: T,
    /// The radius of this node.  During construction, this holds the distance to the parent's
    /// vantage point instead.
    radius: D,
    /// The size of the inside subtree.
    inside_len: usize,
}

impl<T, D: Value> VpNode<T, D> {
    /// Create a new VpNode.
    fn new(item: T) -> Self {
        Self {
            item,
            radius: zero(),
            inside_len: 0,
        }
    }

    /// Turn this node into a leaf.
    fn make_leaf(&mut self) {
        self.radius = zero();
        self.inside_len = 0;
    }
}

/// Configuration for building a [VpTree].
///
/// ```
/// use vantage::{NearestNeighbors, VpTreeBuilder};
///
/// let tree = VpTreeBuilder::new()
///     .seed(7)
///     .parallel(false)
///     .build(|a: &f64, b: &f64| (a - b).abs(), vec![0.5, 1.5, 4.0]);
/// assert_eq!(tree.len(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct VpTreeBuilder {
    seed: Option<u64>,
    parallel: bool,
    min_parallel_len: usize,
}

impl Default for VpTreeBuilder {
    fn default() -> Self {
        Self {
            seed: None,
            parallel: true,
            min_parallel_len: 1024,
        }
    }
}

impl VpTreeBuilder {
    /// Create a builder with the default configuration: a randomly seeded generator and parallel
    /// construction for subtrees of at least 1024 points.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the random number generator used to pick vantage points, making construction
    /// reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable parallel construction.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the smallest subtree that is worth building in parallel.
    pub fn min_parallel_len(mut self, len: usize) -> Self {
        self.min_parallel_len = len;
        self
    }

    /// Build a tree out of a metric and a sequence of points.
    pub fn build<T, M, I>(&self, metric: M, points: I) -> VpTree<T, M>
    where
        T: Send + Sync,
        M: Metric<T> + Sync,
        M::Distance: Value + Send + Sync,
        I: IntoIterator<Item = T>,
    {
        let mut nodes: Vec<_> = points.into_iter().map(VpNode::new).collect();

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        debug!(
            "building VP tree over {} points (seed: {:?}, parallel: {})",
            nodes.len(),
            self.seed,
            self.parallel,
        );

        let construction = Construction {
            metric: &metric,
            parallel: self.parallel,
            min_parallel_len: self.min_parallel_len,
        };
        construction.build(&mut nodes, &mut rng);

        VpTree { metric, nodes }
    }
}

/// The shared state of a VP tree construction.
struct Construction<'m, M> {
    metric: &'m M,
    parallel: bool,
    min_parallel_len: usize,
}

impl<M> Construction<'_, M> {
    /// Check whether a subtree of the given size should be built in parallel.
    fn fork(&self, len: usize) -> bool {
        self.parallel && len >= self.min_parallel_len
    }

    /// Arrange `nodes` into a balanced subtree.
    fn build<T>(&self, nodes: &mut [VpNode<T, M::Distance>], rng: &mut StdRng)
    where
        T: Send + Sync,
        M: Metric<T> + Sync,
        M::Distance: Value + Send + Sync,
    {
        match nodes.len() {
            0 => {}
            1 => nodes[0].make_leaf(),
            2 => self.build_pair(nodes, rng),
            3 => self.build_triple(nodes),
            _ => self.build_split(nodes, rng),
        }
    }

    /// Either point can be the vantage point, with the other inside it.
    fn build_pair<T>(&self, nodes: &mut [VpNode<T, M::Distance>], rng: &mut StdRng)
    where
        M: Metric<T>,
        M::Distance: Value,
    {
        if rng.random_bool(0.5) {
            nodes.swap(0, 1);
        }

        if let [node, child] = nodes {
            node.radius = self.metric.distance(&node.item, &child.item);
            node.inside_len = 1;
            child.make_leaf();
        }
    }

    /// Try every vantage point, and keep the one that separates the other two best.
    fn build_triple<T>(&self, nodes: &mut [VpNode<T, M::Distance>])
    where
        M: Metric<T>,
        M::Distance: Value,
    {
        let d01 = self.metric.distance(&nodes[0].item, &nodes[1].item);
        let d02 = self.metric.distance(&nodes[0].item, &nodes[2].item);
        let d12 = self.metric.distance(&nodes[1].item, &nodes[2].item);
        // others[i] holds the distances to nodes[1] and nodes[2] once nodes[i] is swapped to the front
        let others = [[d01, d02], [d01, d12], [d12, d02]];

        let mut best = 0;
        let mut best_spread = spread(&others[0]);
        for (i, pair) in others.iter().enumerate().skip(1) {
            let spread = spread(pair);
            if spread > best_spread {
                best = i;
                best_spread = spread;
            }
        }

        let [mut near, mut far] = others[best];
        nodes.swap(0, best);
        if far < near {
            nodes.swap(1, 2);
            std::mem::swap(&mut near, &mut far);
        }

        if let [node, inside, outside] = nodes {
            node.radius = near;
            node.inside_len = 1;
            inside.make_leaf();
            outside.make_leaf();
        }
    }

    /// Split around the median distance from a sampled vantage point, and recurse.
    fn build_split<T>(&self, nodes: &mut [VpNode<T, M::Distance>], rng: &mut StdRng)
    where
        T: Send + Sync,
        M: Metric<T> + Sync,
        M::Distance: Value + Send + Sync,
    {
        self.select_vantage(nodes, rng);

        let fork = self.fork(nodes.len());
        let Some((node, children)) = nodes.split_first_mut() else {
            return;
        };

        let vantage = &node.item;
        let metric = self.metric;
        if fork {
            children
                .par_iter_mut()
                .for_each(|child| child.radius = metric.distance(&child.item, vantage));
        } else {
            for child in children.iter_mut() {
                child.radius = metric.distance(&child.item, vantage);
            }
        }

        let median = children.len() / 2;
        children.select_nth_unstable_by_key(median, |child| Ordered::new(child.radius));
        node.radius = children[median].radius;
        node.inside_len = median;

        let (inside, outside) = children.split_at_mut(median);
        let mut inside_rng = StdRng::seed_from_u64(rng.random());
        if fork {
            rayon::join(
                || self.build(inside, &mut inside_rng),
                || self.build(outside, rng),
            );
        } else {
            self.build(inside, &mut inside_rng);
            self.build(outside, rng);
        }
    }

    /// Pick a vantage point and move it to the front of `nodes`.
    ///
    /// About √n candidates are each compared to their own sample of about √n other points, and
    /// the one whose distances have the largest spread wins.  This takes a linear number of
    /// distance computations.
    fn select_vantage<T>(&self, nodes: &mut [VpNode<T, M::Distance>], rng: &mut StdRng)
    where
        M: Metric<T>,
        M::Distance: Value,
    {
        nodes.shuffle(rng);

        let n_candidates = (nodes.len() as f64).sqrt() as usize;
        let (candidates, rest) = nodes.split_at(n_candidates);
        let sample_len = ((rest.len() as f64).sqrt() as usize).max(1);

        let mut best = 0;
        let mut best_spread = f64::NEG_INFINITY;
        let mut distances = Vec::with_capacity(sample_len);
        let samples = rest.chunks_exact(sample_len);
        for (i, (candidate, sample)) in candidates.iter().zip(samples).enumerate() {
            distances.clear();
            distances.extend(
                sample
                    .iter()
                    .map(|n| self.metric.distance(&n.item, &candidate.item)),
            );

            let spread = spread(&distances);
            if spread > best_spread {
                best = i;
                best_spread = spread;
            }
        }

        nodes.swap(0, best);
    }
}

trait VpSearch<'a, T: 'a, D: Value>: Copy {
    /// Get the vantage point of this node.
    fn item(self) -> &'a T;

    /// Get the radius of this node.
    fn radius(self) -> D;

    /// Get the inside subtree.
    fn inside(self) -> Option<Self>;

    /// Get the outside subtree.
    fn outside(self) -> Option<Self>;

    /// Recursively search for nearest neighbors.
    fn search<M, F>(self, metric: &M, target: &T, neighborhood: &mut Neighborhood<'a, T, D, F>)
    where
        M: Metric<T, Distance = D>,
        F: FnMut(&T) -> bool,
    {
        let distance = metric.distance(target, self.item());
        neighborhood.consider(self.item(), distance);

        if distance < self.radius() {
            self.search_inside(metric, target, distance, neighborhood);
            self.search_outside(metric, target, distance, neighborhood);
        } else {
            self.search_outside(metric, target, distance, neighborhood);
            self.search_inside(metric, target, distance, neighborhood);
        }
    }

    /// Search the inside subtree.
    fn search_inside<M, F>(
        self,
        metric: &M,
        target: &T,
        distance: D,
        neighborhood: &mut Neighborhood<'a, T, D, F>,
    )
    where
        M: Metric<T, Distance = D>,
        F: FnMut(&T) -> bool,
    {
        if let Some(inside) = self.inside() {
            if neighborhood.contains(distance - self.radius()) {
                inside.search(metric, target, neighborhood);
            }
        }
    }

    /// Search the outside subtree.
    fn search_outside<M, F>(
        self,
        metric: &M,
        target: &T,
        distance: D,
        neighborhood: &mut Neighborhood<'a, T, D, F>,
    )
    where
        M: Metric<T, Distance = D>,
        F: FnMut(&T) -> bool,
    {
        if let Some(outside) = self.outside() {
            if neighborhood.contains(self.radius() - distance) {
                outside.search(metric, target, neighborhood);
            }
        }
    }
}

impl<'a, T, D: Value> VpSearch<'a, T, D> for &'a [VpNode<T, D>] {
    fn item(self) -> &'a T {
        &self[0].item
    }

    fn radius(self) -> D {
        self[0].radius
    }

    fn inside(self) -> Option<Self> {
        let end = self[0].inside_len + 1;
        if end > 1 {
            Some(&self[1..end])
        } else {
            None
        }
    }

    fn outside(self) -> Option<Self> {
        let start = self[0].inside_len + 1;
        if start < self.len() {
            Some(&self[start..])
        } else {
            None
        }
    }
}

/// A [vantage-point tree](https://en.wikipedia.org/wiki/Vantage-point_tree).
///
/// Each node splits the points below it into an inside half, no farther from its vantage point
/// than its radius, and an outside half, no nearer.  Searches use the triangle inequality to skip
/// halves that can't contain anything close enough.
///
/// A VpTree is immutable once built; [insert](NearestNeighbors::insert) fails with
/// [Error::Unsupported](crate::Error::Unsupported).  Use a [BkTree](crate::BkTree) if you need to
/// add points later.
///
/// # Panics
///
/// Construction and queries panic if the metric returns distances that can't be compared, such as
/// NaN.
pub struct VpTree<T, M: Metric<T>> {
    metric: M,
    nodes: Vec<VpNode<T, DistanceOf<M, T>>>,
}

impl<T, M> VpTree<T, M>
where
    T: Send + Sync,
    M: Metric<T> + Sync,
    M::Distance: Value + Send + Sync,
{
    /// Build a balanced tree out of a sequence of points.
    ///
    /// Vantage points are chosen with a randomly seeded generator.  Use [VpTree::build_seeded] or
    /// a [VpTreeBuilder] for reproducible trees.
    pub fn build<I: IntoIterator<Item = T>>(metric: M, points: I) -> Self {
        VpTreeBuilder::new().build(metric, points)
    }

    /// Build a balanced tree out of a sequence of points, choosing vantage points with a
    /// generator seeded from `seed`.
    pub fn build_seeded<I: IntoIterator<Item = T>>(metric: M, points: I, seed: u64) -> Self {
        VpTreeBuilder::new().seed(seed).build(metric, points)
    }
}

impl<T, M: Metric<T>> VpTree<T, M> {
    /// Get the metric this tree was built with.
    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Get the number of points in this tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if this tree is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over the points stored in this tree.
    pub fn iter(&self) -> Iter<'_, T, M::Distance> {
        Iter(self.nodes.iter())
    }

    /// Iterate over the points stored in this tree in parallel.
    pub fn par_iter(&self) -> ParIter<'_, T, M::Distance>
    where
        T: Sync,
        M::Distance: Sync,
    {
        ParIter(self.nodes.par_iter())
    }
}

// Can't derive(Debug) since the metric is usually a closure
impl<T, M> Debug for VpTree<T, M>
where
    T: Debug,
    M: Metric<T>,
    M::Distance: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("VpTree")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

/// An iterator that moves points out of a VP tree.
pub struct IntoIter<T, D>(std::vec::IntoIter<VpNode<T, D>>);

impl<T: Debug, D: Debug> Debug for IntoIter<T, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter")
            .field(&self.0)
            .finish()
    }
}

impl<T, D> Iterator for IntoIter<T, D> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.next().map(|n| n.item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<T, D> ExactSizeIterator for IntoIter<T, D> {}

impl<T, M: Metric<T>> IntoIterator for VpTree<T, M> {
    type Item = T;
    type IntoIter = IntoIter<T, M::Distance>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self.nodes.into_iter())
    }
}

/// An iterator over the points in a VP tree.
pub struct Iter<'a, T, D>(std::slice::Iter<'a, VpNode<T, D>>);

impl<T: Debug, D: Debug> Debug for Iter<'_, T, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Iter")
            .field(&self.0)
            .finish()
    }
}

impl<'a, T, D> Iterator for Iter<'a, T, D> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.0.next().map(|n| &n.item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<T, D> ExactSizeIterator for Iter<'_, T, D> {}

impl<'a, T, M: Metric<T>> IntoIterator for &'a VpTree<T, M> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, M::Distance>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A parallel iterator over the points in a VP tree.
///
/// The tree is stored contiguously, so this splits into disjoint ranges of nodes.
pub struct ParIter<'a, T, D>(rayon::slice::Iter<'a, VpNode<T, D>>);

impl<T: Debug + Sync, D: Debug + Sync> Debug for ParIter<'_, T, D> {
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
        self.0.map(|n| &n.item).drive_unindexed(consumer)
    }

    fn opt_len(&self) -> Option<usize> {
        Some(self.0.len())
    }
}

impl<T: Sync, D: Sync> IndexedParallelIterator for ParIter<'_, T, D> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn drive<C>(self, consumer: C) -> C::Result
    where
        C: Consumer<Self::Item>,
    {
        self.0.map(|n| &n.item).drive(consumer)
    }

    fn with_producer<CB>(self, callback: CB) -> CB::Output
    where
        CB: ProducerCallback<Self::Item>,
    {
        self.0.map(|n| &n.item).with_producer(callback)
    }
}

impl<T, M> NearestNeighbors<T> for VpTree<T, M>
where
    M: Metric<T>,
    M::Distance: Value,
{
    type Distance = M::Distance;

    type Iter<'a> = Iter<'a, T, M::Distance>
    where
        Self: 'a,
        T: 'a;

    const NAME: &'static str = "VpTree";

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn iter(&self) -> Self::Iter<'_> {
        Iter(self.nodes.iter())
    }

    fn search<'a, F>(&'a self, target: &T, neighborhood: &mut Neighborhood<'a, T, Self::Distance, F>)
    where
        F: FnMut(&T) -> bool,
    {
        if !self.nodes.is_empty() {
            self.nodes.as_slice().search(&self.metric, target, neighborhood);
        }
    }
}
