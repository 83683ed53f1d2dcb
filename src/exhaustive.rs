//! Exhaustive nearest neighbor search.

use crate::distance::Metric;
use crate::knn::{NearestNeighbors, Neighborhood};

use std::fmt::{self, Debug, Formatter};

/// A [NearestNeighbors] implementation that compares the target to every point.
///
/// Useful as a baseline, and as an oracle for testing the tree indexes.
pub struct ExhaustiveSearch<T, M> {
    metric: M,
    points: Vec<T>,
}

impl<T, M: Metric<T>> ExhaustiveSearch<T, M> {
    /// Create an empty index.
    pub fn new(metric: M) -> Self {
        Self {
            metric,
            points: Vec::new(),
        }
    }

    /// Create an index holding the given points.
    pub fn from_points<I: IntoIterator<Item = T>>(metric: M, points: I) -> Self {
        Self {
            metric,
            points: points.into_iter().collect(),
        }
    }

    /// Get the metric this index uses.
    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Add a new point to the index.
    pub fn push(&mut self, point: T) {
        self.points.push(point);
    }

    /// Get the size of this index.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if this index is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl<T: Debug, M> Debug for ExhaustiveSearch<T, M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExhaustiveSearch")
            .field("points", &self.points)
            .finish_non_exhaustive()
    }
}

impl<T, M> IntoIterator for ExhaustiveSearch<T, M> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<T, M: Metric<T>> Extend<T> for ExhaustiveSearch<T, M> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for point in iter {
            self.push(point);
        }
    }
}

impl<T, M: Metric<T>> NearestNeighbors<T> for ExhaustiveSearch<T, M> {
    type Distance = M::Distance;

    type Iter<'a> = std::slice::Iter<'a, T>
    where
        Self: 'a,
        T: 'a;

    const NAME: &'static str = "ExhaustiveSearch";

    fn len(&self) -> usize {
        self.points.len()
    }

    fn iter(&self) -> Self::Iter<'_> {
        self.points.iter()
    }

    fn search<'a, F>(&'a self, target: &T, neighborhood: &mut Neighborhood<'a, T, Self::Distance, F>)
    where
        F: FnMut(&T) -> bool,
    {
        for point in &self.points {
            neighborhood.consider(point, self.metric.distance(target, point));
        }
    }

    fn insert(&mut self, point: T) -> crate::Result<bool> {
        self.push(point);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::tests::{taxi, test_exact_neighbors};

    #[test]
    fn test_exhaustive_index() {
        test_exact_neighbors(|points| ExhaustiveSearch::from_points(taxi, points));
    }

    #[test]
    fn test_insert() {
        let mut index = ExhaustiveSearch::new(taxi);
        assert_eq!(index.insert([1, 1]), Ok(true));
        index.extend([[2, 2], [1, 1]]);
        assert_eq!(NearestNeighbors::len(&index), 3);
        assert_eq!(index.within_radius(&[1, 1], 0).map(|e| e.len()), Ok(2));
        assert_eq!(
            index.remove(&[1, 1]),
            Err(Error::Unsupported { operation: "removal", index: "ExhaustiveSearch" }),
        );
    }
}
