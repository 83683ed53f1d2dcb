//! Nearest neighbor search in [metric spaces].
//!
//! This crate provides indexes that answer k-nearest-neighbor and radius queries over any point
//! type, given nothing but a distance function:
//!
//! * [VpTree]: a balanced [vantage-point tree], built once (in parallel) and then queried.
//! * [BkTree]: a [BK-tree] for integer-valued metrics, which supports insertion after
//!   construction.
//! * [ExhaustiveSearch]: a linear scan, useful as a baseline.
//!
//! All of them implement [NearestNeighbors].
//!
//! ```
//! use vantage::{BkTree, NearestNeighbors, VpTree};
//!
//! let ruler = |a: &i64, b: &i64| (a - b).abs();
//!
//! let vp = VpTree::build_seeded(ruler, vec![1, 5, 9, 14, 20], 42);
//! let nearest = vp.nearest(&12).unwrap();
//! assert_eq!((*nearest.point, nearest.distance), (14, 2));
//!
//! let mut bk = BkTree::new(ruler);
//! bk.insert_all([1, 5, 9, 14, 20]);
//! let mut close = bk.within_radius(&8, 3).unwrap();
//! vantage::knn::sort_by_distance(&mut close);
//! assert_eq!(close.iter().map(|e| *e.point).collect::<Vec<_>>(), [9, 5]);
//! ```
//!
//! [metric spaces]: https://en.wikipedia.org/wiki/Metric_space
//! [vantage-point tree]: https://en.wikipedia.org/wiki/Vantage-point_tree
//! [BK-tree]: https://en.wikipedia.org/wiki/BK-tree

pub mod bk;
pub mod distance;
pub mod error;
pub mod exhaustive;
pub mod knn;
pub mod vp;

mod traversal;
mod util;


pub use bk::BkTree;
pub use distance::{DiscreteValue, Distance, Metric, Value};
pub use error::{Error, Result};
pub use exhaustive::ExhaustiveSearch;
pub use knn::{Entry, NearestNeighbors, Neighborhood};
pub use vp::{VpTree, VpTreeBuilder};

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use num_traits::ToPrimitive;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub type Point = [i32; 2];

    /// Taxicab distance in the plane.
    pub fn taxi(a: &Point, b: &Point) -> i32 {
        (a[0] - b[0]).abs() + (a[1] - b[1]).abs()
    }

    /// Plain Levenshtein distance over chars.
    pub fn levenshtein(a: &str, b: &str) -> u32 {
        let b: Vec<char> = b.chars().collect();
        let mut row: Vec<u32> = (0..=b.len() as u32).collect();

        for (i, x) in a.chars().enumerate() {
            let mut diag = row[0];
            row[0] = i as u32 + 1;
            for (j, &y) in b.iter().enumerate() {
                let sub = diag + u32::from(x != y);
                diag = row[j + 1];
                row[j + 1] = sub.min(row[j] + 1).min(diag + 1);
            }
        }

        row[b.len()]
    }

    pub const QUERY_WORDS: [&str; 50] = [
        "static", "final", "ImmutableList<String>", "String", "Levenshtein",
        "Damerau", "Wagner", "Fischer", "Kruskal", "Wallis", "XYZZYFLUX",
        "tree", "distance", "public", "private", "AtomicInteger", "Assert",
        "filter", "map", "expected", "size", "words", "void", "BKTree",
        "DamerauLevenshtein", "assertEquals", "concurrent", "atomic",
        "class", "Java", "Builder", "Guava", "Apache", "Commons-lang",
        "Python", "C", "C++", "Groovy", "Jython", "John Doe", "Jane Doe",
        "Billybob", "ampersand", "edit distance", "VP-tree", "indel cost",
        "transposition", "macromolecule", "time warping", "0123456789",
    ];

    /// The query words, every pair of them, and a few short words.
    pub fn words() -> Vec<String> {
        let mut words: Vec<String> = QUERY_WORDS.iter().map(|w| w.to_string()).collect();
        for x in QUERY_WORDS {
            for y in QUERY_WORDS {
                words.push(format!("{x} -- {y}"));
            }
        }
        words.extend(["foo", "bar", "baz", "quux"].map(String::from));
        words
    }

    pub fn random_points(n: usize, seed: u64) -> Vec<Point> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| [rng.random_range(-100..=100), rng.random_range(-100..=100)])
            .collect()
    }

    /// Every point with its distance from the target, nearest first.
    fn brute_force(points: &[Point], target: &Point) -> Vec<(i32, Point)> {
        let mut all: Vec<_> = points.iter().map(|p| (taxi(p, target), *p)).collect();
        all.sort_unstable();
        all
    }

    fn distances(entries: &[Entry<'_, Point, i32>]) -> Vec<i32> {
        let mut distances: Vec<_> = entries.iter().map(|e| e.distance).collect();
        distances.sort_unstable();
        distances
    }

    fn check_contents<I>(index: &I, points: &[Point])
    where
        I: NearestNeighbors<Point, Distance = i32>,
    {
        assert_eq!(index.len(), points.len());

        let mut stored: Vec<Point> = index.iter().copied().collect();
        stored.sort_unstable();
        let mut expected = points.to_vec();
        expected.sort_unstable();
        assert_eq!(stored, expected);
    }

    fn check_queries<I>(index: &I, points: &[Point], target: &Point)
    where
        I: NearestNeighbors<Point, Distance = i32>,
    {
        let expected = brute_force(points, target);

        if let Some(&(distance, _)) = expected.first() {
            assert_eq!(index.nearest(target).map(|e| e.distance), Some(distance));
        } else {
            assert!(index.nearest(target).is_none());
        }

        for k in [0, 1, 2, 5, 32, points.len() + 1] {
            let want: Vec<_> = expected.iter().take(k).map(|e| e.0).collect();
            assert_eq!(distances(&index.k_nearest(target, k)), want, "k_nearest({target:?}, {k})");
        }

        for radius in [0, 7, 40] {
            let within: Vec<_> = expected.iter().filter(|e| e.0 <= radius).copied().collect();

            let mut got: Vec<_> = index
                .within_radius(target, radius)
                .unwrap()
                .iter()
                .map(|e| (e.distance, *e.point))
                .collect();
            got.sort_unstable();
            assert_eq!(got, within, "within_radius({target:?}, {radius})");

            let want: Vec<_> = within.iter().take(3).map(|e| e.0).collect();
            let got = index.k_nearest_within(target, 3, radius).unwrap();
            assert_eq!(distances(&got), want, "k_nearest_within({target:?}, 3, {radius})");
        }

        let even = |p: &Point| p[0] % 2 == 0;
        let want: Vec<_> = expected.iter().filter(|e| even(&e.1)).take(4).map(|e| e.0).collect();
        let got = index.k_nearest_filtered(target, 4, None, even).unwrap();
        assert!(got.iter().all(|e| even(e.point)));
        assert_eq!(distances(&got), want, "k_nearest_filtered({target:?}, 4)");

        assert_eq!(index.within_radius(target, -1).err(), Some(Error::InvalidRadius));
    }

    /// Check an index against brute force search on random points.
    pub fn test_exact_neighbors<I, B>(build: B)
    where
        B: Fn(Vec<Point>) -> I,
        I: NearestNeighbors<Point, Distance = i32>,
    {
        let empty = build(Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.iter().count(), 0);
        check_queries(&empty, &[], &[0, 0]);

        for n in [1, 2, 3, 4, 5, 17, 500] {
            let points = random_points(n, n as u64);
            let index = build(points.clone());
            check_contents(&index, &points);

            let mut targets = random_points(16, 1000 + n as u64);
            targets.extend(points.iter().take(4));
            for target in &targets {
                check_queries(&index, &points, target);
            }
        }
    }

    /// Run the word queries against an index built from [words()], returning the number of metric
    /// evaluations they took.
    pub fn test_word_queries<I>(index: &I, calls: &AtomicUsize) -> usize
    where
        I: NearestNeighbors<String>,
        I::Distance: ToPrimitive,
    {
        let words = words();
        assert_eq!(index.len(), words.len());
        let stored: HashSet<&String> = index.iter().collect();
        assert_eq!(stored, words.iter().collect());

        let nearest = index.nearest(&"ImmutableSet<String>".to_string()).unwrap();
        assert_eq!(nearest.point, "ImmutableList<String>");

        calls.store(0, Ordering::Relaxed);

        for word in QUERY_WORDS {
            let word = word.to_string();
            let mut neighbors = index.k_nearest(&word, 10);
            knn::sort_by_distance(&mut neighbors);

            assert_eq!(neighbors.len(), 10);
            assert_eq!(neighbors[0].point, &word);
            assert_eq!(neighbors[0].distance.to_f64(), Some(0.0));
            for entry in &neighbors {
                let expected = levenshtein(&word, entry.point);
                assert_eq!(entry.distance.to_f64(), Some(f64::from(expected)));
            }
        }

        calls.load(Ordering::Relaxed)
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("foo", ""), 3);
        assert_eq!(levenshtein("foo", "fool"), 1);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("bar", "baz"), 1);
        assert_eq!(levenshtein("foo", "bar"), 3);
    }

    #[test]
    fn test_words() {
        let words = words();
        assert_eq!(words.len(), 50 + 50 * 50 + 4);
        assert_eq!(words.iter().collect::<HashSet<_>>().len(), words.len());
    }
}
