//! Abstract notions of distance.

use num_traits::{Num, NumAssign, PrimInt, Signed, ToPrimitive, Zero};

/// The minimum a distance type must support to be used in a search.
///
/// This trait is automatically implemented for all types that support the required operations.
pub trait Distance: Copy + PartialOrd + Zero {}

/// Blanket [Distance] implementation.
impl<T: Copy + PartialOrd + Zero> Distance for T {}

/// A continuous distance type, suitable for [vantage-point trees](crate::vp).
///
/// Distances are combined with `+` and `-` during pruning, so the type must be signed.  The
/// conversion to `f64` is only used to rank vantage point candidates during construction.
pub trait Value: Distance + Num + NumAssign + Signed + ToPrimitive {}

/// Blanket [Value] implementation.
impl<T: Distance + Num + NumAssign + Signed + ToPrimitive> Value for T {}

/// An integer distance type, suitable for [BK-trees](crate::bk).
///
/// BK-trees use distances as exact map keys, so only primitive integers qualify.
pub trait DiscreteValue: Distance + PrimInt {}

/// Blanket [DiscreteValue] implementation.
impl<T: Distance + PrimInt> DiscreteValue for T {}

/// A distance function over points of type `T`.
///
/// Implementations must be [metrics]: for all `x`, `y`, and `z`,
///
/// * `d(x, x) = 0`
/// * `d(x, y) = d(y, x)` (symmetry)
/// * `d(x, z) <= d(x, y) + d(y, z)` (triangle inequality)
///
/// which together imply `d(x, y) >= 0`.  We do not prohibit `d(x, y) = 0` for distinct `x` and
/// `y`, so these are more properly [pseudometrics].
///
/// None of these rules are checked.  Indexes built on a function that breaks them will silently
/// return wrong answers.
///
/// Any `Fn(&T, &T) -> D` closure is a metric, so most callers never implement this trait by hand:
///
/// ```
/// use vantage::Metric;
///
/// let taxi = |a: &(i32, i32), b: &(i32, i32)| (a.0 - b.0).abs() + (a.1 - b.1).abs();
/// assert_eq!(taxi.distance(&(0, 0), &(3, -4)), 7);
/// ```
///
/// [metrics]: https://en.wikipedia.org/wiki/Metric_space
/// [pseudometrics]: https://en.wikipedia.org/wiki/Pseudometric_space
pub trait Metric<T: ?Sized> {
    /// The type that represents distances.
    type Distance: Distance;

    /// Calculate the distance between two points.
    fn distance(&self, a: &T, b: &T) -> Self::Distance;
}

/// Blanket [Metric] implementation for distance functions.
impl<T, D, F> Metric<T> for F
where
    T: ?Sized,
    D: Distance,
    F: Fn(&T, &T) -> D,
{
    type Distance = D;

    fn distance(&self, a: &T, b: &T) -> D {
        self(a, b)
    }
}

// See https://github.com/rust-lang/rust/issues/38078
/// Shorthand for `M::Distance`.
pub type DistanceOf<M, T> = <M as Metric<T>>::Distance;

#[cfg(test)]
mod tests {
    use super::*;

    struct Hamming;

    impl Metric<u32> for Hamming {
        type Distance = u32;

        fn distance(&self, a: &u32, b: &u32) -> u32 {
            (a ^ b).count_ones()
        }
    }

    fn distance_of<T, M: Metric<T>>(metric: &M, a: &T, b: &T) -> DistanceOf<M, T> {
        metric.distance(a, b)
    }

    #[test]
    fn test_closure_metric() {
        let abs = |a: &f64, b: &f64| (a - b).abs();
        assert_eq!(distance_of(&abs, &1.5, &-2.0), 3.5);
    }

    #[test]
    fn test_unsized_points() {
        let len_diff = |a: &str, b: &str| (a.len() as i64 - b.len() as i64).abs();
        assert_eq!(len_diff.distance("foo", "quux"), 1);
    }

    #[test]
    fn test_struct_metric() {
        assert_eq!(Hamming.distance(&0, &0xFFFF_FFFF), 32);
        assert_eq!(distance_of(&Hamming, &0xDEAD_BEEF, &0xACAB_ACAB), 10);
    }
}
