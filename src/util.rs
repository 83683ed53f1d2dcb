//! Internal utilities.

use num_traits::ToPrimitive;

use std::cmp::Ordering;

/// A wrapper that turns a partial ordering into a total one, panicking on unordered values.
#[derive(Clone, Copy, Debug, PartialOrd)]
pub struct Ordered<T>(T);

impl<T> Ordered<T> {
    /// Wrap a value.
    pub fn new(item: T) -> Self {
        Self(item)
    }

    /// Unwrap the value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Ordered<T> {
    fn from(item: T) -> Self {
        Self::new(item)
    }
}

#[allow(clippy::derive_ord_xor_partial_ord)]
impl<T: PartialOrd> Ord for Ordered<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).expect("Comparison between unordered distances")
    }
}

impl<T: PartialOrd> PartialEq for Ordered<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: PartialOrd> Eq for Ordered<T> {}

/// The mean absolute deviation of a sample of distances.
///
/// Returns negative infinity for an empty sample, so that any real sample outranks it.
pub fn spread<D: ToPrimitive + Copy>(sample: &[D]) -> f64 {
    if sample.is_empty() {
        return f64::NEG_INFINITY;
    }

    let values = || sample.iter().map(|d| d.to_f64().unwrap_or(f64::NAN));
    let n = sample.len() as f64;
    let mean = values().sum::<f64>() / n;
    values().map(|d| (d - mean).abs()).sum::<f64>() / n
}
