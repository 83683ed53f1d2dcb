//! Error types.

use thiserror::Error;

/// An error produced by a nearest neighbor index.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum Error {
    /// A search radius was negative or not comparable to zero (e.g. NaN).
    #[error("search radius must be a non-negative distance")]
    InvalidRadius,
    /// The index does not support the requested operation.
    #[error("{index} does not support {operation}")]
    Unsupported {
        /// The operation that was attempted.
        operation: &'static str,
        /// The kind of index it was attempted on.
        index: &'static str,
    },
}

impl Error {
    pub(crate) fn unsupported(operation: &'static str, index: &'static str) -> Self {
        Self::Unsupported { operation, index }
    }
}

/// Shorthand for results with this crate's [Error] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::InvalidRadius.to_string(),
            "search radius must be a non-negative distance",
        );
        assert_eq!(
            Error::unsupported("removal", "BkTree").to_string(),
            "BkTree does not support removal",
        );
    }
}
