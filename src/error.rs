use std::fmt;

/// Failure modes surfaced by fallible entry points.
///
/// Not-found outcomes (`Get`, `Remove`, a missing `Update` key) are never
/// represented here; those are plain `Option::None`, not faults.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `dim` passed to a constructor was zero.
    ZeroDimension,
    /// A key, min/max bound, or query center had a different length than the
    /// tree's configured dimensionality.
    DimensionMismatch { expected: usize, actual: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ZeroDimension => write!(f, "dimensionality must be at least 1"),
            Error::DimensionMismatch { expected, actual } => {
                write!(f, "expected a {expected}-dimensional point, got {actual}")
            }
        }
    }
}

impl std::error::Error for Error {}
