use std::fmt;

/// Everything that can go wrong while creating or stepping a [`World`](crate::World).
///
/// None of these are transient: a configuration error aborts construction and
/// a pool exhaustion means the tree sizing invariant was violated.
#[derive(Debug)]
pub enum WorldError {
    /// A world needs at least two stars.
    TooFewStars { count: usize },
    /// Star indices must fit the tree's 32-bit leaf handles.
    TooManyStars { count: usize, max: usize },
    /// A numeric configuration value is out of range or not finite.
    InvalidParameter { name: &'static str, value: f64 },
    /// `workers` was configured as zero.
    ZeroWorkers,
    /// The elapsed time passed to a step was negative or not finite.
    InvalidElapsed(f64),
    /// The tree needed more aggregate nodes than the pool holds.
    NodePoolExhausted { capacity: usize },
    /// The worker threads could not be spawned.
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewStars { count } => {
                write!(f, "a world needs more than one star, got {count}")
            }
            Self::TooManyStars { count, max } => {
                write!(f, "at most {max} stars are supported, got {count}")
            }
            Self::InvalidParameter { name, value } => {
                write!(f, "invalid value {value} for `{name}`")
            }
            Self::ZeroWorkers => write!(f, "worker count must be at least one"),
            Self::InvalidElapsed(elapsed) => {
                write!(f, "elapsed time must be finite and non-negative, got {elapsed}")
            }
            Self::NodePoolExhausted { capacity } => {
                write!(f, "node pool exhausted (capacity {capacity})")
            }
            Self::ThreadPool(err) => write!(f, "failed to start worker pool: {err}"),
        }
    }
}

impl std::error::Error for WorldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ThreadPool(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for WorldError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(err)
    }
}
