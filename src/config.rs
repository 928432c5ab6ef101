use serde::{Deserialize, Serialize};

use crate::error::WorldError;

/// Static simulation settings, read-only once a world is created.
///
/// Every field has a default, so a YAML document only needs to name the values
/// it overrides:
///
/// ```yaml
/// stars: 20000
/// accuracy: 1.5
/// workers: 4
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of stars, must be greater than one.
    pub stars: usize,
    /// Gravitational constant.
    pub gravity: f64,
    /// Softening term added to the squared distance.
    pub epsilon: f64,
    /// Opening-angle threshold: a node is summarized when `distance > size * accuracy`.
    pub accuracy: f64,
    /// Frames slower than this are integrated as if they ran at this rate.
    pub min_fps: f64,
    /// Global time multiplier.
    pub speed: f64,
    /// Initial disk radius is `sqrt(stars) / galaxy_density`.
    pub galaxy_density: f64,
    /// Initial tangential speed scale.
    pub star_speed: f64,
    /// Seed for the initial distribution.
    pub seed: u64,
    /// Worker threads, one per logical CPU when unset.
    pub workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stars: Self::DEFAULT_STARS,
            gravity: 1.0,
            epsilon: 1.0,
            accuracy: 2.0,
            min_fps: 10.0,
            speed: 1.0,
            galaxy_density: 1.0,
            star_speed: 5.0,
            seed: 0,
            workers: None,
        }
    }
}

impl Config {
    pub const DEFAULT_STARS: usize = 10_000;
    /// Largest star count the tree can index; `u32::MAX` marks the end of a leaf bucket.
    pub const MAX_STARS: usize = (u32::MAX - 1) as usize;

    /// Checks every precondition a world relies on.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.stars <= 1 {
            return Err(WorldError::TooFewStars { count: self.stars });
        }
        if self.stars > Self::MAX_STARS {
            return Err(WorldError::TooManyStars {
                count: self.stars,
                max: Self::MAX_STARS,
            });
        }
        if self.workers == Some(0) {
            return Err(WorldError::ZeroWorkers);
        }

        let finite = [
            ("gravity", self.gravity),
            ("speed", self.speed),
            ("star_speed", self.star_speed),
        ];
        let non_negative = [("epsilon", self.epsilon), ("accuracy", self.accuracy)];
        let positive = [
            ("min_fps", self.min_fps),
            ("galaxy_density", self.galaxy_density),
        ];

        let invalid = finite
            .into_iter()
            .find(|(_, value)| !value.is_finite())
            .or_else(|| {
                non_negative
                    .into_iter()
                    .find(|(_, value)| !value.is_finite() || *value < 0.0)
            })
            .or_else(|| {
                positive
                    .into_iter()
                    .find(|(_, value)| !value.is_finite() || *value <= 0.0)
            });

        match invalid {
            Some((name, value)) => Err(WorldError::InvalidParameter { name, value }),
            None => Ok(()),
        }
    }

    /// Number of workers to run, resolving the per-CPU default.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Integration timestep for a frame that took `elapsed` seconds.
    /// Slow frames are capped at `1 / min_fps` before the speed multiplier applies.
    pub fn frame_time(&self, elapsed: f64) -> f64 {
        elapsed.min(1.0 / self.min_fps) * self.speed
    }
}
