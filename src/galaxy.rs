use crate::{config::Config, star::Star};
use ultraviolet::DVec2;

/// Lightest and heaviest initial star mass.
pub const MASS_RANGE: (f64, f64) = (1.0, 10.0);

/// Generates `config.stars` stars spread over a rotating disc.
/// - Radius is uniform up to `sqrt(stars) / galaxy_density`, angle uniform.
/// - Velocity is tangential (clockwise) with magnitude `star_speed * r^0.25`.
/// - Masses are uniform in [`MASS_RANGE`].
///
/// The result is sorted by ascending mass so that the tree sums small masses
/// before large ones.
pub fn uniform_disc(config: &Config) -> Vec<Star> {
    let mut rng = fastrand::Rng::with_seed(config.seed);
    let r_max = (config.stars as f64).sqrt() / config.galaxy_density;

    let mut stars: Vec<Star> = (0..config.stars)
        .map(|_| {
            let r = rng.f64() * r_max;
            let a = rng.f64() * std::f64::consts::TAU;
            let (sin, cos) = a.sin_cos();

            let pos = DVec2::new(cos, sin) * r;
            let vel = DVec2::new(sin, -cos) * (config.star_speed * r.powf(0.25));
            let mass = MASS_RANGE.0 + rng.f64() * (MASS_RANGE.1 - MASS_RANGE.0);

            Star::new(pos, vel, mass)
        })
        .collect();

    stars.sort_by(|a, b| a.mass.total_cmp(&b.mass));
    stars
}
