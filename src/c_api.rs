use crate::{config::Config, world::World};
use ultraviolet::Vec2;

/// C view of [`Config`]. `workers == 0` picks one worker per logical CPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldConfig {
    pub stars: usize,
    pub gravity: f64,
    pub epsilon: f64,
    pub accuracy: f64,
    pub min_fps: f64,
    pub speed: f64,
    pub galaxy_density: f64,
    pub star_speed: f64,
    pub seed: u64,
    pub workers: usize,
}

impl From<&Config> for WorldConfig {
    fn from(config: &Config) -> Self {
        Self {
            stars: config.stars,
            gravity: config.gravity,
            epsilon: config.epsilon,
            accuracy: config.accuracy,
            min_fps: config.min_fps,
            speed: config.speed,
            galaxy_density: config.galaxy_density,
            star_speed: config.star_speed,
            seed: config.seed,
            workers: config.workers.unwrap_or(0),
        }
    }
}

impl From<&WorldConfig> for Config {
    fn from(config: &WorldConfig) -> Self {
        Self {
            stars: config.stars,
            gravity: config.gravity,
            epsilon: config.epsilon,
            accuracy: config.accuracy,
            min_fps: config.min_fps,
            speed: config.speed,
            galaxy_density: config.galaxy_density,
            star_speed: config.star_speed,
            seed: config.seed,
            workers: (config.workers > 0).then_some(config.workers),
        }
    }
}

fn create(config: Config) -> *mut World {
    match World::new(config) {
        Ok(world) => Box::into_raw(Box::new(world)),
        Err(err) => {
            log::error!("failed to create world: {err}");
            std::ptr::null_mut()
        }
    }
}

/// Default settings, for callers to adjust before [`World_CreateWithConfig`].
#[unsafe(no_mangle)]
pub extern "C" fn World_DefaultConfig() -> WorldConfig {
    WorldConfig::from(&Config::default())
}

/// Creates a world of `stars` stars with default settings.
/// Returns null when the world cannot be created.
#[unsafe(no_mangle)]
pub extern "C" fn World_Create(stars: usize, seed: u64) -> *mut World {
    create(Config {
        stars,
        seed,
        ..Config::default()
    })
}

/// Creates a world from a full configuration.
/// Returns null on a null `config` or when the world cannot be created.
///
/// # Safety
/// `config` must be null or point to a valid `WorldConfig`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_CreateWithConfig(config: *const WorldConfig) -> *mut World {
    match unsafe { config.as_ref() } {
        Some(config) => create(Config::from(config)),
        None => std::ptr::null_mut(),
    }
}

/// Frees a world created by [`World_Create`] or [`World_CreateWithConfig`]. Null is ignored.
///
/// # Safety
/// `handle` must be null or a pointer returned by a create function that was not destroyed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Destroy(handle: *mut World) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)) };
    }
}

/// Advances the world by a frame that took `elapsed` seconds.
/// Returns false on a null handle or a failed step.
///
/// # Safety
/// `handle` must be null or a live world.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Step(handle: *mut World, elapsed: f64) -> bool {
    let Some(world) = (unsafe { handle.as_mut() }) else {
        return false;
    };
    match world.step(elapsed) {
        Ok(_) => true,
        Err(err) => {
            log::error!("World_Step failed: {err}");
            false
        }
    }
}

/// # Safety
/// `handle` must be null or a live world.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_GetStarCount(handle: *const World) -> usize {
    unsafe { handle.as_ref() }.map_or(0, |world| world.stars().len())
}

/// Pointer to `World_GetStarCount` pairs of `f32` `[x, y]` positions.
/// Valid until the next `World_Step` or `World_Destroy`.
///
/// # Safety
/// `handle` must be null or a live world.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_GetPositions(handle: *const World) -> *const Vec2 {
    unsafe { handle.as_ref() }.map_or(std::ptr::null(), |world| world.positions().as_ptr())
}
