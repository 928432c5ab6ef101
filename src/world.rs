use std::time::{Duration, Instant};

use ultraviolet::Vec2;

use crate::{
    config::Config,
    error::WorldError,
    galaxy,
    quadtree::Quadtree,
    scheduler::WorkerPool,
    star::Star,
};

/// Timings and tree figures of the most recent step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepStats {
    /// Steps completed so far, this one included.
    pub frame: usize,
    /// Integration timestep after clamping and speed scaling.
    pub frame_time: f64,
    /// Time spent building the quadtree.
    pub build: Duration,
    /// Time spent evaluating forces and integrating.
    pub accel: Duration,
    /// Aggregate nodes the tree used.
    pub nodes: usize,
    /// Mass recorded at the tree root.
    pub root_mass: f64,
}

/// Owns the whole simulation state: stars, node pool, workers and the render buffer.
///
/// Dropping a world stops and joins its workers.
#[derive(Debug)]
pub struct World {
    config: Config,
    /// Particle store, never resized or reordered after creation.
    stars: Vec<Star>,
    quadtree: Quadtree,
    pool: WorkerPool,
    /// Single-precision positions for the renderer, index-aligned with `stars`.
    positions: Vec<Vec2>,
    stats: StepStats,
}

impl World {
    /// Creates a world with a generated galaxy disc.
    pub fn new(config: Config) -> Result<Self, WorldError> {
        config.validate()?;
        let stars = galaxy::uniform_disc(&config);
        Self::with_stars(config, stars)
    }

    /// Creates a world from the given stars. `config.stars` is replaced by their count.
    pub fn with_stars(mut config: Config, stars: Vec<Star>) -> Result<Self, WorldError> {
        config.stars = stars.len();
        config.validate()?;

        let pool = WorkerPool::new(config.worker_count())?;
        let quadtree = Quadtree::new(stars.len(), config.accuracy, config.epsilon);
        let positions = stars.iter().map(to_render).collect();

        log::info!(
            "created world with {} stars on {} workers",
            stars.len(),
            pool.workers()
        );

        Ok(Self {
            config,
            stars,
            quadtree,
            pool,
            positions,
            stats: StepStats::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Positions written by the last step (the initial ones before any step).
    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn stats(&self) -> &StepStats {
        &self.stats
    }

    pub fn frame(&self) -> usize {
        self.stats.frame
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Advances the simulation by one frame that took `elapsed` seconds.
    ///
    /// 1. Builds the quadtree over the current positions.
    /// 2. Evaluates every star's acceleration and kicks its velocity, on the workers.
    /// 3. Drifts every position once all kicks are done.
    /// 4. Publishes the positions and empties the node pool.
    pub fn step(&mut self, elapsed: f64) -> Result<&[Vec2], WorldError> {
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(WorldError::InvalidElapsed(elapsed));
        }
        let frame_time = self.config.frame_time(elapsed);

        let started = Instant::now();
        if let Err(err) = self.quadtree.build(&self.stars) {
            self.quadtree.clear();
            return Err(err);
        }
        let build = started.elapsed();

        let started = Instant::now();
        self.attract(frame_time);
        for star in &mut self.stars {
            star.drift(frame_time);
        }
        let accel = started.elapsed();

        for (position, star) in self.positions.iter_mut().zip(&self.stars) {
            *position = to_render(star);
        }

        self.stats = StepStats {
            frame: self.stats.frame + 1,
            frame_time,
            build,
            accel,
            nodes: self.quadtree.len(),
            root_mass: self.quadtree.root().map_or(0.0, |root| root.mass),
        };
        log::debug!("{:?}", self.stats);

        self.quadtree.clear();
        Ok(&self.positions)
    }

    /// Kicks every star with the tree's acceleration, one partition per worker.
    fn attract(&mut self, frame_time: f64) {
        let scale = frame_time * self.config.gravity / 2.0;
        let quadtree = &self.quadtree;

        self.pool.run(&mut self.stars, |range, stars| {
            for (index, star) in range.zip(stars.iter_mut()) {
                star.kick(quadtree.acc(index, star.pos) * scale);
            }
        });
    }
}

impl Drop for World {
    fn drop(&mut self) {
        log::info!(
            "tearing down world with {} stars after {} frames",
            self.stars.len(),
            self.stats.frame
        );
    }
}

fn to_render(star: &Star) -> Vec2 {
    Vec2::new(star.pos.x as f32, star.pos.y as f32)
}
