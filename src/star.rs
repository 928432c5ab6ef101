use ultraviolet::DVec2;

/// A point mass in the particle store.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Star {
    /// Position vector.
    pub pos: DVec2,
    /// Velocity vector.
    pub vel: DVec2,
    /// Half-step acceleration from the previous frame, already scaled by `dt * G / 2`.
    pub acc: DVec2,
    /// Mass of the star.
    pub mass: f64,
}

impl Default for Star {
    fn default() -> Self {
        Self::new(DVec2::zero(), DVec2::zero(), 1.0)
    }
}

impl Star {
    /// Creates a new Star. The stored half-step acceleration starts at zero.
    pub fn new(pos: DVec2, vel: DVec2, mass: f64) -> Self {
        Self {
            pos,
            vel,
            acc: DVec2::zero(),
            mass,
        }
    }

    /// Velocity half of the velocity Verlet step.
    ///
    /// `acc` is this frame's acceleration already multiplied by `dt * G / 2`;
    /// the velocity advances by the sum of the previous and the new half steps.
    pub fn kick(&mut self, acc: DVec2) {
        self.vel += self.acc + acc;
        self.acc = acc;
    }

    /// Position half of the velocity Verlet step. Must run after every star was kicked.
    pub fn drift(&mut self, dt: f64) {
        self.pos += (self.vel + self.acc) * dt;
    }
}
