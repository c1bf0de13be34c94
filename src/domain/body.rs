// Craft kinematics: explicit Euler integration plus terrain contact resolution.

use super::tuning::LanderTuning;
use std::f64::consts::{PI, TAU};

/// Rotation intent for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RotateIntent {
    Left,
    Right,
    #[default]
    Neutral,
}

/// How a body came to rest on the terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touchdown {
    Landed,
    Crashed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Radians in (-PI, PI], 0 = nose up, positive turns clockwise.
    pub rotation: f64,
    pub fuel: f64,
    pub max_fuel: f64,

    // Terminal flags; at most one is ever set.
    pub crashed: bool,
    pub landed: bool,
}

impl Body {
    pub fn new(x: f64, y: f64, fuel: f64) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            rotation: 0.0,
            fuel,
            max_fuel: fuel,
            crashed: false,
            landed: false,
        }
    }

    /// Spawns a body at the tuned spawn point with the given fuel pool.
    pub fn spawn(tuning: &LanderTuning, fuel: f64) -> Self {
        Self::new(tuning.spawn_x, tuning.spawn_y, fuel)
    }

    pub fn is_terminal(&self) -> bool {
        self.crashed || self.landed
    }

    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    pub fn angle_degrees(&self) -> f64 {
        self.rotation.abs().to_degrees()
    }

    /// Advances the body by `dt` seconds. Terminal bodies are frozen.
    pub fn update(&mut self, dt: f64, thrust: bool, rotate: RotateIntent, tuning: &LanderTuning) {
        if self.is_terminal() {
            return;
        }

        match rotate {
            RotateIntent::Left => self.rotation -= tuning.rotation_speed * dt,
            RotateIntent::Right => self.rotation += tuning.rotation_speed * dt,
            RotateIntent::Neutral => {}
        }
        self.rotation = wrap_angle(self.rotation);

        // Thrust acts along the nose (0 rad = up / -Y).
        if thrust && self.fuel > 0.0 {
            self.vx += self.rotation.sin() * tuning.thrust_power * dt;
            self.vy += -self.rotation.cos() * tuning.thrust_power * dt;
            self.fuel = (self.fuel - tuning.fuel_consumption_rate * dt).max(0.0);
        }

        self.vy += tuning.gravity * dt;

        self.x += self.vx * dt;
        self.y += self.vy * dt;
    }

    /// Resolves contact with the ground below the body.
    ///
    /// Returns the touchdown outcome when this call made the body terminal. Calling it again
    /// on a terminal body changes nothing and returns `None`.
    pub fn check_collision(
        &mut self,
        terrain_height: f64,
        in_landing_zone: bool,
        tuning: &LanderTuning,
    ) -> Option<Touchdown> {
        if self.is_terminal() {
            return None;
        }

        let nose_y = self.y - tuning.nose_offset * self.rotation.cos();
        if self.y < terrain_height && nose_y < terrain_height {
            return None;
        }

        let upright = self.rotation.abs() < tuning.max_landing_angle;
        let gentle = self.speed() < tuning.max_landing_speed;
        self.y = terrain_height;

        if in_landing_zone && upright && gentle {
            self.landed = true;
            self.vx = 0.0;
            self.vy = 0.0;
            Some(Touchdown::Landed)
        } else {
            self.crashed = true;
            Some(Touchdown::Crashed)
        }
    }

    /// Marks the body as crashed (e.g. it left the world horizontally).
    pub fn force_crash(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.crashed = true;
        true
    }
}

/// Wraps an angle into (-PI, PI].
pub fn wrap_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= TAU;
    }
    while angle <= -PI {
        angle += TAU;
    }
    angle
}
