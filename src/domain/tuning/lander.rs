/// Gameplay tuning for the landing craft.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanderTuning {
    /// Downward acceleration in units per second squared (lunar gravity).
    pub gravity: f64,

    /// Acceleration applied along the nose direction while thrusting.
    pub thrust_power: f64,

    /// Rotation speed in radians per second.
    pub rotation_speed: f64,

    /// Fuel burned per second of thrust.
    pub fuel_consumption_rate: f64,

    /// Touchdown speed must stay strictly below this to count as a landing.
    pub max_landing_speed: f64,

    /// Touchdown tilt (absolute radians) must stay strictly below this (~17 degrees).
    pub max_landing_angle: f64,

    /// Distance from the craft origin to its nose, used for nose-first contact.
    pub nose_offset: f64,

    /// Spawn position for new bodies.
    pub spawn_x: f64,
    pub spawn_y: f64,
}

impl Default for LanderTuning {
    fn default() -> Self {
        Self {
            gravity: 1.62,
            thrust_power: 8.0,
            rotation_speed: 3.0,
            fuel_consumption_rate: 10.0,
            max_landing_speed: 5.0,
            max_landing_angle: 0.3,
            nose_offset: 30.0,
            spawn_x: 600.0,
            spawn_y: 100.0,
        }
    }
}
