// Gameplay tuning, kept apart from runtime/server configuration.

pub mod lander;
pub mod world;

pub use lander::LanderTuning;
pub use world::{FuelMode, WorldBounds};
