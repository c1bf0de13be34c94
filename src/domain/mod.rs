// Domain layer: core simulation types and rules.

pub mod body;
pub mod replay;
pub mod scoring;
pub mod terrain;
pub mod tuning;

pub use body::{Body, RotateIntent, Touchdown};
pub use replay::{Replay, ReplayError, ReplayOutcome, ReplayRecorder};
pub use scoring::{ScoreInput, score};
pub use terrain::{Difficulty, LandingZone, TerrainGenerator, TerrainProfile};
pub use tuning::{FuelMode, LanderTuning, WorldBounds};
