use serde::{Deserialize, Serialize};

/// Dimensions of the playfield. The y axis grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: f64,
    pub height: f64,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
        }
    }
}

impl WorldBounds {
    pub fn contains_x(&self, x: f64) -> bool {
        (0.0..=self.width).contains(&x)
    }
}

/// Named starting-fuel preset, independent of terrain difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelMode {
    #[default]
    Standard,
    Unlimited,
    Limited,
    Challenge,
}

impl FuelMode {
    /// Starting (and maximum) fuel for a body spawned under this mode.
    pub fn starting_fuel(self) -> f64 {
        match self {
            FuelMode::Standard | FuelMode::Unlimited => 1000.0,
            // Roughly 30 seconds of continuous thrust.
            FuelMode::Limited => 300.0,
            // Roughly 15 seconds of continuous thrust.
            FuelMode::Challenge => 150.0,
        }
    }
}
