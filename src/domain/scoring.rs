// Score for a finished (or hypothetically finished) flight.

use super::terrain::Difficulty;

const LANDING_BASE: f64 = 1000.0;
const FUEL_BONUS_MAX: f64 = 500.0;
const TIME_BONUS_MAX: f64 = 300.0;
/// Landings faster than this earn the full time bonus.
const TIME_BONUS_GRACE_SECONDS: f64 = 20.0;
const TIME_BONUS_DECAY_PER_SECOND: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInput {
    pub landed: bool,
    pub crashed: bool,
    pub fuel_remaining: f64,
    pub fuel_max: f64,
    pub elapsed_seconds: f64,
    pub difficulty: Difficulty,
}

/// Pure scoring function; safe to call speculatively ("as if landing now").
pub fn score(input: &ScoreInput) -> u32 {
    if input.crashed || !input.landed {
        return 0;
    }

    let fuel_bonus = if input.fuel_max > 0.0 {
        (input.fuel_remaining / input.fuel_max * FUEL_BONUS_MAX).floor()
    } else {
        0.0
    };
    let time_bonus = (TIME_BONUS_MAX
        - (input.elapsed_seconds - TIME_BONUS_GRACE_SECONDS) * TIME_BONUS_DECAY_PER_SECOND)
        .clamp(0.0, TIME_BONUS_MAX);

    let total = (LANDING_BASE + fuel_bonus + time_bonus) * input.difficulty.score_multiplier();
    total.floor().max(0.0) as u32
}
