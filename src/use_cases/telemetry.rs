// Pure projections from simulation state to what pilots and spectators see.

use super::types::{SlotId, TelemetryMode};
use crate::domain::{
    Body, Difficulty, LanderTuning, LandingZone, ScoreInput, TerrainProfile, WorldBounds, score,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-session roster projection.
///
/// The shape is fixed when the session is created: solo sessions always produce `Single`,
/// rooms always produce `Multi` (even with one pilot left).
#[derive(Debug, Clone, PartialEq)]
pub enum RosterView<T> {
    Single(T),
    Multi(BTreeMap<SlotId, Crew<T>>),
}

/// One pilot's entry in a multi-pilot view.
#[derive(Debug, Clone, PartialEq)]
pub struct Crew<T> {
    pub name: String,
    pub color: &'static str,
    pub state: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// Where the closest landing zone lies relative to a pilot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneBearing {
    pub x1: f64,
    pub x2: f64,
    pub center_x: f64,
    pub y: f64,
    pub width: f64,
    /// Horizontal distance to the zone center.
    pub distance: f64,
    pub direction: Direction,
}

impl ZoneBearing {
    fn from_zone(zone: &LandingZone, x: f64) -> Self {
        let center = zone.center_x();
        let direction = if center < x {
            Direction::Left
        } else {
            Direction::Right
        };
        Self {
            x1: zone.x1,
            x2: zone.x2,
            center_x: center,
            y: zone.y,
            width: zone.width(),
            distance: (center - x).abs(),
            direction,
        }
    }
}

/// Ballistic estimate assuming no further thrust.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactProjection {
    pub time_to_impact: f64,
    pub impact_speed: f64,
}

/// Extra fields sent when a session runs in advanced telemetry mode.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedReadout {
    pub horizontal_speed: f64,
    pub vertical_speed: f64,
    pub angle_degrees: f64,
    pub over_landing_zone: bool,
    pub speed_safe: bool,
    pub angle_safe: bool,
    /// Score the pilot would get by landing right now.
    pub estimated_score: u32,
    pub projection: Option<ImpactProjection>,
}

/// Per-pilot telemetry payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightReadout {
    pub body: Body,
    pub terrain_height: f64,
    pub altitude: f64,
    pub speed: f64,
    pub thrusting: bool,
    pub nearest_zone: Option<ZoneBearing>,
    pub advanced: Option<AdvancedReadout>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub tick: u64,
    pub elapsed_seconds: f64,
    pub landing_zones: Vec<LandingZone>,
    pub view: RosterView<FlightReadout>,
}

/// Physical constants sent once at game start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constants {
    pub gravity: f64,
    pub thrust_power: f64,
    pub rotation_speed: f64,
    pub fuel_consumption_rate: f64,
    pub max_landing_speed: f64,
    pub max_landing_angle: f64,
    pub world_width: f64,
    pub world_height: f64,
    pub tick_rate: u32,
}

impl Constants {
    pub fn new(tuning: &LanderTuning, world: &WorldBounds, tick_rate: u32) -> Self {
        Self {
            gravity: tuning.gravity,
            thrust_power: tuning.thrust_power,
            rotation_speed: tuning.rotation_speed,
            fuel_consumption_rate: tuning.fuel_consumption_rate,
            max_landing_speed: tuning.max_landing_speed,
            max_landing_angle: tuning.max_landing_angle,
            world_width: world.width,
            world_height: world.height,
            tick_rate,
        }
    }
}

/// Full picture handed to a recipient when a game starts (or a spectator arrives late).
#[derive(Debug, Clone, PartialEq)]
pub struct InitState {
    pub terrain: Arc<TerrainProfile>,
    pub view: RosterView<Body>,
    pub constants: Constants,
    pub difficulty: Difficulty,
    pub telemetry_mode: TelemetryMode,
}

/// Final result for one pilot.
#[derive(Debug, Clone, PartialEq)]
pub struct PilotResult {
    pub name: String,
    pub landed: bool,
    pub crashed: bool,
    pub fuel_remaining: f64,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameOverSummary {
    /// Outcome of the pilot whose touchdown ended the game.
    pub landed: bool,
    pub crashed: bool,
    pub elapsed_seconds: f64,
    pub fuel_remaining: f64,
    pub input_count: u64,
    pub score: u32,
    pub replay_id: Option<String>,
    /// Per-pilot results, present for rooms only.
    pub results: Option<BTreeMap<SlotId, PilotResult>>,
}

/// Context shared by every readout in one tick.
#[derive(Debug, Clone, Copy)]
pub struct ReadoutContext<'a> {
    pub terrain: &'a TerrainProfile,
    pub tuning: &'a LanderTuning,
    pub mode: TelemetryMode,
    pub elapsed_seconds: f64,
}

pub fn readout(body: &Body, thrusting: bool, ctx: &ReadoutContext<'_>) -> FlightReadout {
    let terrain_height = ctx.terrain.height_at(body.x);
    let altitude = terrain_height - body.y;
    let speed = body.speed();
    let nearest_zone = ctx
        .terrain
        .nearest_zone(body.x)
        .map(|zone| ZoneBearing::from_zone(zone, body.x));

    let advanced = match ctx.mode {
        TelemetryMode::Standard => None,
        TelemetryMode::Advanced => {
            let estimate = ScoreInput {
                landed: true,
                crashed: false,
                fuel_remaining: body.fuel,
                fuel_max: body.max_fuel,
                elapsed_seconds: ctx.elapsed_seconds,
                difficulty: ctx.terrain.difficulty,
            };
            Some(AdvancedReadout {
                horizontal_speed: body.vx,
                vertical_speed: body.vy,
                angle_degrees: body.angle_degrees(),
                over_landing_zone: ctx.terrain.zone_at(body.x).is_some(),
                speed_safe: speed < ctx.tuning.max_landing_speed,
                angle_safe: body.rotation.abs() < ctx.tuning.max_landing_angle,
                estimated_score: score(&estimate),
                projection: project_impact(body, altitude, ctx.tuning.gravity),
            })
        }
    };

    FlightReadout {
        body: body.clone(),
        terrain_height,
        altitude,
        speed,
        thrusting: thrusting && body.fuel > 0.0,
        nearest_zone,
        advanced,
    }
}

/// Free-fall time and speed at ground contact, `None` while ascending or when no real root
/// exists.
pub fn project_impact(body: &Body, altitude: f64, gravity: f64) -> Option<ImpactProjection> {
    if body.vy < 0.0 || gravity <= 0.0 {
        return None;
    }
    let discriminant = body.vy * body.vy + 2.0 * gravity * altitude;
    if discriminant < 0.0 {
        return None;
    }
    let time_to_impact = (-body.vy + discriminant.sqrt()) / gravity;
    let impact_vy = body.vy + gravity * time_to_impact;
    Some(ImpactProjection {
        time_to_impact,
        impact_speed: body.vx.hypot(impact_vy),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_terrain() -> TerrainProfile {
        TerrainProfile {
            points: vec![(0.0, 700.0), (1200.0, 700.0)],
            landing_zones: vec![LandingZone {
                x1: 500.0,
                x2: 700.0,
                y: 700.0,
                multiplier: 1.0,
            }],
            width: 1200.0,
            height: 800.0,
            difficulty: Difficulty::Easy,
        }
    }

    fn ctx<'a>(
        terrain: &'a TerrainProfile,
        tuning: &'a LanderTuning,
        mode: TelemetryMode,
    ) -> ReadoutContext<'a> {
        ReadoutContext {
            terrain,
            tuning,
            mode,
            elapsed_seconds: 10.0,
        }
    }

    #[test]
    fn when_mode_is_standard_then_advanced_fields_are_absent() {
        let terrain = flat_terrain();
        let tuning = LanderTuning::default();
        let body = Body::new(600.0, 100.0, 1000.0);

        let r = readout(
            &body,
            false,
            &ctx(&terrain, &tuning, TelemetryMode::Standard),
        );
        assert!(r.advanced.is_none());
        assert_eq!(r.terrain_height, 700.0);
        assert_eq!(r.altitude, 600.0);
    }

    #[test]
    fn when_mode_is_advanced_then_safety_flags_and_estimate_are_filled() {
        let terrain = flat_terrain();
        let tuning = LanderTuning::default();
        let body = Body::new(600.0, 650.0, 1000.0);

        let r = readout(
            &body,
            false,
            &ctx(&terrain, &tuning, TelemetryMode::Advanced),
        );
        let adv = r.advanced.expect("advanced readout");
        assert!(adv.over_landing_zone);
        assert!(adv.speed_safe);
        assert!(adv.angle_safe);
        // Full fuel, inside the grace period, easy tier.
        assert_eq!(adv.estimated_score, 1800);
        assert!(adv.projection.is_some());
    }

    #[test]
    fn when_ascending_then_no_impact_projection_is_given() {
        let mut body = Body::new(600.0, 500.0, 1000.0);
        body.vy = -3.0;
        assert!(project_impact(&body, 200.0, 1.62).is_none());
    }

    #[test]
    fn when_falling_from_rest_then_projection_matches_free_fall() {
        let body = Body::new(600.0, 500.0, 1000.0);
        let g = 1.62;
        let h = 81.0;
        let p = project_impact(&body, h, g).expect("projection");
        assert!((p.time_to_impact - (2.0 * h / g).sqrt()).abs() < 1e-9);
        assert!((p.impact_speed - (2.0 * g * h).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn when_zone_is_to_the_left_then_bearing_points_left() {
        let terrain = flat_terrain();
        let tuning = LanderTuning::default();
        let body = Body::new(900.0, 100.0, 1000.0);

        let r = readout(
            &body,
            false,
            &ctx(&terrain, &tuning, TelemetryMode::Standard),
        );
        let bearing = r.nearest_zone.expect("bearing");
        assert_eq!(bearing.direction, Direction::Left);
        assert_eq!(bearing.distance, 300.0);
        assert_eq!(bearing.width, 200.0);
    }

    #[test]
    fn when_tank_is_empty_then_thrusting_is_reported_off() {
        let terrain = flat_terrain();
        let tuning = LanderTuning::default();
        let body = Body::new(600.0, 100.0, 0.0);

        let r = readout(
            &body,
            true,
            &ctx(&terrain, &tuning, TelemetryMode::Standard),
        );
        assert!(!r.thrusting);
    }
}
