// Wire protocol DTOs and conversions for public lander server messages.

use crate::domain::{Body, Difficulty, FuelMode, LandingZone, Replay, TerrainProfile};
use crate::use_cases::registry::SessionSummary;
use crate::use_cases::telemetry::{
    AdvancedReadout, Constants, Crew, FlightReadout, GameOverSummary, InitState, PilotResult,
    RosterView, Telemetry, ZoneBearing,
};
use crate::use_cases::{
    InputAction, Outbound, SessionConfig, SessionKind, SlotId, TelemetryMode, types::PilotInfo,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_NAME_CHARS: usize = 24;
const DEFAULT_PILOT_NAME: &str = "Pilot";

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    // Starts a solo game right away.
    Start(SessionOptions),
    // Opens a multiplayer room owned by the sender.
    CreateRoom(SessionOptions),
    JoinRoom {
        room_id: String,
        #[serde(default)]
        player_name: Option<String>,
    },
    Input {
        action: InputActionDto,
    },
    StartGame,
    Ping,
}

/// Session configuration carried by `start` and `create_room`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub difficulty: Difficulty,
    pub telemetry_mode: TelemetryMode,
    pub update_rate: u32,
    pub fuel_mode: FuelMode,
    pub player_name: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            telemetry_mode: TelemetryMode::default(),
            update_rate: 60,
            fuel_mode: FuelMode::default(),
            player_name: None,
        }
    }
}

impl SessionOptions {
    pub fn into_config(self, kind: SessionKind) -> (SessionConfig, String) {
        let config = SessionConfig {
            kind,
            difficulty: self.difficulty,
            fuel_mode: self.fuel_mode,
            telemetry_mode: self.telemetry_mode,
            update_rate: self.update_rate,
            record_replay: true,
        };
        (config, pilot_name(self.player_name))
    }
}

/// Trims and bounds a client-supplied display name.
pub fn pilot_name(raw: Option<String>) -> String {
    let name: String = raw
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_CHARS)
        .collect();
    if name.is_empty() {
        DEFAULT_PILOT_NAME.to_string()
    } else {
        name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputActionDto {
    #[serde(alias = "thrust_on")]
    Thrust,
    ThrustOff,
    RotateLeft,
    RotateRight,
    RotateStop,
}

impl From<InputActionDto> for InputAction {
    fn from(action: InputActionDto) -> Self {
        match action {
            InputActionDto::Thrust => InputAction::ThrustOn,
            InputActionDto::ThrustOff => InputAction::ThrustOff,
            InputActionDto::RotateLeft => InputAction::RotateLeft,
            InputActionDto::RotateRight => InputAction::RotateRight,
            InputActionDto::RotateStop => InputAction::RotateStop,
        }
    }
}

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated { room_id: String, player_id: String },
    RoomJoined { room_id: String, player_id: String },
    PlayerList { players: Vec<PilotDto> },
    PlayerJoined { player: PilotDto },
    PlayerLeft { player: PilotDto },
    Init(InitDto),
    GameStarted,
    Telemetry(TelemetryDto),
    GameOver(GameOverDto),
    Error { message: String },
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

impl From<&Outbound> for ServerMessage {
    fn from(message: &Outbound) -> Self {
        match message {
            Outbound::RoomCreated { room_id, player_id } => ServerMessage::RoomCreated {
                room_id: room_id.to_string(),
                player_id: player_id.to_string(),
            },
            Outbound::RoomJoined { room_id, player_id } => ServerMessage::RoomJoined {
                room_id: room_id.to_string(),
                player_id: player_id.to_string(),
            },
            Outbound::PlayerList(list) => ServerMessage::PlayerList {
                players: list.iter().map(PilotDto::from).collect(),
            },
            Outbound::PlayerJoined(info) => ServerMessage::PlayerJoined {
                player: info.into(),
            },
            Outbound::PlayerLeft(info) => ServerMessage::PlayerLeft {
                player: info.into(),
            },
            Outbound::Init(init) => ServerMessage::Init(init.into()),
            Outbound::GameStarted => ServerMessage::GameStarted,
            Outbound::Telemetry(telemetry) => ServerMessage::Telemetry(telemetry.into()),
            Outbound::GameOver(summary) => ServerMessage::GameOver(summary.into()),
            Outbound::Error(message) => ServerMessage::error(message.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PilotDto {
    pub id: String,
    pub name: String,
    pub color: &'static str,
    pub is_creator: bool,
}

impl From<&PilotInfo> for PilotDto {
    fn from(info: &PilotInfo) -> Self {
        Self {
            id: info.id.to_string(),
            name: info.name.clone(),
            color: info.color,
            is_creator: info.is_creator,
        }
    }
}

/// Lander state as clients draw it.
#[derive(Debug, Clone, Serialize)]
pub struct LanderDto {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub rotation: f64,
    pub fuel: f64,
    pub max_fuel: f64,
    pub crashed: bool,
    pub landed: bool,
}

impl From<&Body> for LanderDto {
    fn from(body: &Body) -> Self {
        Self {
            x: body.x,
            y: body.y,
            vx: body.vx,
            vy: body.vy,
            rotation: body.rotation,
            fuel: body.fuel,
            max_fuel: body.max_fuel,
            crashed: body.crashed,
            landed: body.landed,
        }
    }
}

/// One pilot inside a multi-pilot payload, keyed by slot id.
#[derive(Debug, Clone, Serialize)]
pub struct CrewDto<T> {
    pub name: String,
    pub color: &'static str,
    #[serde(flatten)]
    pub state: T,
}

fn crew_map<T, U>(
    crew: &BTreeMap<SlotId, Crew<T>>,
    mut project: impl FnMut(&T) -> U,
) -> BTreeMap<String, CrewDto<U>> {
    crew.iter()
        .map(|(id, c)| {
            let dto = CrewDto {
                name: c.name.clone(),
                color: c.color,
                state: project(&c.state),
            };
            (id.to_string(), dto)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InitRosterDto {
    Single {
        lander: LanderDto,
    },
    Multi {
        players: BTreeMap<String, CrewDto<LanderDto>>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstantsDto {
    pub gravity: f64,
    pub thrust_power: f64,
    pub rotation_speed: f64,
    pub fuel_consumption_rate: f64,
    pub max_landing_speed: f64,
    pub max_landing_angle: f64,
    pub terrain_width: f64,
    pub terrain_height: f64,
    pub tick_rate: u32,
}

impl From<&Constants> for ConstantsDto {
    fn from(c: &Constants) -> Self {
        Self {
            gravity: c.gravity,
            thrust_power: c.thrust_power,
            rotation_speed: c.rotation_speed,
            fuel_consumption_rate: c.fuel_consumption_rate,
            max_landing_speed: c.max_landing_speed,
            max_landing_angle: c.max_landing_angle,
            terrain_width: c.world_width,
            terrain_height: c.world_height,
            tick_rate: c.tick_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitDto {
    pub terrain: TerrainProfile,
    #[serde(flatten)]
    pub roster: InitRosterDto,
    pub constants: ConstantsDto,
    pub difficulty: Difficulty,
    pub telemetry_mode: TelemetryMode,
}

impl From<&InitState> for InitDto {
    fn from(init: &InitState) -> Self {
        let roster = match &init.view {
            RosterView::Single(body) => InitRosterDto::Single {
                lander: body.into(),
            },
            RosterView::Multi(crew) => InitRosterDto::Multi {
                players: crew_map(crew, |body| LanderDto::from(body)),
            },
        };
        Self {
            terrain: init.terrain.as_ref().clone(),
            roster,
            constants: (&init.constants).into(),
            difficulty: init.difficulty,
            telemetry_mode: init.telemetry_mode,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneDto {
    pub x1: f64,
    pub x2: f64,
    pub center_x: f64,
    pub y: f64,
    pub width: f64,
    pub distance: f64,
    pub direction: &'static str,
}

impl From<&ZoneBearing> for ZoneDto {
    fn from(z: &ZoneBearing) -> Self {
        Self {
            x1: z.x1,
            x2: z.x2,
            center_x: z.center_x,
            y: z.y,
            width: z.width,
            distance: z.distance,
            direction: z.direction.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvancedDto {
    pub horizontal_speed: f64,
    pub vertical_speed: f64,
    pub angle_degrees: f64,
    pub is_over_landing_zone: bool,
    pub speed_safe: bool,
    pub angle_safe: bool,
    pub estimated_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_impact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_speed: Option<f64>,
}

impl From<&AdvancedReadout> for AdvancedDto {
    fn from(a: &AdvancedReadout) -> Self {
        Self {
            horizontal_speed: a.horizontal_speed,
            vertical_speed: a.vertical_speed,
            angle_degrees: a.angle_degrees,
            is_over_landing_zone: a.over_landing_zone,
            speed_safe: a.speed_safe,
            angle_safe: a.angle_safe,
            estimated_score: a.estimated_score,
            time_to_impact: a.projection.map(|p| p.time_to_impact),
            impact_speed: a.projection.map(|p| p.impact_speed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadoutDto {
    pub lander: LanderDto,
    pub terrain_height: f64,
    pub altitude: f64,
    pub speed: f64,
    pub thrusting: bool,
    pub nearest_landing_zone: Option<ZoneDto>,
    #[serde(flatten)]
    pub advanced: Option<AdvancedDto>,
}

impl From<&FlightReadout> for ReadoutDto {
    fn from(r: &FlightReadout) -> Self {
        Self {
            lander: (&r.body).into(),
            terrain_height: r.terrain_height,
            altitude: r.altitude,
            speed: r.speed,
            thrusting: r.thrusting,
            nearest_landing_zone: r.nearest_zone.as_ref().map(ZoneDto::from),
            advanced: r.advanced.as_ref().map(AdvancedDto::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TelemetryRosterDto {
    Single(ReadoutDto),
    Multi {
        players: BTreeMap<String, CrewDto<ReadoutDto>>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryDto {
    pub tick: u64,
    pub elapsed_seconds: f64,
    pub all_landing_zones: Vec<LandingZone>,
    #[serde(flatten)]
    pub roster: TelemetryRosterDto,
}

impl From<&Telemetry> for TelemetryDto {
    fn from(t: &Telemetry) -> Self {
        let roster = match &t.view {
            RosterView::Single(readout) => TelemetryRosterDto::Single(readout.into()),
            RosterView::Multi(crew) => TelemetryRosterDto::Multi {
                players: crew_map(crew, |readout| ReadoutDto::from(readout)),
            },
        };
        Self {
            tick: t.tick,
            elapsed_seconds: t.elapsed_seconds,
            all_landing_zones: t.landing_zones.clone(),
            roster,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultDto {
    pub name: String,
    pub landed: bool,
    pub crashed: bool,
    pub fuel_remaining: f64,
    pub score: u32,
}

impl From<&PilotResult> for ResultDto {
    fn from(r: &PilotResult) -> Self {
        Self {
            name: r.name.clone(),
            landed: r.landed,
            crashed: r.crashed,
            fuel_remaining: r.fuel_remaining,
            score: r.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GameOverDto {
    pub landed: bool,
    pub crashed: bool,
    pub elapsed_seconds: f64,
    pub fuel_remaining: f64,
    pub input_count: u64,
    pub score: u32,
    pub replay_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<BTreeMap<String, ResultDto>>,
}

impl From<&GameOverSummary> for GameOverDto {
    fn from(s: &GameOverSummary) -> Self {
        Self {
            landed: s.landed,
            crashed: s.crashed,
            elapsed_seconds: s.elapsed_seconds,
            fuel_remaining: s.fuel_remaining,
            input_count: s.input_count,
            score: s.score,
            replay_id: s.replay_id.clone(),
            results: s.results.as_ref().map(|results| {
                results
                    .iter()
                    .map(|(id, r)| (id.to_string(), ResultDto::from(r)))
                    .collect()
            }),
        }
    }
}

/// Health probe payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub sessions: usize,
    pub replays: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameListDto {
    pub games: Vec<GameSummaryDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSummaryDto {
    pub session_id: String,
    pub kind: &'static str,
    pub difficulty: Difficulty,
    pub phase: &'static str,
    pub players: usize,
    pub spectators: usize,
    /// Seconds since the game started; 0 while waiting.
    pub duration: f64,
}

impl From<&SessionSummary> for GameSummaryDto {
    fn from(s: &SessionSummary) -> Self {
        Self {
            session_id: s.session_id.clone(),
            kind: match s.kind {
                SessionKind::Solo => "solo",
                SessionKind::Room => "room",
            },
            difficulty: s.difficulty,
            phase: s.phase.as_str(),
            players: s.players,
            spectators: s.spectators,
            duration: s.running_for.map(|d| d.as_secs_f64()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayListDto {
    pub replays: Vec<ReplaySummaryDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummaryDto {
    pub replay_id: String,
    pub pilot: String,
    pub difficulty: Difficulty,
    pub duration: f64,
    pub landed: bool,
    pub crashed: bool,
    pub score: u32,
    pub frame_count: usize,
    /// Unix seconds when the recording started.
    pub timestamp: f64,
}

impl From<&Replay> for ReplaySummaryDto {
    fn from(replay: &Replay) -> Self {
        let m = &replay.metadata;
        Self {
            replay_id: m.replay_id.clone(),
            pilot: m.pilot.clone(),
            difficulty: m.difficulty,
            duration: m.duration,
            landed: m.landed,
            crashed: m.crashed,
            score: m.score,
            frame_count: m.frame_count,
            timestamp: m.start_time,
        }
    }
}
