// Decimated, quantized flight recordings and their plain/gzip encodings.

use super::body::Body;
use super::terrain::{Difficulty, TerrainProfile};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Keep one frame out of this many calls (half the simulation rate).
const FRAME_DECIMATION: u64 = 2;

#[derive(Debug)]
pub enum ReplayError {
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Json(e) => write!(f, "replay json error: {e}"),
            ReplayError::Io(e) => write!(f, "replay io error: {e}"),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<serde_json::Error> for ReplayError {
    fn from(e: serde_json::Error) -> Self {
        ReplayError::Json(e)
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(e: std::io::Error) -> Self {
        ReplayError::Io(e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanderFrame {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub rotation: f64,
    pub fuel: u32,
    pub crashed: bool,
    pub landed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub lander: LanderFrame,
    pub terrain_height: f64,
    pub altitude: i64,
    pub speed: f64,
    pub thrusting: bool,
}

impl ReplayFrame {
    fn quantize(
        body: &Body,
        terrain_height: f64,
        altitude: f64,
        speed: f64,
        thrusting: bool,
    ) -> Self {
        Self {
            lander: LanderFrame {
                x: round_to(body.x, 1),
                y: round_to(body.y, 1),
                vx: round_to(body.vx, 2),
                vy: round_to(body.vy, 2),
                rotation: round_to(body.rotation, 2),
                fuel: body.fuel.max(0.0).trunc() as u32,
                crashed: body.crashed,
                landed: body.landed,
            },
            terrain_height: round_to(terrain_height, 1),
            altitude: altitude.round() as i64,
            speed: round_to(speed, 1),
            thrusting,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayMetadata {
    pub replay_id: String,
    pub session_id: String,
    pub pilot: String,
    pub difficulty: Difficulty,
    /// Unix seconds.
    pub start_time: f64,
    pub end_time: f64,
    pub terrain: Option<TerrainProfile>,
    pub duration: f64,
    pub landed: bool,
    pub crashed: bool,
    pub fuel_remaining: f64,
    pub inputs: u64,
    pub score: u32,
    pub frame_count: usize,
}

/// Summary frozen into a recording when it is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub replay_id: String,
    pub landed: bool,
    pub crashed: bool,
    pub duration_seconds: f64,
    pub fuel_remaining: f64,
    pub input_count: u64,
    pub score: u32,
}

/// In-progress recording. Finalizing consumes it, so a recording is finalized at most once.
#[derive(Debug)]
pub struct ReplayRecorder {
    session_id: String,
    pilot: String,
    difficulty: Difficulty,
    start_time: f64,
    terrain: Option<TerrainProfile>,
    calls: u64,
    frames: Vec<ReplayFrame>,
}

impl ReplayRecorder {
    pub fn new(
        session_id: impl Into<String>,
        pilot: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            pilot: pilot.into(),
            difficulty,
            start_time: unix_seconds(),
            terrain: None,
            calls: 0,
            frames: Vec::new(),
        }
    }

    /// Stores the terrain once for the whole recording.
    pub fn set_terrain(&mut self, terrain: &TerrainProfile) {
        self.terrain = Some(terrain.clone());
    }

    /// Offers a frame; the recorder keeps every second one.
    pub fn record_frame(
        &mut self,
        body: &Body,
        terrain_height: f64,
        altitude: f64,
        speed: f64,
        thrusting: bool,
    ) {
        self.calls += 1;
        if self.calls % FRAME_DECIMATION != 0 {
            return;
        }
        self.frames.push(ReplayFrame::quantize(
            body,
            terrain_height,
            altitude,
            speed,
            thrusting,
        ));
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn finalize(self, outcome: ReplayOutcome) -> Replay {
        let metadata = ReplayMetadata {
            replay_id: outcome.replay_id,
            session_id: self.session_id,
            pilot: self.pilot,
            difficulty: self.difficulty,
            start_time: self.start_time,
            end_time: unix_seconds(),
            terrain: self.terrain,
            duration: outcome.duration_seconds,
            landed: outcome.landed,
            crashed: outcome.crashed,
            fuel_remaining: outcome.fuel_remaining,
            inputs: outcome.input_count,
            score: outcome.score,
            frame_count: self.frames.len(),
        };
        Replay {
            metadata,
            frames: self.frames,
        }
    }
}

/// A finalized recording, ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    pub metadata: ReplayMetadata,
    pub frames: Vec<ReplayFrame>,
}

impl Replay {
    pub fn id(&self) -> &str {
        &self.metadata.replay_id
    }

    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_compressed(&self) -> Result<Vec<u8>, ReplayError> {
        let json = self.to_json()?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(json.as_bytes())?;
        Ok(encoder.finish()?)
    }

    pub fn from_compressed(bytes: &[u8]) -> Result<Self, ReplayError> {
        let mut json = String::new();
        GzDecoder::new(bytes).read_to_string(&mut json)?;
        Self::from_json(&json)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
