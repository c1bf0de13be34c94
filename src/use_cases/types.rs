// Use-case level inputs/outputs for the session loop.

use super::telemetry::{GameOverSummary, InitState, Telemetry};
use crate::domain::RotateIntent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Identifier of a player slot, unique within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub type SpectatorId = u64;

/// Per-recipient outbound channel. Each connection drains its own.
pub type Outbox = mpsc::Sender<Arc<Outbound>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Single pilot, starts running immediately.
    Solo,
    /// Multiplayer room, waits for the creator to start it.
    Room,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Waiting,
    Running,
    Over,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Waiting => "waiting",
            SessionPhase::Running => "running",
            SessionPhase::Over => "over",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryMode {
    #[default]
    Standard,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    ThrustOn,
    ThrustOff,
    RotateLeft,
    RotateRight,
    RotateStop,
}

const ROTATE_NEUTRAL: u8 = 0;
const ROTATE_LEFT: u8 = 1;
const ROTATE_RIGHT: u8 = 2;

/// Current control intent of one slot.
///
/// Written by the slot's connection reader, read by the session tick. Each axis is a single
/// scalar, so the latest write per axis wins and nothing is queued.
#[derive(Debug)]
pub struct SlotIntent {
    thrust: AtomicBool,
    rotate: AtomicU8,
    // Session-wide input counter shared by every slot.
    inputs: Arc<AtomicU64>,
}

impl SlotIntent {
    pub fn new(inputs: Arc<AtomicU64>) -> Self {
        Self {
            thrust: AtomicBool::new(false),
            rotate: AtomicU8::new(ROTATE_NEUTRAL),
            inputs,
        }
    }

    pub fn apply(&self, action: InputAction) {
        self.inputs.fetch_add(1, Ordering::Relaxed);
        match action {
            InputAction::ThrustOn => self.thrust.store(true, Ordering::Relaxed),
            InputAction::ThrustOff => self.thrust.store(false, Ordering::Relaxed),
            InputAction::RotateLeft => self.rotate.store(ROTATE_LEFT, Ordering::Relaxed),
            InputAction::RotateRight => self.rotate.store(ROTATE_RIGHT, Ordering::Relaxed),
            InputAction::RotateStop => self.rotate.store(ROTATE_NEUTRAL, Ordering::Relaxed),
        }
    }

    pub fn thrust(&self) -> bool {
        self.thrust.load(Ordering::Relaxed)
    }

    pub fn rotate(&self) -> RotateIntent {
        match self.rotate.load(Ordering::Relaxed) {
            ROTATE_LEFT => RotateIntent::Left,
            ROTATE_RIGHT => RotateIntent::Right,
            _ => RotateIntent::Neutral,
        }
    }
}

/// Public roster entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PilotInfo {
    pub id: SlotId,
    pub name: String,
    pub color: &'static str,
    pub is_creator: bool,
}

/// Messages a session emits towards players and spectators.
#[derive(Debug, Clone)]
pub enum Outbound {
    RoomCreated {
        room_id: Arc<str>,
        player_id: SlotId,
    },
    RoomJoined {
        room_id: Arc<str>,
        player_id: SlotId,
    },
    PlayerList(Vec<PilotInfo>),
    PlayerJoined(PilotInfo),
    PlayerLeft(PilotInfo),
    Init(InitState),
    GameStarted,
    Telemetry(Telemetry),
    GameOver(GameOverSummary),
    Error(String),
}

/// Handed to a connection once its slot exists.
#[derive(Debug, Clone)]
pub struct JoinTicket {
    pub session_id: Arc<str>,
    pub slot_id: SlotId,
    pub intent: Arc<SlotIntent>,
}

/// Reasons a join or spectate request is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    NotFound,
    RoomFull,
    SpectatorsFull,
    AlreadyStarted,
    SessionUnavailable,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AdmissionError::NotFound => "game session not found",
            AdmissionError::RoomFull => "room is full",
            AdmissionError::SpectatorsFull => "spectator limit reached",
            AdmissionError::AlreadyStarted => "game already in progress",
            AdmissionError::SessionUnavailable => "game session is no longer available",
        };
        f.write_str(msg)
    }
}

/// Commands the connection layer sends into a session task.
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        name: String,
        outbox: Outbox,
        reply: oneshot::Sender<Result<JoinTicket, AdmissionError>>,
    },
    Spectate {
        outbox: Outbox,
        reply: oneshot::Sender<Result<SpectatorId, AdmissionError>>,
    },
    Leave {
        slot_id: SlotId,
    },
    StopWatching {
        spectator_id: SpectatorId,
    },
    Start {
        slot_id: SlotId,
    },
    Shutdown,
}

/// Snapshot of a session published for the registry (listing and sweeping).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub players: usize,
    pub spectators: usize,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Waiting,
            players: 0,
            spectators: 0,
            started_at: None,
            ended_at: None,
        }
    }
}
