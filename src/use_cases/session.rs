// Authoritative session state and the task that drives it at a fixed tick.

use super::telemetry::{
    Constants, Crew, GameOverSummary, InitState, PilotResult, ReadoutContext, RosterView,
    Telemetry, readout,
};
use super::types::{
    AdmissionError, JoinTicket, Outbound, Outbox, PilotInfo, SessionCommand, SessionKind,
    SessionPhase, SessionStatus, SlotId, SlotIntent, SpectatorId, TelemetryMode,
};
use crate::domain::{
    Body, Difficulty, FuelMode, LanderTuning, Replay, ReplayOutcome, ReplayRecorder, ScoreInput,
    TerrainProfile, WorldBounds, score,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub const MIN_UPDATE_RATE: u32 = 2;
pub const MAX_UPDATE_RATE: u32 = 60;

/// Spectators receive telemetry on every n-th tick.
const SPECTATOR_EVERY: u64 = 2;

pub const PALETTE: [&str; 8] = [
    "#00ff88", "#ff6b6b", "#4ecdc4", "#ffd93d", "#a29bfe", "#fd79a8", "#74b9ff", "#fab1a0",
];

/// Per-session choices made by the creator.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub kind: SessionKind,
    pub difficulty: Difficulty,
    pub fuel_mode: FuelMode,
    pub telemetry_mode: TelemetryMode,
    /// Requested player telemetry rate in Hz; clamped to [2, 60].
    pub update_rate: u32,
    pub record_replay: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            kind: SessionKind::Solo,
            difficulty: Difficulty::default(),
            fuel_mode: FuelMode::default(),
            telemetry_mode: TelemetryMode::default(),
            update_rate: MAX_UPDATE_RATE,
            record_replay: true,
        }
    }
}

/// Server-wide rules every session runs under.
#[derive(Debug, Clone, Copy)]
pub struct SessionRules {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    pub max_players: usize,
    pub max_spectators: usize,
    pub tuning: LanderTuning,
    pub world: WorldBounds,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_players: 8,
            max_spectators: 16,
            tuning: LanderTuning::default(),
            world: WorldBounds::default(),
        }
    }
}

/// Whether the owning task should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Players,
    Spectators,
    Everyone,
}

impl Audience {
    fn players(self) -> bool {
        matches!(self, Audience::Players | Audience::Everyone)
    }

    fn spectators(self) -> bool {
        matches!(self, Audience::Spectators | Audience::Everyone)
    }
}

#[derive(Debug)]
struct PlayerSlot {
    id: SlotId,
    name: String,
    color: &'static str,
    intent: Arc<SlotIntent>,
    outbox: Outbox,
    body: Body,
    thrusting: bool,
}

#[derive(Debug)]
struct Watcher {
    id: SpectatorId,
    outbox: Outbox,
}

/// One game: a roster of pilots over a shared terrain.
///
/// Owned exclusively by its session task; connections only reach it through
/// [`SessionCommand`]s and their own [`SlotIntent`].
#[derive(Debug)]
pub struct Session {
    id: Arc<str>,
    config: SessionConfig,
    rules: SessionRules,
    terrain: Arc<TerrainProfile>,
    roster: Vec<PlayerSlot>,
    /// Creator of the session; only this slot may start it.
    primary: Option<SlotId>,
    spectators: Vec<Watcher>,
    phase: SessionPhase,
    ticks: u64,
    player_every: u64,
    next_slot: u64,
    next_spectator: SpectatorId,
    inputs: Arc<AtomicU64>,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
    recorder: Option<ReplayRecorder>,
    replay: Option<Replay>,
}

impl Session {
    /// Creates the session with its creator already seated.
    ///
    /// Solo sessions start immediately; rooms wait for the creator to start them.
    pub fn new(
        id: Arc<str>,
        config: SessionConfig,
        rules: SessionRules,
        terrain: TerrainProfile,
        creator_name: String,
        creator_outbox: Outbox,
    ) -> (Self, JoinTicket) {
        let update_rate = config.update_rate.clamp(MIN_UPDATE_RATE, MAX_UPDATE_RATE);
        let player_every = (f64::from(rules.tick_rate) / f64::from(update_rate))
            .round()
            .max(1.0) as u64;

        let mut session = Self {
            id,
            config,
            rules,
            terrain: Arc::new(terrain),
            roster: Vec::new(),
            primary: None,
            spectators: Vec::new(),
            phase: SessionPhase::Waiting,
            ticks: 0,
            player_every,
            next_slot: 0,
            next_spectator: 0,
            inputs: Arc::new(AtomicU64::new(0)),
            started_at: None,
            ended_at: None,
            recorder: None,
            replay: None,
        };

        let ticket = session.admit(creator_name, creator_outbox);
        session.primary = Some(ticket.slot_id);
        match session.config.kind {
            SessionKind::Solo => {
                session.begin();
            }
            SessionKind::Room => {
                let room_id = Arc::clone(&session.id);
                session.send_to(
                    ticket.slot_id,
                    Outbound::RoomCreated {
                        room_id,
                        player_id: ticket.slot_id,
                    },
                );
                session.broadcast_roster();
            }
        }
        (session, ticket)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.phase,
            players: self.roster.len(),
            spectators: self.spectators.len(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }

    /// Finalized recording, available once the game is over.
    pub fn take_replay(&mut self) -> Option<Replay> {
        self.replay.take()
    }

    pub fn handle(&mut self, command: SessionCommand) -> Flow {
        match command {
            SessionCommand::Join {
                name,
                outbox,
                reply,
            } => {
                let result = self.join(name, outbox);
                // Requester went away before the reply; release the seat again.
                if let Err(Ok(ticket)) = reply.send(result) {
                    self.remove_slot(ticket.slot_id);
                }
            }
            SessionCommand::Spectate { outbox, reply } => {
                let result = self.spectate(outbox);
                if let Err(Ok(spectator_id)) = reply.send(result) {
                    self.spectators.retain(|w| w.id != spectator_id);
                }
            }
            SessionCommand::Leave { slot_id } => {
                if self.remove_slot(slot_id) {
                    info!(%slot_id, players = self.roster.len(), "player left");
                }
            }
            SessionCommand::StopWatching { spectator_id } => {
                self.spectators.retain(|w| w.id != spectator_id);
                debug!(spectator_id, "spectator left");
            }
            SessionCommand::Start { slot_id } => self.start(slot_id),
            SessionCommand::Shutdown => return Flow::Stop,
        }

        if self.roster.is_empty() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Advances every active pilot by one tick, then resolves the end of the game or fans
    /// telemetry out on cadence.
    pub fn step(&mut self) -> Flow {
        match self.phase {
            SessionPhase::Waiting => return Flow::Continue,
            SessionPhase::Over => return Flow::Stop,
            SessionPhase::Running => {}
        }

        self.ticks += 1;
        let dt = self.dt();
        let mut decided: Option<SlotId> = None;

        for slot in &mut self.roster {
            if slot.body.is_terminal() {
                continue;
            }
            let thrust = slot.intent.thrust();
            slot.thrusting = thrust && slot.body.fuel > 0.0;
            slot.body
                .update(dt, thrust, slot.intent.rotate(), &self.rules.tuning);

            let ground = self.terrain.height_at(slot.body.x);
            let in_zone = self.terrain.zone_at(slot.body.x).is_some();
            let touchdown = slot.body.check_collision(ground, in_zone, &self.rules.tuning);
            let escaped = !self.rules.world.contains_x(slot.body.x) && slot.body.force_crash();

            if touchdown.is_some() || escaped {
                info!(slot_id = %slot.id, ?touchdown, escaped, "pilot finished");
                decided.get_or_insert(slot.id);
            }
        }

        if let Some(recorder) = self.recorder.as_mut() {
            let primary = self
                .primary
                .and_then(|id| self.roster.iter().find(|s| s.id == id));
            if let Some(slot) = primary {
                let ground = self.terrain.height_at(slot.body.x);
                recorder.record_frame(
                    &slot.body,
                    ground,
                    ground - slot.body.y,
                    slot.body.speed(),
                    slot.thrusting,
                );
            }
        }

        if let Some(slot_id) = decided {
            self.finish(slot_id);
            return Flow::Stop;
        }

        self.fan_out();
        if self.roster.is_empty() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn dt(&self) -> f64 {
        1.0 / f64::from(self.rules.tick_rate.max(1))
    }

    /// Simulated time, independent of wall-clock jitter.
    fn elapsed_seconds(&self) -> f64 {
        self.ticks as f64 * self.dt()
    }

    fn admit(&mut self, name: String, outbox: Outbox) -> JoinTicket {
        self.next_slot += 1;
        let slot_id = SlotId(self.next_slot);
        let intent = Arc::new(SlotIntent::new(Arc::clone(&self.inputs)));
        let color = self.free_color();
        let body = Body::spawn(&self.rules.tuning, self.config.fuel_mode.starting_fuel());

        self.roster.push(PlayerSlot {
            id: slot_id,
            name,
            color,
            intent: Arc::clone(&intent),
            outbox,
            body,
            thrusting: false,
        });

        JoinTicket {
            session_id: Arc::clone(&self.id),
            slot_id,
            intent,
        }
    }

    fn free_color(&self) -> &'static str {
        PALETTE
            .iter()
            .copied()
            .find(|c| self.roster.iter().all(|s| s.color != *c))
            .unwrap_or(PALETTE[self.roster.len() % PALETTE.len()])
    }

    fn join(&mut self, name: String, outbox: Outbox) -> Result<JoinTicket, AdmissionError> {
        if self.phase != SessionPhase::Waiting {
            return Err(AdmissionError::AlreadyStarted);
        }
        if self.roster.len() >= self.rules.max_players {
            return Err(AdmissionError::RoomFull);
        }

        let ticket = self.admit(name, outbox);
        info!(slot_id = %ticket.slot_id, players = self.roster.len(), "player joined");

        let room_id = Arc::clone(&self.id);
        self.send_to(
            ticket.slot_id,
            Outbound::RoomJoined {
                room_id,
                player_id: ticket.slot_id,
            },
        );
        if let Some(info) = self.pilot_info(ticket.slot_id) {
            self.broadcast(Outbound::PlayerJoined(info), Audience::Everyone);
        }
        self.broadcast_roster();
        if !self.roster.iter().any(|s| s.id == ticket.slot_id) {
            // Evicted while taking its own welcome messages.
            return Err(AdmissionError::SessionUnavailable);
        }
        Ok(ticket)
    }

    fn spectate(&mut self, outbox: Outbox) -> Result<SpectatorId, AdmissionError> {
        if self.phase == SessionPhase::Over {
            return Err(AdmissionError::SessionUnavailable);
        }
        if self.spectators.len() >= self.rules.max_spectators {
            return Err(AdmissionError::SpectatorsFull);
        }

        let welcome = match self.phase {
            SessionPhase::Running => self.init_state().map(Outbound::Init),
            _ => Some(Outbound::PlayerList(self.pilot_list())),
        };
        if let Some(message) = welcome {
            if outbox.try_send(Arc::new(message)).is_err() {
                return Err(AdmissionError::SessionUnavailable);
            }
        }

        self.next_spectator += 1;
        let spectator_id = self.next_spectator;
        self.spectators.push(Watcher {
            id: spectator_id,
            outbox,
        });
        debug!(spectator_id, spectators = self.spectators.len(), "spectator joined");
        Ok(spectator_id)
    }

    fn start(&mut self, by: SlotId) {
        if self.primary != Some(by) {
            self.send_to(
                by,
                Outbound::Error("only the room creator can start the game".to_string()),
            );
            return;
        }
        if !self.begin() {
            debug!(phase = self.phase.as_str(), "start ignored");
        }
    }

    /// Moves a waiting session to running. Returns false in any other phase.
    fn begin(&mut self) -> bool {
        if self.phase != SessionPhase::Waiting {
            return false;
        }
        self.phase = SessionPhase::Running;
        self.started_at = Some(Instant::now());

        if self.config.record_replay {
            let pilot = self
                .primary_slot()
                .map(|s| s.name.clone())
                .unwrap_or_default();
            let mut recorder =
                ReplayRecorder::new(self.id.to_string(), pilot, self.config.difficulty);
            recorder.set_terrain(&self.terrain);
            self.recorder = Some(recorder);
        }

        info!(
            players = self.roster.len(),
            difficulty = self.config.difficulty.as_str(),
            "game started"
        );
        if let Some(init) = self.init_state() {
            self.broadcast(Outbound::Init(init), Audience::Everyone);
        }
        self.broadcast(Outbound::GameStarted, Audience::Everyone);
        true
    }

    fn finish(&mut self, deciding: SlotId) {
        self.phase = SessionPhase::Over;
        self.ended_at = Some(Instant::now());

        let elapsed = self.elapsed_seconds();
        let input_count = self.inputs.load(Ordering::Relaxed);
        let difficulty = self.config.difficulty;
        let score_for = |body: &Body| {
            score(&ScoreInput {
                landed: body.landed,
                crashed: body.crashed,
                fuel_remaining: body.fuel,
                fuel_max: body.max_fuel,
                elapsed_seconds: elapsed,
                difficulty,
            })
        };

        let mut replay_id = None;
        if let Some(recorder) = self.recorder.take() {
            let recorded = self
                .primary
                .and_then(|id| self.roster.iter().find(|s| s.id == id))
                .map(|s| s.body.clone());
            if let Some(body) = recorded {
                let id = format!("{}_{}", self.id, unix_secs());
                let replay = recorder.finalize(ReplayOutcome {
                    replay_id: id.clone(),
                    landed: body.landed,
                    crashed: body.crashed,
                    duration_seconds: elapsed,
                    fuel_remaining: body.fuel,
                    input_count,
                    score: score_for(&body),
                });
                info!(replay_id = %id, frames = replay.metadata.frame_count, "replay finalized");
                self.replay = Some(replay);
                replay_id = Some(id);
            }
        }

        let results = match self.config.kind {
            SessionKind::Solo => None,
            SessionKind::Room => Some(
                self.roster
                    .iter()
                    .map(|s| {
                        let result = PilotResult {
                            name: s.name.clone(),
                            landed: s.body.landed,
                            crashed: s.body.crashed,
                            fuel_remaining: s.body.fuel,
                            score: score_for(&s.body),
                        };
                        (s.id, result)
                    })
                    .collect(),
            ),
        };

        let summary = self
            .roster
            .iter()
            .find(|s| s.id == deciding)
            .map(|s| GameOverSummary {
                landed: s.body.landed,
                crashed: s.body.crashed,
                elapsed_seconds: elapsed,
                fuel_remaining: s.body.fuel,
                input_count,
                score: score_for(&s.body),
                replay_id,
                results,
            });

        // Everyone sees the final resting state before the result.
        if let Some(telemetry) = self.telemetry() {
            self.broadcast(Outbound::Telemetry(telemetry), Audience::Everyone);
        }
        if let Some(summary) = summary {
            info!(
                slot_id = %deciding,
                landed = summary.landed,
                score = summary.score,
                elapsed_seconds = elapsed,
                "game over"
            );
            self.broadcast(Outbound::GameOver(summary), Audience::Everyone);
        }
    }

    fn fan_out(&mut self) {
        let to_players = self.ticks % self.player_every == 0;
        let to_spectators = !self.spectators.is_empty() && self.ticks % SPECTATOR_EVERY == 0;
        let audience = match (to_players, to_spectators) {
            (true, true) => Audience::Everyone,
            (true, false) => Audience::Players,
            (false, true) => Audience::Spectators,
            (false, false) => return,
        };
        if let Some(telemetry) = self.telemetry() {
            self.broadcast(Outbound::Telemetry(telemetry), audience);
        }
    }

    fn telemetry(&self) -> Option<Telemetry> {
        let ctx = ReadoutContext {
            terrain: &self.terrain,
            tuning: &self.rules.tuning,
            mode: self.config.telemetry_mode,
            elapsed_seconds: self.elapsed_seconds(),
        };
        let view = self.roster_view(|slot| readout(&slot.body, slot.thrusting, &ctx))?;
        Some(Telemetry {
            tick: self.ticks,
            elapsed_seconds: ctx.elapsed_seconds,
            landing_zones: self.terrain.landing_zones.clone(),
            view,
        })
    }

    fn init_state(&self) -> Option<InitState> {
        Some(InitState {
            terrain: Arc::clone(&self.terrain),
            view: self.roster_view(|slot| slot.body.clone())?,
            constants: Constants::new(&self.rules.tuning, &self.rules.world, self.rules.tick_rate),
            difficulty: self.config.difficulty,
            telemetry_mode: self.config.telemetry_mode,
        })
    }

    fn roster_view<T>(&self, mut project: impl FnMut(&PlayerSlot) -> T) -> Option<RosterView<T>> {
        match self.config.kind {
            SessionKind::Solo => self.primary_slot().map(|slot| RosterView::Single(project(slot))),
            SessionKind::Room if self.roster.is_empty() => None,
            SessionKind::Room => Some(RosterView::Multi(
                self.roster
                    .iter()
                    .map(|slot| {
                        let crew = Crew {
                            name: slot.name.clone(),
                            color: slot.color,
                            state: project(slot),
                        };
                        (slot.id, crew)
                    })
                    .collect(),
            )),
        }
    }

    fn primary_slot(&self) -> Option<&PlayerSlot> {
        let primary = self.primary?;
        self.roster.iter().find(|s| s.id == primary)
    }

    fn pilot_info(&self, slot_id: SlotId) -> Option<PilotInfo> {
        self.roster
            .iter()
            .find(|s| s.id == slot_id)
            .map(|s| self.describe(s))
    }

    fn describe(&self, slot: &PlayerSlot) -> PilotInfo {
        PilotInfo {
            id: slot.id,
            name: slot.name.clone(),
            color: slot.color,
            is_creator: self.primary == Some(slot.id),
        }
    }

    fn pilot_list(&self) -> Vec<PilotInfo> {
        self.roster.iter().map(|s| self.describe(s)).collect()
    }

    fn broadcast_roster(&mut self) {
        let list = self.pilot_list();
        self.broadcast(Outbound::PlayerList(list), Audience::Everyone);
    }

    fn send_to(&mut self, slot_id: SlotId, message: Outbound) {
        let Some(slot) = self.roster.iter().find(|s| s.id == slot_id) else {
            return;
        };
        if slot.outbox.try_send(Arc::new(message)).is_err() {
            warn!(%slot_id, "dropping player that cannot keep up");
            self.remove_slot(slot_id);
        }
    }

    /// Offers one message to every recipient in the audience. A recipient whose outbox is full
    /// or closed is evicted; the others are unaffected.
    fn broadcast(&mut self, message: Outbound, audience: Audience) {
        let message = Arc::new(message);

        if audience.spectators() {
            self.spectators.retain(|w| {
                let delivered = w.outbox.try_send(Arc::clone(&message)).is_ok();
                if !delivered {
                    warn!(spectator_id = w.id, "dropping spectator that cannot keep up");
                }
                delivered
            });
        }

        if audience.players() {
            let stalled: Vec<SlotId> = self
                .roster
                .iter()
                .filter(|s| s.outbox.try_send(Arc::clone(&message)).is_err())
                .map(|s| s.id)
                .collect();
            for slot_id in stalled {
                warn!(%slot_id, "dropping player that cannot keep up");
                self.remove_slot(slot_id);
            }
        }
    }

    /// Removes a player, hands the creator role to the next slot in join order and tells the
    /// rest of the roster.
    fn remove_slot(&mut self, slot_id: SlotId) -> bool {
        let Some(index) = self.roster.iter().position(|s| s.id == slot_id) else {
            return false;
        };
        let slot = self.roster.remove(index);
        let was_primary = self.primary == Some(slot_id);
        if was_primary {
            self.primary = self.roster.first().map(|s| s.id);
            if let Some(next) = self.primary {
                info!(slot_id = %next, "creator role handed over");
            }
        }

        if !self.roster.is_empty() {
            let info = PilotInfo {
                id: slot.id,
                name: slot.name,
                color: slot.color,
                is_creator: was_primary,
            };
            self.broadcast(Outbound::PlayerLeft(info), Audience::Everyone);
            self.broadcast_roster();
        }
        true
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn publish(status_tx: &watch::Sender<SessionStatus>, session: &Session) {
    let next = session.status();
    status_tx.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

/// Drives one session until it ends, is shut down, or loses its last player.
///
/// Commands are applied between ticks. Returns the finalized replay, if one was recorded.
pub async fn run_session(
    mut session: Session,
    mut commands: mpsc::Receiver<SessionCommand>,
    status_tx: watch::Sender<SessionStatus>,
    tick_interval: Duration,
) -> Option<Replay> {
    publish(&status_tx, &session);
    if session.is_empty() {
        return None;
    }

    let mut next_tick = tokio::time::Instant::now() + tick_interval;
    loop {
        let was_running = session.phase() == SessionPhase::Running;
        let flow = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => session.handle(command),
                None => Flow::Stop,
            },
            _ = tokio::time::sleep_until(next_tick), if was_running => {
                let started = tokio::time::Instant::now();
                let flow = session.step();
                // An overrunning tick starts the next one immediately instead of sleeping.
                next_tick =
                    tokio::time::Instant::now() + tick_interval.saturating_sub(started.elapsed());
                flow
            }
        };

        if !was_running && session.phase() == SessionPhase::Running {
            next_tick = tokio::time::Instant::now() + tick_interval;
        }
        publish(&status_tx, &session);
        if flow == Flow::Stop {
            break;
        }
    }

    session.take_replay()
}
