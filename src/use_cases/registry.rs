// Registry for active sessions and the in-memory replay archive.

use super::session::{Session, SessionConfig, SessionRules, run_session};
use super::types::{
    AdmissionError, JoinTicket, Outbox, SessionCommand, SessionKind, SessionPhase, SessionStatus,
    SlotId, SpectatorId,
};
use crate::domain::{Difficulty, Replay, TerrainGenerator};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, mpsc, oneshot, watch};
use tracing::{Instrument, debug, info, info_span, warn};

/// Shared configuration for spawning sessions and reclaiming them.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Capacity for commands queued into a session task.
    pub command_capacity: usize,
    /// Rules every new session runs under.
    pub rules: SessionRules,
    /// Upper bound on concurrently registered sessions.
    pub max_sessions: usize,
    /// Rooms still waiting after this long are reclaimed.
    pub waiting_ttl: Duration,
    /// Finished sessions are kept listed for this long.
    pub over_ttl: Duration,
    /// Replays kept in memory before the oldest is evicted.
    pub max_replays: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            command_capacity: 64,
            rules: SessionRules::default(),
            max_sessions: 256,
            waiting_ttl: Duration::from_secs(600),
            over_ttl: Duration::from_secs(60),
            max_replays: 100,
        }
    }
}

impl RegistrySettings {
    /// Wall-clock period of one simulation tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.rules.tick_rate.max(1)))
    }
}

/// Errors returned by registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// No room for another session.
    AtCapacity,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AtCapacity => f.write_str("server is at capacity, try again later"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Cloneable access to one running session task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: Arc<str>,
    pub kind: SessionKind,
    pub difficulty: Difficulty,
    pub created_at: Instant,
    commands: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Asks the session for a player slot.
    pub async fn join(&self, name: String, outbox: Outbox) -> Result<JoinTicket, AdmissionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Join {
                name,
                outbox,
                reply,
            })
            .await
            .map_err(|_| AdmissionError::SessionUnavailable)?;
        response
            .await
            .unwrap_or(Err(AdmissionError::SessionUnavailable))
    }

    /// Asks the session to add a read-only observer.
    pub async fn spectate(&self, outbox: Outbox) -> Result<SpectatorId, AdmissionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Spectate { outbox, reply })
            .await
            .map_err(|_| AdmissionError::SessionUnavailable)?;
        response
            .await
            .unwrap_or(Err(AdmissionError::SessionUnavailable))
    }

    /// Returns false when the session task is already gone.
    pub async fn start(&self, slot_id: SlotId) -> bool {
        self.commands
            .send(SessionCommand::Start { slot_id })
            .await
            .is_ok()
    }

    pub async fn leave(&self, slot_id: SlotId) {
        let _ = self.commands.send(SessionCommand::Leave { slot_id }).await;
    }

    pub async fn stop_watching(&self, spectator_id: SpectatorId) {
        let _ = self
            .commands
            .send(SessionCommand::StopWatching { spectator_id })
            .await;
    }

    /// Latest status published by the session task.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    fn shutdown(&self) {
        // Best effort; a full queue means the task is busy and will be dropped with its handle.
        let _ = self.commands.try_send(SessionCommand::Shutdown);
    }
}

/// Listing entry for `GET /games`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub kind: SessionKind,
    pub difficulty: Difficulty,
    pub phase: SessionPhase,
    pub players: usize,
    pub spectators: usize,
    /// Wall-clock time since the game started, if it has.
    pub running_for: Option<Duration>,
}

/// Bounded FIFO of finalized replays.
#[derive(Debug, Default)]
struct ReplayArchive {
    order: VecDeque<String>,
    by_id: HashMap<String, Arc<Replay>>,
}

/// Thread-safe registry for active sessions and finished replays.
#[derive(Debug)]
pub struct SessionRegistry {
    settings: RegistrySettings,
    sessions: RwLock<HashMap<String, SessionHandle>>,
    replays: RwLock<ReplayArchive>,
}

impl SessionRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            settings,
            sessions: RwLock::new(HashMap::new()),
            replays: RwLock::new(ReplayArchive::default()),
        }
    }

    /// Creates a session with the creator seated and spawns its task.
    ///
    /// The finished task files its replay (if any) into the archive.
    pub async fn create_session(
        self: &Arc<Self>,
        config: SessionConfig,
        creator_name: String,
        creator_outbox: Outbox,
    ) -> Result<(SessionHandle, JoinTicket), RegistryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.settings.max_sessions {
            warn!(sessions = sessions.len(), "session limit reached");
            return Err(RegistryError::AtCapacity);
        }

        let session_id = loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let terrain = TerrainGenerator::new(self.settings.rules.world)
            .generate(config.difficulty, &mut StdRng::from_entropy());

        let kind = config.kind;
        let difficulty = config.difficulty;
        let (session, ticket) = Session::new(
            Arc::from(session_id.as_str()),
            config,
            self.settings.rules,
            terrain,
            creator_name,
            creator_outbox,
        );

        // Channel wiring for the session task.
        let (command_tx, command_rx) = mpsc::channel(self.settings.command_capacity);
        let (status_tx, status_rx) = watch::channel(session.status());

        let handle = SessionHandle {
            session_id: Arc::clone(&ticket.session_id),
            kind,
            difficulty,
            created_at: Instant::now(),
            commands: command_tx,
            status: status_rx,
        };
        sessions.insert(session_id.clone(), handle.clone());
        drop(sessions);

        info!(%session_id, ?kind, difficulty = difficulty.as_str(), "session created");

        let registry = Arc::clone(self);
        let tick_interval = self.settings.tick_interval();
        let span = info_span!("session", session_id = %session_id);
        tokio::spawn(
            async move {
                let replay = run_session(session, command_rx, status_tx, tick_interval).await;
                if let Some(replay) = replay {
                    registry.archive_replay(replay).await;
                }
                debug!("session task exited");
            }
            .instrument(span),
        );

        Ok((handle, ticket))
    }

    /// Returns a session handle for the provided id, if it exists.
    pub async fn get_session(&self, session_id: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut list: Vec<(Instant, SessionSummary)> = sessions
            .values()
            .map(|h| {
                let status = h.status();
                let running_for = status.started_at.map(|t| {
                    let end = status.ended_at.unwrap_or_else(Instant::now);
                    end.saturating_duration_since(t)
                });
                let summary = SessionSummary {
                    session_id: h.session_id.to_string(),
                    kind: h.kind,
                    difficulty: h.difficulty,
                    phase: status.phase,
                    players: status.players,
                    spectators: status.spectators,
                    running_for,
                };
                (h.created_at, summary)
            })
            .collect();
        list.sort_by_key(|(created_at, _)| *created_at);
        list.into_iter().map(|(_, summary)| summary).collect()
    }

    /// Removes stale sessions as of `now` and returns how many were reclaimed.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, handle)| self.is_stale(handle, now))
            .map(|(id, _)| id.clone())
            .collect();
        for session_id in &stale {
            if let Some(handle) = sessions.remove(session_id) {
                handle.shutdown();
                debug!(%session_id, "session reclaimed");
            }
        }
        stale.len()
    }

    fn is_stale(&self, handle: &SessionHandle, now: Instant) -> bool {
        let status = handle.status();
        if status.players == 0 {
            return true;
        }
        match status.phase {
            SessionPhase::Waiting => {
                now.saturating_duration_since(handle.created_at) >= self.settings.waiting_ttl
            }
            SessionPhase::Running => false,
            SessionPhase::Over => status
                .ended_at
                .is_some_and(|t| now.saturating_duration_since(t) >= self.settings.over_ttl),
        }
    }

    /// Runs [`Self::sweep`] on a fixed period for the lifetime of the process.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let reclaimed = registry.sweep(Instant::now()).await;
                if reclaimed > 0 {
                    info!(reclaimed, "swept stale sessions");
                }
            }
        });
    }

    /// Stores a finished replay, evicting the oldest once the archive is full.
    pub async fn archive_replay(&self, replay: Replay) {
        let capacity = self.settings.max_replays;
        if capacity == 0 {
            return;
        }
        let replay_id = replay.id().to_string();
        let mut archive = self.replays.write().await;
        if archive.by_id.insert(replay_id.clone(), Arc::new(replay)).is_none() {
            archive.order.push_back(replay_id.clone());
        }
        while archive.order.len() > capacity {
            if let Some(oldest) = archive.order.pop_front() {
                archive.by_id.remove(&oldest);
            }
        }
        info!(%replay_id, stored = archive.order.len(), "replay archived");
    }

    /// Archived replays, newest first.
    pub async fn list_replays(&self) -> Vec<Arc<Replay>> {
        let archive = self.replays.read().await;
        archive
            .order
            .iter()
            .rev()
            .filter_map(|id| archive.by_id.get(id).cloned())
            .collect()
    }

    pub async fn get_replay(&self, replay_id: &str) -> Option<Arc<Replay>> {
        self.replays.read().await.by_id.get(replay_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LanderTuning, ReplayOutcome, ReplayRecorder};
    use crate::use_cases::types::Outbound;

    fn registry(settings: RegistrySettings) -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(settings))
    }

    fn room() -> SessionConfig {
        SessionConfig {
            kind: SessionKind::Room,
            ..SessionConfig::default()
        }
    }

    fn outbox() -> (Outbox, mpsc::Receiver<Arc<Outbound>>) {
        mpsc::channel(512)
    }

    fn replay(id: &str) -> Replay {
        ReplayRecorder::new("s", "pilot", Difficulty::Easy).finalize(ReplayOutcome {
            replay_id: id.to_string(),
            landed: true,
            crashed: false,
            duration_seconds: 1.0,
            fuel_remaining: 1000.0,
            input_count: 0,
            score: 1800,
        })
    }

    async fn wait_for_phase(handle: &SessionHandle, phase: SessionPhase) {
        for _ in 0..500 {
            if handle.status().phase == phase {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session never reached {phase:?}");
    }

    #[tokio::test]
    async fn when_room_is_created_then_it_is_listed_and_joinable() {
        let registry = registry(RegistrySettings::default());
        let (tx, _rx) = outbox();
        let (handle, ticket) = registry
            .create_session(room(), "Ace".to_string(), tx)
            .await
            .expect("created");
        assert_eq!(ticket.session_id, handle.session_id);

        let (guest_tx, _guest_rx) = outbox();
        let guest = handle.join("Bo".to_string(), guest_tx).await;
        assert!(guest.is_ok());

        let listed = registry.list_sessions().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, handle.session_id.as_ref());
        assert_eq!(listed[0].phase, SessionPhase::Waiting);
        assert_eq!(listed[0].players, 2);
        assert!(listed[0].running_for.is_none());
    }

    #[tokio::test]
    async fn when_session_limit_is_reached_then_creation_fails() {
        let registry = registry(RegistrySettings {
            max_sessions: 1,
            ..RegistrySettings::default()
        });
        let (tx, _rx) = outbox();
        registry
            .create_session(room(), "Ace".to_string(), tx)
            .await
            .expect("first");
        let (tx, _rx2) = outbox();
        let second = registry.create_session(room(), "Bo".to_string(), tx).await;
        assert_eq!(second.err(), Some(RegistryError::AtCapacity));
    }

    #[tokio::test]
    async fn when_waiting_room_outlives_its_ttl_then_sweep_reclaims_it() {
        let registry = registry(RegistrySettings::default());
        let (tx, _rx) = outbox();
        let (handle, _ticket) = registry
            .create_session(room(), "Ace".to_string(), tx)
            .await
            .expect("created");

        assert_eq!(registry.sweep(Instant::now()).await, 0);
        let later = handle.created_at + Duration::from_secs(601);
        assert_eq!(registry.sweep(later).await, 1);
        assert!(registry.get_session(&handle.session_id).await.is_none());
    }

    #[tokio::test]
    async fn when_every_player_leaves_then_sweep_reclaims_the_session() {
        let registry = registry(RegistrySettings::default());
        let (tx, _rx) = outbox();
        let (handle, ticket) = registry
            .create_session(room(), "Ace".to_string(), tx)
            .await
            .expect("created");

        handle.leave(ticket.slot_id).await;
        for _ in 0..500 {
            if handle.status().players == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.sweep(Instant::now()).await, 1);
    }

    #[tokio::test]
    async fn when_solo_game_ends_then_replay_is_archived_and_session_swept_later() {
        let mut settings = RegistrySettings::default();
        // Spawn below every possible ground height so the first tick ends the game.
        settings.rules.tuning = LanderTuning {
            spawn_y: 790.0,
            ..LanderTuning::default()
        };
        let registry = registry(settings);
        let (tx, _rx) = outbox();
        let (handle, _ticket) = registry
            .create_session(SessionConfig::default(), "Ace".to_string(), tx)
            .await
            .expect("created");

        wait_for_phase(&handle, SessionPhase::Over).await;
        let mut archived = Vec::new();
        for _ in 0..500 {
            archived = registry.list_replays().await;
            if !archived.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(archived.len(), 1);
        let meta = &archived[0].metadata;
        assert!(meta.landed != meta.crashed);
        let fetched = registry.get_replay(archived[0].id()).await;
        assert!(fetched.is_some());

        let ended_at = handle.status().ended_at.expect("ended");
        assert_eq!(registry.sweep(ended_at).await, 0);
        assert_eq!(registry.sweep(ended_at + Duration::from_secs(60)).await, 1);
    }

    #[tokio::test]
    async fn when_archive_is_full_then_oldest_replay_is_evicted() {
        let registry = registry(RegistrySettings {
            max_replays: 2,
            ..RegistrySettings::default()
        });
        for id in ["a", "b", "c"] {
            registry.archive_replay(replay(id)).await;
        }

        let ids: Vec<String> = registry
            .list_replays()
            .await
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert!(registry.get_replay("a").await.is_none());
    }

    #[tokio::test]
    async fn when_session_is_reclaimed_then_held_handles_refuse_joins() {
        let registry = registry(RegistrySettings::default());
        let (tx, _rx) = outbox();
        let (handle, _ticket) = registry
            .create_session(room(), "Ace".to_string(), tx)
            .await
            .expect("created");

        let later = handle.created_at + Duration::from_secs(601);
        assert_eq!(registry.sweep(later).await, 1);
        assert_eq!(registry.sweep(later).await, 0);

        // Let the task observe the shutdown command.
        for _ in 0..500 {
            if handle.commands.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let (guest_tx, _guest_rx) = outbox();
        let result = handle.join("Bo".to_string(), guest_tx).await;
        assert_eq!(result.err(), Some(AdmissionError::SessionUnavailable));
    }
}
