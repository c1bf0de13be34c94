// Framework bootstrap for the lander server runtime.

use crate::frameworks::config;
use crate::interface_adapters::http::{
    games_handler, health_handler, replay_handler, replays_handler,
};
use crate::interface_adapters::net::{spectate_handler, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{RegistrySettings, SessionRegistry, SessionRules};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/spectate/{session_id}", get(spectate_handler))
        .route("/health", get(health_handler))
        .route("/games", get(games_handler))
        .route("/replays", get(replays_handler))
        .route("/replays/{replay_id}", get(replay_handler))
        .with_state(state)
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state();
    state.registry.spawn_sweeper(config::sweep_interval());

    let app = router(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::bind_addr(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Arc<AppState> {
    let settings = RegistrySettings {
        command_capacity: config::COMMAND_CAPACITY,
        rules: SessionRules {
            tick_rate: config::TICK_RATE,
            ..SessionRules::default()
        },
        max_sessions: config::max_sessions(),
        waiting_ttl: config::waiting_room_ttl(),
        over_ttl: config::over_session_ttl(),
        max_replays: config::max_replays(),
    };
    tracing::debug!(
        max_sessions = settings.max_sessions,
        max_replays = settings.max_replays,
        waiting_ttl_secs = settings.waiting_ttl.as_secs(),
        over_ttl_secs = settings.over_ttl.as_secs(),
        "session registry configured"
    );

    Arc::new(AppState {
        registry: Arc::new(SessionRegistry::new(settings)),
        outbox_capacity: config::OUTBOX_CAPACITY,
        handshake_timeout: config::HANDSHAKE_TIMEOUT,
        max_frame_bytes: config::MAX_FRAME_BYTES,
        transport_max_bytes: config::TRANSPORT_MAX_BYTES,
    })
}
