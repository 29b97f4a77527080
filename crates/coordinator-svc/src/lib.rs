//! Coordinator Service
//!
//! HTTP surface of the session coordinator: the synchronous JSON API for
//! clients, plus the worker-fleet attachment points (WebSocket command
//! push and HTTP event submission). All state lives in
//! `coordinator-core`; this crate only wires it to the network.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use coordinator_core::service::{Coordinator, CoordinatorConfig};
use coordinator_core::{SessionStore, WorkerEvent};
use worker_bus::ChannelBus;

pub mod api;
pub mod ws;

/// Shared application state
pub struct AppState {
    /// Session API operations and event ingestion
    pub coordinator: Coordinator,
    /// Command fan-out to attached workers
    pub bus: Arc<ChannelBus>,
}

impl AppState {
    /// Build state over a fresh store and the given bus
    pub fn new(config: CoordinatorConfig, bus: Arc<ChannelBus>) -> Self {
        let coordinator = Coordinator::new(Arc::new(SessionStore::new()), bus.clone(), config);
        Self { coordinator, bus }
    }
}

/// Apply one worker event, logging and dropping failures
///
/// One bad report must never take the ingestion path down; unrelated
/// events keep flowing.
pub fn ingest(coordinator: &Coordinator, event: WorkerEvent) {
    let room_id = event.room_id().to_string();
    let status = event.status();

    if let Err(err) = coordinator.on_event(event) {
        warn!(room_id = %room_id, status = %status, error = %err, "Dropping worker event");
    }
}

/// Build the service router
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/sign_up", post(api::sign_up))
        .route("/api/user", get(api::get_user).put(api::update_user))
        .route(
            "/api/public_keys",
            post(api::create_key).delete(api::delete_key),
        )
        .route("/api/key", get(api::get_key))
        .route("/api/sign", post(api::sign))
        .route("/v1/event", post(api::push_event))
        .route("/v1/ws", get(ws::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
