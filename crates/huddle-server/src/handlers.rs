//! Connection handlers for the Huddle server.
//!
//! This module wires the transport to the core: the WebSocket lifecycle,
//! the per-connection event loop, and the thin HTTP room-lifecycle routes.
//! Authentication is an upstream concern; by the time a request lands here
//! the gateway has attached a verified `user_id`/`user_name` pair.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use huddle_core::{
    reaper, ClientHandle, ConnectionRegistry, EventRouter, Identity, ReconnectionGuard,
    RoomError, Session, SessionStore,
};
use huddle_protocol::{codec, ServerEvent};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Shared server state.
pub struct AppState {
    pub router: Arc<EventRouter>,
    pub registry: Arc<ConnectionRegistry>,
    pub guard: Arc<ReconnectionGuard>,
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let store = Arc::new(SessionStore::new());
        let router = Arc::new(EventRouter::new(store));
        let registry = Arc::new(ConnectionRegistry::new());
        let guard = Arc::new(ReconnectionGuard::new(
            Arc::clone(&router),
            Arc::clone(&registry),
            config.grace_window(),
        ));

        Self {
            router,
            registry,
            guard,
            config,
        }
    }
}

/// The identity the gateway attached to this request.
#[derive(Debug, Deserialize)]
pub struct IdentityParams {
    pub user_id: String,
    pub user_name: String,
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            warn!("Failed to start metrics server: {}", e);
        }
    }

    // Background sweep of abandoned rooms
    reaper::spawn(Arc::clone(state.router.store()), config.reaper_interval());

    // Build router
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/debug/rooms", get(debug_rooms_handler))
        .route("/api/rooms", post(create_room_handler))
        .route(
            "/api/rooms/:room_id",
            get(room_summary_handler).delete(end_room_handler),
        )
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Huddle server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn debug_rooms_payload(store: &SessionStore) -> serde_json::Value {
    let rooms = store.list_summaries();
    serde_json::json!({
        "roomCount": rooms.len(),
        "rooms": rooms,
    })
}

/// `GET /debug/rooms` — introspection over all active rooms.
async fn debug_rooms_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(debug_rooms_payload(state.router.store()))
}

// --- Room-lifecycle routes (thin wrappers over the core API) --------------

fn error_response(err: &RoomError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        RoomError::RoomNotFound(_) | RoomError::MediaNotFound(_) => StatusCode::NOT_FOUND,
        RoomError::Forbidden(_) => StatusCode::FORBIDDEN,
        RoomError::AlreadyExists(_) => StatusCode::CONFLICT,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

/// `POST /api/rooms` — create a room; the caller becomes admin.
async fn create_room_handler(
    State(state): State<Arc<AppState>>,
    Query(identity): Query<IdentityParams>,
) -> impl IntoResponse {
    let room_id = state.router.create_room(&identity.user_id);
    metrics::set_active_rooms(state.router.store().room_count());

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "roomId": room_id,
            "admin": identity.user_id,
        })),
    )
}

/// `GET /api/rooms/:room_id` — existence check and summary.
async fn room_summary_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> impl IntoResponse {
    match state.router.summary(&room_id) {
        Some(summary) => Json(serde_json::json!({
            "exists": true,
            "roomId": summary.room_id,
            "admin": summary.admin,
            "userCount": summary.user_count,
            "messageCount": summary.message_count,
            "mediaCount": summary.media_count,
            "createdAt": summary.created_at,
        }))
        .into_response(),
        None => error_response(&RoomError::RoomNotFound(room_id)).into_response(),
    }
}

/// `DELETE /api/rooms/:room_id` — end the room; admin only.
async fn end_room_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(identity): Query<IdentityParams>,
) -> impl IntoResponse {
    match state.router.end_by_admin(&room_id, &identity.user_id) {
        Ok(()) => {
            metrics::set_active_rooms(state.router.store().room_count());
            Json(serde_json::json!({ "message": "Room ended successfully" })).into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}

// --- Realtime transport ---------------------------------------------------

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(identity): Query<IdentityParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state, identity))
}

/// Handle a WebSocket connection for its whole lifetime.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, identity: IdentityParams) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    // Generate connection ID
    let conn_id = format!(
        "conn_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    );

    debug!(connection = %conn_id, user = %identity.user_id, "WebSocket connected");

    let (handle, mut outbound) = ClientHandle::new(conn_id.as_str());
    let session = Session::new(
        identity.user_id.as_str(),
        identity.user_name.as_str(),
        handle,
    );

    state.registry.attach(
        conn_id.as_str(),
        Identity::new(identity.user_id.as_str(), identity.user_name.as_str()),
    );
    // A returning user retires any eviction still pending from an old socket
    state.guard.cancel_user(&identity.user_id);

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Message processing loop
    loop {
        tokio::select! {
            biased;

            // Deliver queued outbound events to this client
            Some(event) = outbound.recv() => {
                match codec::encode(&event) {
                    Ok(text) => {
                        metrics::record_event("outbound");
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection = %conn_id, error = %e, "Failed to encode event");
                        metrics::record_error("encode");
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_event("inbound");
                        handle_text(&state, &session, &conn_id, &text);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!(connection = %conn_id, "Ignoring binary frame on text protocol");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %conn_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %conn_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %conn_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // The participant is NOT removed here: the reconnection guard owns
    // eviction, so a transient drop can resume within the grace window.
    if let Some(detached) = state.registry.detach(&conn_id) {
        state.guard.schedule(conn_id.clone(), detached.user_id);
    }
    metrics::set_active_rooms(state.router.store().room_count());

    debug!(connection = %conn_id, "WebSocket disconnected");
}

/// Decode and dispatch one inbound text frame.
fn handle_text(state: &Arc<AppState>, session: &Session, conn_id: &str, text: &str) {
    let event = match codec::decode(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(connection = %conn_id, error = %e, "Undecodable event");
            metrics::record_error("decode");
            session.handle.send(ServerEvent::error(e));
            return;
        }
    };

    if let Err(err) = state.router.dispatch(session, event) {
        metrics::record_error(error_kind(&err));
        session.handle.send(ServerEvent::error(&err));
    }
    metrics::set_active_rooms(state.router.store().room_count());
}

fn error_kind(err: &RoomError) -> &'static str {
    match err {
        RoomError::RoomNotFound(_) => "room_not_found",
        RoomError::MediaNotFound(_) => "media_not_found",
        RoomError::Forbidden(_) => "forbidden",
        RoomError::AlreadyExists(_) => "already_exists",
    }
}
