// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! HTTP server and WebSocket infrastructure for the row lock service.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/table` | Current table with lock holders |
//! | POST | `/api/lock-row` | Acquire a row lock |
//! | POST | `/api/unlock-row` | Release a held row lock |
//! | WS | `/ws` | Real-time snapshot stream |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rowlock::server::{LockServer, ServerConfig};
//!
//! let server = LockServer::new(ServerConfig::default());
//!
//! // Start server (returns bound address)
//! let addr = server.start().await?;
//! println!("Server listening on {}", addr);
//! ```

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::constants::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_HOST, DEFAULT_LOCK_TTL_SECS, DEFAULT_PORT,
    DEFAULT_SWEEP_INTERVAL_SECS,
};
use crate::error::LockError;
use crate::events::{RowSnapshot, TableEvent};
use crate::lock::LockManager;
use crate::store::RowStore;

// ============================================================================
// Server Configuration
// ============================================================================

/// Configuration for the lock server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 = auto-assign)
    pub port: u16,

    /// Host IP to bind to
    pub host: String,

    /// How long a lock may be held before the sweeper reclaims it
    pub lock_ttl: Duration,

    /// How often the sweeper runs
    pub sweep_interval: Duration,

    /// Snapshot broadcast channel capacity
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Create config with specific port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Create config with specific host IP
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the lock lease
    #[must_use]
    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    /// Set the sweep cadence
    #[must_use]
    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }
}

// ============================================================================
// Server State
// ============================================================================

/// Shared server state
#[derive(Debug)]
pub struct ServerState {
    /// Lock manager shared with the expiry sweeper
    pub manager: Arc<LockManager>,

    /// Server configuration
    pub config: ServerConfig,
}

impl ServerState {
    /// Create state over the seeded demo table
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(RowStore::seeded(), config)
    }

    /// Create state over a caller-provided table
    #[must_use]
    pub fn with_store(store: RowStore, config: ServerConfig) -> Self {
        let manager = Arc::new(LockManager::with_ttl_and_capacity(
            store,
            config.lock_ttl,
            config.channel_capacity,
        ));
        Self { manager, config }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /api/lock-row` and `POST /api/unlock-row`.
///
/// Both fields are optional at the serde layer, and the handlers take the
/// whole body as `Option<Json<_>>`, so a missing field or an unparseable
/// payload reaches `validate` and gets the contract's 400 instead of
/// axum's plain-text rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRequest {
    /// Target row
    pub row_id: Option<u64>,
    /// Requesting user
    pub user_id: Option<String>,
}

/// Success body for the mutating endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Human-readable outcome
    pub message: String,
}

/// Error body for the mutating endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Human-readable reason
    pub message: String,
    /// Current holder, present only on lock conflicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
}

// ============================================================================
// HTTP Handlers
// ============================================================================

fn validate(request: Option<Json<LockRequest>>) -> Result<(u64, String), LockError> {
    let Some(Json(request)) = request else {
        return Err(LockError::MissingInput);
    };
    match (request.row_id, request.user_id.as_deref()) {
        (Some(row_id), Some(user_id)) if !user_id.is_empty() => {
            Ok((row_id, user_id.to_string()))
        }
        _ => Err(LockError::MissingInput),
    }
}

fn error_response(err: &LockError) -> Response {
    let (status, message, locked_by) = match err {
        LockError::MissingInput => (
            StatusCode::BAD_REQUEST,
            "rowId and userId required".to_string(),
            None,
        ),
        LockError::NotFound { .. } => (StatusCode::NOT_FOUND, "Row not found".to_string(), None),
        LockError::Conflict { holder, .. } => (
            StatusCode::FORBIDDEN,
            "Row already locked".to_string(),
            Some(holder.clone()),
        ),
        LockError::NotOwner { .. } => (
            StatusCode::FORBIDDEN,
            "You cannot unlock this row".to_string(),
            None,
        ),
    };

    (status, Json(ErrorResponse { message, locked_by })).into_response()
}

async fn handle_table(State(state): State<Arc<ServerState>>) -> Json<Vec<RowSnapshot>> {
    // Repair stale leases on read without publishing; the periodic sweeper
    // broadcasts the corrected table on its next tick.
    state.manager.sweep_expired();
    Json(state.manager.snapshot_rows())
}

async fn handle_lock_row(
    State(state): State<Arc<ServerState>>,
    request: Option<Json<LockRequest>>,
) -> Response {
    let outcome =
        validate(request).and_then(|(row_id, user_id)| state.manager.acquire(row_id, &user_id));

    match outcome {
        Ok(()) => Json(ActionResponse {
            message: "Row locked".to_string(),
        })
        .into_response(),
        Err(err) => {
            tracing::debug!(error = %err, "lock request rejected");
            error_response(&err)
        }
    }
}

async fn handle_unlock_row(
    State(state): State<Arc<ServerState>>,
    request: Option<Json<LockRequest>>,
) -> Response {
    let outcome =
        validate(request).and_then(|(row_id, user_id)| state.manager.release(row_id, &user_id));

    match outcome {
        Ok(()) => Json(ActionResponse {
            message: "Row unlocked".to_string(),
        })
        .into_response(),
        Err(err) => {
            tracing::debug!(error = %err, "unlock request rejected");
            error_response(&err)
        }
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

async fn handle_ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

async fn handle_websocket(mut socket: WebSocket, state: Arc<ServerState>) {
    let observer_id = Uuid::new_v4();
    let mut rx = state.manager.subscribe();
    tracing::debug!(observer_id = %observer_id, "observer connected");

    // New observers start from the current table
    let initial = TableEvent::Snapshot {
        rows: state.manager.snapshot_rows(),
    };
    if let Ok(json) = serde_json::to_string(&initial) {
        let _ = socket.send(WsMessage::Text(json)).await;
    }

    // Forward snapshot frames to the observer
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(WsMessage::Text(json)).await.is_err() {
                                break; // Observer disconnected
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Every frame is a full snapshot, so the next one
                        // re-syncs this observer.
                        tracing::warn!(
                            observer_id = %observer_id,
                            missed,
                            "observer lagging, frames dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            // Handle incoming messages from the observer
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = socket.send(WsMessage::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    // Dropping `rx` prunes this observer from the broadcast channel
    tracing::debug!(observer_id = %observer_id, "observer disconnected");
}

// ============================================================================
// Lock Server
// ============================================================================

/// HTTP/WebSocket server for row lock coordination
pub struct LockServer {
    state: Arc<ServerState>,
}

impl LockServer {
    /// Create a new lock server
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: Arc::new(ServerState::new(config)),
        }
    }

    /// Get shared server state
    #[must_use]
    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Build the router
    fn build_router(&self) -> Router {
        Router::new()
            .route("/api/table", get(handle_table))
            .route("/api/lock-row", post(handle_lock_row))
            .route("/api/unlock-row", post(handle_unlock_row))
            .route("/ws", get(handle_ws_upgrade))
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server and return the bound address
    ///
    /// The server runs in a background task. Errors from the server are logged
    /// but not returned (since this method returns immediately after binding).
    /// Use [`Self::run_until`] for blocking execution that propagates errors.
    ///
    /// Fails with [`std::io::ErrorKind::InvalidInput`] when the configured
    /// host is not an IP address.
    pub async fn start(&self) -> std::io::Result<SocketAddr> {
        let ip: IpAddr = self
            .state
            .config
            .host
            .parse()
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
        let addr = SocketAddr::new(ip, self.state.config.port);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        let router = self.build_router();
        let server_addr = bound_addr;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(
                    server_addr = %server_addr,
                    error = %e,
                    "Lock server failed: {}", e
                );
            }
        });

        Ok(bound_addr)
    }

    /// Start the server and block until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ip: IpAddr = self
            .state
            .config
            .host
            .parse()
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
        let addr = SocketAddr::new(ip, self.state.config.port);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "row lock server listening");
        let router = self.build_router();

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================
