//! HTTP and WebSocket front end for the dashboard.
//!
//! Thin handlers over [`Store`]: getters return the current state, setters
//! validate through the store's mutators, and `/ws` streams every dashboard
//! event to the browser after replaying the current state.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, State,
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{Json, Response},
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use obdash_core::{
    ClientMessage, DashboardEvent, DiagnosticLink, FaultCode, RadioState, Store, Subscription,
    TelemetrySnapshot, ValidationError,
};

/// Shared server state.
pub struct AppState {
    store: Arc<Store>,
    link: Option<Arc<dyn DiagnosticLink>>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        link: Option<Arc<dyn DiagnosticLink>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            link,
            shutdown,
        }
    }
}

type ApiResult = (StatusCode, Json<Value>);

fn rejected(error: impl std::fmt::Display) -> ApiResult {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": error.to_string() })),
    )
}

fn accepted() -> ApiResult {
    (StatusCode::OK, Json(json!({ "success": true })))
}

/// Unwrap a JSON body, turning parse failures into a 400 reply.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiResult> {
    payload.map(|Json(b)| b).map_err(|e| rejected(e.body_text()))
}

// ---------------------------------------------------------------------------
// Getters
// ---------------------------------------------------------------------------

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "name": "obdash",
        "version": obdash_core::VERSION,
        "diagnostic_link": state.link.as_ref().and_then(|l| l.port()),
        "subscribers": state.store.subscriber_count(),
        "endpoints": {
            "/": "This API index",
            "/api/sensors": "Latest telemetry snapshot",
            "/api/errors": "Active fault codes",
            "/api/controls": "Cabin control states",
            "/api/control/{name}": { "method": "POST", "body": { "state": "bool" } },
            "/api/radio": "Radio state",
            "/api/radio/station": { "method": "POST", "body": { "station": "index" } },
            "/api/radio/play": { "method": "POST", "body": { "playing": "bool" } },
            "/api/radio/volume": { "method": "POST", "body": { "volume": "0-100" } },
            "/api/obd/status": "Diagnostic adapter status",
            "/ws": "Live event stream (WebSocket)",
        }
    }))
}

async fn handle_sensors(State(state): State<Arc<AppState>>) -> Json<TelemetrySnapshot> {
    Json(state.store.snapshot())
}

async fn handle_errors(State(state): State<Arc<AppState>>) -> Json<Vec<FaultCode>> {
    Json(state.store.faults())
}

async fn handle_controls(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.store.controls()))
}

async fn handle_radio(State(state): State<Arc<AppState>>) -> Json<RadioState> {
    Json(state.store.radio())
}

async fn handle_obd_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let link = state.link.as_ref();
    Json(json!({
        "connected": link.is_some_and(|l| l.is_connected()),
        "port": link.and_then(|l| l.port()),
    }))
}

// ---------------------------------------------------------------------------
// Setters
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ControlBody {
    state: Option<bool>,
}

#[derive(Deserialize)]
struct StationBody {
    station: Option<i64>,
}

#[derive(Deserialize)]
struct PlayBody {
    playing: Option<bool>,
}

#[derive(Deserialize)]
struct VolumeBody {
    volume: Option<i64>,
}

async fn handle_set_control(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<ControlBody>, JsonRejection>,
) -> ApiResult {
    let on = match body(payload).map(|b| b.state) {
        Ok(Some(on)) => on,
        Ok(None) => return rejected(ValidationError::MissingField("state")),
        Err(reply) => return reply,
    };
    match state.store.set_control_by_id(&name, on) {
        Ok(control) => (
            StatusCode::OK,
            Json(json!({ "success": true, "control": control, "state": on })),
        ),
        Err(e) => rejected(e),
    }
}

async fn handle_set_station(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StationBody>, JsonRejection>,
) -> ApiResult {
    match body(payload).map(|b| b.station) {
        Ok(Some(index)) => state.store.set_station(index).map_or_else(rejected, |()| accepted()),
        Ok(None) => rejected(ValidationError::MissingField("station")),
        Err(reply) => reply,
    }
}

async fn handle_set_playing(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PlayBody>, JsonRejection>,
) -> ApiResult {
    match body(payload).map(|b| b.playing) {
        Ok(Some(playing)) => {
            state.store.set_playing(playing);
            accepted()
        }
        Ok(None) => rejected(ValidationError::MissingField("playing")),
        Err(reply) => reply,
    }
}

async fn handle_set_volume(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VolumeBody>, JsonRejection>,
) -> ApiResult {
    match body(payload).map(|b| b.volume) {
        Ok(Some(volume)) => state.store.set_volume(volume).map_or_else(rejected, |()| accepted()),
        Ok(None) => rejected(ValidationError::MissingField("volume")),
        Err(reply) => reply,
    }
}

// ---------------------------------------------------------------------------
// Subscriber channel
// ---------------------------------------------------------------------------

/// Apply one subscriber message. Malformed or invalid messages are logged
/// and dropped; nothing is sent back. Returns whether it was applied.
pub fn apply_client_message(store: &Store, text: &str) -> bool {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            log::warn!("ignoring malformed subscriber message: {e}");
            return false;
        }
    };
    let result = match &message {
        ClientMessage::ControlChange(change) => store.apply_control_change(change).map(|_| ()),
        ClientMessage::RadioChange(change) => store.apply_radio_change(change).map(|_| ()),
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("rejected subscriber message {message:?}: {e}");
            false
        }
    }
}

async fn send_event<S>(sink: &mut S, event: &DashboardEvent) -> Result<(), axum::Error>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}

async fn handle_ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| subscriber_session(socket, state))
}

async fn subscriber_session(socket: WebSocket, state: Arc<AppState>) {
    let Subscription {
        replay,
        mut receiver,
    } = state.store.subscribe();
    let (mut sink, mut stream) = socket.split();
    log::info!(
        "subscriber connected ({} active)",
        state.store.subscriber_count()
    );

    for event in &replay {
        if send_event(&mut sink, event).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    apply_client_message(&state.store, text.as_str());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::debug!("subscriber socket error: {e}");
                    break;
                }
            },
            event = receiver.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("slow subscriber skipped {skipped} event(s)");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    log::info!("subscriber disconnected");
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/sensors", get(handle_sensors))
        .route("/api/errors", get(handle_errors))
        .route("/api/controls", get(handle_controls))
        .route("/api/control/{name}", post(handle_set_control))
        .route("/api/radio", get(handle_radio))
        .route("/api/radio/station", post(handle_set_station))
        .route("/api/radio/play", post(handle_set_playing))
        .route("/api/radio/volume", post(handle_set_volume))
        .route("/api/obd/status", get(handle_obd_status))
        .route("/ws", get(handle_ws))
        .with_state(state)
}

/// Serve the dashboard API until the state's shutdown token is cancelled.
pub async fn run_server(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = build_router(Arc::new(state));
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("dashboard API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
