//! HTTP and WebSocket surface
//!
//! Thin plumbing over [`Simulation`]: REST endpoints for configuration and
//! queries, and a WebSocket that forwards every published [`Feed`] as JSON.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;

use crate::broadcast::{ChannelBroadcaster, Feed};
use crate::consts::TOPIC_SHAPES;
use crate::error::SimError;
use crate::service::Simulation;
use crate::settings::Settings;
use crate::sim::{Dimensions, Shape, ShapeCounts, ShapeKind};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub sim: Arc<Simulation>,
    pub feed: ChannelBroadcaster,
}

impl AppState {
    pub fn new(sim: Arc<Simulation>, feed: ChannelBroadcaster) -> Self {
        Self { sim, feed }
    }

    /// Simulation wired to a fresh broadcast channel
    pub fn from_settings(settings: &Settings) -> Self {
        let feed = ChannelBroadcaster::new(TOPIC_SHAPES, settings.broadcast_capacity);
        let sim = Simulation::from_settings(settings, Arc::new(feed.clone()));
        Self::new(Arc::new(sim), feed)
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// One shape as clients see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeFrame {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub angle: f64,
    pub angular_velocity: f64,
    pub is_moving: bool,
    /// `#RRGGBB`
    pub color: String,
    pub size: f64,
}

impl From<&Shape> for ShapeFrame {
    fn from(shape: &Shape) -> Self {
        Self {
            id: shape.id.to_string(),
            kind: shape.kind,
            x: shape.pos.x,
            y: shape.pos.y,
            velocity_x: shape.vel.x,
            velocity_y: shape.vel.y,
            angle: shape.angle,
            angular_velocity: shape.angular_vel,
            is_moving: shape.moving,
            color: format!("#{:06X}", shape.color),
            size: shape.size,
        }
    }
}

fn frames(shapes: &[Shape]) -> Vec<ShapeFrame> {
    shapes.iter().map(ShapeFrame::from).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeResponse {
    pub circles: u32,
    pub rects: u32,
    pub triangles: u32,
    pub message: String,
}

impl ShapeResponse {
    fn configured(counts: ShapeCounts) -> Self {
        Self {
            circles: counts.circles,
            rects: counts.rects,
            triangles: counts.triangles,
            message: format!(
                "Shapes set successfully: {} circles, {} rectangles, {} triangles",
                counts.circles, counts.rects, counts.triangles
            ),
        }
    }

    fn rejected(err: &SimError) -> Self {
        Self {
            circles: 0,
            rects: 0,
            triangles: 0,
            message: format!("Error: {err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalShapesResponse {
    pub total_shapes: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub width: f64,
    pub height: f64,
    pub message: String,
}

impl PanelConfig {
    /// Bounds still in force after a refused resize
    fn rejected(current: Dimensions, err: &SimError) -> Self {
        Self {
            width: current.width,
            height: current.height,
            message: format!("Error: {err}"),
        }
    }
}

impl From<Dimensions> for PanelConfig {
    fn from(dims: Dimensions) -> Self {
        Self {
            width: dims.width,
            height: dims.height,
            message: format!("Panel configured: {:.0} x {:.0}", dims.width, dims.height),
        }
    }
}

/// `/api/setShapes` query. Signed so negative input reaches validation
/// instead of failing extraction.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ShapeQuery {
    pub circles: i64,
    pub rects: i64,
    pub triangles: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PanelRequest {
    pub width: f64,
    pub height: f64,
}

/// Messages a WebSocket client may send
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientMessage {
    InitializeShapes {
        #[serde(default)]
        circles: i64,
        #[serde(default)]
        rectangles: i64,
        #[serde(default)]
        triangles: i64,
        #[serde(default, rename = "panelWidth")]
        panel_width: Option<f64>,
        #[serde(default, rename = "panelHeight")]
        panel_height: Option<f64>,
    },
    GetShapes,
    Reset,
    GetPanelConfig,
    SetPanelSize {
        width: f64,
        height: f64,
    },
}

/// Messages pushed to WebSocket clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Shapes {
        #[serde(skip_serializing_if = "Option::is_none")]
        tick: Option<u64>,
        shapes: Vec<ShapeFrame>,
    },
    Panel(PanelConfig),
    Error {
        message: String,
    },
}

impl From<&Feed> for ServerMessage {
    fn from(feed: &Feed) -> Self {
        match feed {
            Feed::Shapes { tick, shapes } => ServerMessage::Shapes {
                tick: *tick,
                shapes: frames(shapes),
            },
            Feed::Panel(dims) => ServerMessage::Panel((*dims).into()),
        }
    }
}

// ============================================================================
// Routing
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/setShapes", get(set_shapes))
        .route("/api/getShapes", get(get_shapes))
        .route("/api/getTotalShapes", get(get_total_shapes))
        .route("/api/shapes", get(live_shapes))
        .route("/api/panel", get(get_panel).post(set_panel))
        .route("/api/reset", post(reset))
        .route("/ws/shapes", get(ws_shapes))
        .with_state(state)
}

/// Serve until the listener fails
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), SimError> {
    let addr = listener.local_addr()?;
    log::info!("Listening on http://{addr} (WebSocket at ws://{addr}/ws/shapes)");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn set_shapes(
    State(state): State<AppState>,
    Query(query): Query<ShapeQuery>,
) -> Result<Json<ShapeResponse>, (StatusCode, Json<ShapeResponse>)> {
    let counts = state
        .sim
        .checked_counts(query.circles, query.rects, query.triangles)
        .map_err(|err| {
            log::warn!("Rejected shape request: {err}");
            (StatusCode::BAD_REQUEST, Json(ShapeResponse::rejected(&err)))
        })?;
    state.sim.initialize(counts);
    Ok(Json(ShapeResponse::configured(counts)))
}

async fn get_shapes(State(state): State<AppState>) -> Json<ShapeResponse> {
    Json(ShapeResponse::configured(state.sim.configuration()))
}

async fn get_total_shapes(State(state): State<AppState>) -> Json<TotalShapesResponse> {
    let total_shapes = state.sim.get_total_shapes();
    Json(TotalShapesResponse {
        total_shapes,
        message: format!("Total shapes: {total_shapes}"),
    })
}

async fn live_shapes(State(state): State<AppState>) -> Json<Vec<ShapeFrame>> {
    Json(frames(&state.sim.get_shapes()))
}

async fn get_panel(State(state): State<AppState>) -> Json<PanelConfig> {
    Json(state.sim.panel_config().into())
}

async fn set_panel(
    State(state): State<AppState>,
    Json(request): Json<PanelRequest>,
) -> Result<Json<PanelConfig>, (StatusCode, Json<PanelConfig>)> {
    match state.sim.set_panel_size(request.width, request.height) {
        Ok(dims) => Ok(Json(dims.into())),
        Err(err) => {
            log::warn!("Rejected panel size: {err}");
            let current = PanelConfig::rejected(state.sim.panel_config(), &err);
            Err((StatusCode::BAD_REQUEST, Json(current)))
        }
    }
}

async fn reset(State(state): State<AppState>) -> Json<Vec<ShapeFrame>> {
    Json(frames(&state.sim.reset()))
}

// ============================================================================
// WebSocket
// ============================================================================

async fn ws_shapes(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Apply one client request. Returns a reply meant only for the sender;
/// everything else reaches the client through the shared feed.
pub fn handle_client_message(sim: &Simulation, message: ClientMessage) -> Option<ServerMessage> {
    match message {
        ClientMessage::InitializeShapes {
            circles,
            rectangles,
            triangles,
            panel_width,
            panel_height,
        } => {
            let counts = match sim.checked_counts(circles, rectangles, triangles) {
                Ok(counts) => counts,
                Err(err) => {
                    log::warn!("Rejected shape request: {err}");
                    return Some(ServerMessage::Error {
                        message: format!("Error: {err}"),
                    });
                }
            };
            match (panel_width, panel_height) {
                (Some(width), Some(height)) => sim.initialize_with_panel(counts, width, height),
                _ => sim.initialize(counts),
            };
            None
        }
        ClientMessage::GetShapes => {
            sim.publish_shapes();
            None
        }
        ClientMessage::Reset => {
            sim.reset();
            None
        }
        ClientMessage::GetPanelConfig => Some(ServerMessage::Panel(sim.panel_config().into())),
        ClientMessage::SetPanelSize { width, height } => match sim.set_panel_size(width, height) {
            Ok(_) => None,
            Err(err) => {
                log::warn!("Rejected panel size: {err}");
                Some(ServerMessage::Panel(PanelConfig::rejected(sim.panel_config(), &err)))
            }
        },
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut feed = state.feed.subscribe();
    log::info!(
        "WebSocket client connected ({} subscribed)",
        state.feed.subscriber_count()
    );

    // Current state up front so the client can draw before the next tick
    let greeting = [
        ServerMessage::Panel(state.sim.panel_config().into()),
        ServerMessage::Shapes {
            tick: None,
            shapes: frames(&state.sim.get_shapes()),
        },
    ];
    for message in &greeting {
        if send_message(&mut sender, message).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            received = feed.recv() => match received {
                Ok(item) => {
                    if send_message(&mut sender, &ServerMessage::from(&item)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("WebSocket client lagged by {skipped} feeds");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => handle_client_message(&state.sim, message),
                        Err(err) => Some(ServerMessage::Error {
                            message: format!("Invalid message: {err}"),
                        }),
                    };
                    if let Some(reply) = reply {
                        if send_message(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    log::debug!("WebSocket receive failed: {err}");
                    break;
                }
            },
        }
    }

    log::info!("WebSocket client disconnected");
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), ()> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(err) => {
            log::error!("Failed to serialize message: {err}");
            return Err(());
        }
    };
    sender.send(Message::Text(text.into())).await.map_err(|err| {
        log::debug!("Failed to send message: {err}");
    })
}
