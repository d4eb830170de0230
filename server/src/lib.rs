//! HTTP/WebSocket surface of the installation.
//!
//! Viewers hold a WebSocket open on `/ws` and receive a JSON state payload
//! for every materially changed snapshot; sensors push classification and
//! touch events over `/api/events/*`; a couple of REST routes expose the
//! latest statistics for the dashboard's initial render.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};
use tracker::{AggregatorHandle, AllTimeStats, DashboardState, DayStats, Snapshot, TouchEdge};

pub mod hub;

pub use hub::{spawn_fanout, Hub};

#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub latest: watch::Receiver<Option<Snapshot>>,
    pub events: AggregatorHandle,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/api/state", get(current_state))
        .route("/api/stats/daily", get(daily_stats))
        .route("/api/stats/alltime", get(alltime_stats))
        .route("/api/events/emotion", post(push_emotion))
        .route("/api/events/touch", post(push_touch))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("dashboard.html"))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer(socket, state))
}

/// One viewer connection. The forward task pushes published payloads; the
/// read side only watches for the close. A viewer that lags behind the
/// broadcast capacity skips the missed payloads and resumes at the newest.
async fn handle_viewer(socket: WebSocket, state: AppState) {
    let (mut sink, mut source) = socket.split();
    let mut updates = state.hub.subscribe();
    info!(viewers = state.hub.viewers(), "viewer connected");

    let forward = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(payload) => {
                    if sink
                        .send(Message::Text(payload.to_string()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "viewer lagged, resuming at newest state");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Inbound messages carry no meaning; drain them until the socket ends.
    while let Some(Ok(_)) = source.next().await {}

    forward.abort();
    let _ = forward.await;
    info!("viewer disconnected");
}

/// Latest consolidated state, zero-valued before the first snapshot.
async fn current_state(State(state): State<AppState>) -> Json<DashboardState> {
    Json(latest_or_default(&state).dashboard())
}

async fn daily_stats(State(state): State<AppState>) -> Json<DayStats> {
    Json(latest_or_default(&state).today)
}

async fn alltime_stats(State(state): State<AppState>) -> Json<AllTimeStats> {
    Json(latest_or_default(&state).all_time)
}

fn latest_or_default(state: &AppState) -> Snapshot {
    state.latest.borrow().clone().unwrap_or_else(|| {
        let now = Utc::now();
        Snapshot {
            taken_at: now,
            current_emotion: None,
            active_touches: 0,
            today: DayStats::empty(now.date_naive()),
            all_time: AllTimeStats::default(),
        }
    })
}

#[derive(Deserialize)]
struct EmotionPush {
    emotion: String,
}

#[derive(Deserialize)]
struct TouchPush {
    edge: TouchEdge,
    #[serde(default)]
    electrode: u32,
}

/// Accept a classification event. Label validation happens inside the
/// aggregation task, so even unknown labels are acknowledged here.
async fn push_emotion(
    State(state): State<AppState>,
    Json(push): Json<EmotionPush>,
) -> StatusCode {
    state.events.on_emotion(push.emotion, Utc::now());
    StatusCode::ACCEPTED
}

async fn push_touch(State(state): State<AppState>, Json(push): Json<TouchPush>) -> StatusCode {
    state
        .events
        .on_touch_electrode(push.edge, push.electrode, Utc::now());
    StatusCode::ACCEPTED
}
