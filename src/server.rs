//! ==============================================================================
//! server.rs - web dashboard and json api
//! ==============================================================================
//!
//! routes:
//!     GET  /                              html table of the latest frame
//!     GET  /api                           latest frame as json
//!     GET  /api/channels/:zone/:channel   live stats and retained history
//!     POST /api/publish/:zone/:channel    body = payload text, queued for ingest
//!
//! relationships:
//!     - reads: render.rs (SharedFrame, what the renderer last drew)
//!     - reads: store.rs (lookup, for live per-channel detail)
//!     - writes: ingest.rs (Publisher, same path as any other message)
//!
//! ==============================================================================

use crate::domain::{format_value, Frame, Reading, Stats};
use crate::ingest::Publisher;
use crate::record::RetentionKind;
use crate::render::SharedFrame;
use crate::store::SensorStore;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<SensorStore>,
    pub frame: SharedFrame,
    pub publisher: Publisher,
}

/// live view of one channel
#[derive(Serialize)]
pub struct ChannelDetail {
    pub zone: String,
    pub channel: String,
    pub policy: RetentionKind,
    pub decimals: u8,
    pub stats: Stats,
    pub history: Vec<Reading>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api", get(api_handler))
        .route("/api/channels/:zone/:channel", get(channel_handler))
        .route("/api/publish/:zone/:channel", post(publish_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(bind: &str, state: ServerState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("[SERVER] Dashboard live at http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn dashboard_handler(State(state): State<ServerState>) -> Html<String> {
    Html(render_dashboard(&state.frame.latest().await))
}

/// json api endpoint for programmatic access
async fn api_handler(State(state): State<ServerState>) -> Json<Frame> {
    Json(state.frame.latest().await)
}

async fn channel_handler(
    State(state): State<ServerState>,
    Path((zone, channel)): Path<(String, String)>,
) -> Result<Json<ChannelDetail>, ApiError> {
    let not_found = |e: crate::error::StoreError| {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"status": "error", "message": e.to_string()})),
        )
    };
    let id = state.store.resolve(&zone, &channel).map_err(not_found)?;
    let record = state.store.lookup(&zone, &channel).map_err(not_found)?;
    let decimals = state.store.decimals(id).unwrap_or(1);

    Ok(Json(ChannelDetail {
        policy: record.policy(),
        decimals,
        stats: record.stats(),
        history: record.history(),
        zone,
        channel,
    }))
}

async fn publish_handler(
    State(state): State<ServerState>,
    Path((zone, channel)): Path<(String, String)>,
    payload: String,
) -> ApiError {
    match state.publisher.publish(&zone, &channel, payload).await {
        Ok(topic) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "ok", "topic": topic})),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "error", "message": e.to_string()})),
        ),
    }
}

/// html table of a frame
pub fn render_dashboard(frame: &Frame) -> String {
    let mut rows = String::new();
    for row in &frame.rows {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{} {}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(row.zone.as_str()),
            html_escape(row.channel.as_str()),
            format_value(row.current, row.decimals),
            html_escape(row.channel.unit()),
            format_value(row.minimum, row.decimals),
            format_value(row.maximum, row.decimals),
        ));
    }
    if frame.rows.is_empty() {
        rows.push_str("<tr><td colspan=\"5\">waiting for data</td></tr>\n");
    }

    format!(
        r#"<!doctype html>
<html>
<head><title>enviro</title><meta http-equiv="refresh" content="5"></head>
<body style="font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee;">
<h1>environment</h1>
<table style="border-spacing: 1.5rem 0.25rem;">
<tr><th>zone</th><th>channel</th><th>current</th><th>min</th><th>max</th></tr>
{}</table>
<p style="color: #888;">rendered at {}</p>
</body>
</html>"#,
        rows, frame.rendered_at
    )
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
