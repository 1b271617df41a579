use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::services::time_service::TimeUtil;

const DEFAULT_TRIGGER_SOURCE: &str = "manual";

/// Thin trigger surface in front of the pipeline worker. Triggers go into a
/// bounded channel: one run executing, one queued, extras dropped, so the
/// stores never see two concurrent writers.
#[derive(Clone)]
pub struct ApiState {
    pub trigger_tx: mpsc::Sender<String>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/trigger", post(trigger))
        .route("/health", get(health))
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({
        "status": "Online",
        "system": "VibePlan",
        "timestamp": TimeUtil::now_utc_iso(),
    }))
}

async fn trigger(State(state): State<ApiState>, headers: HeaderMap) -> Json<Value> {
    let source = trigger_source(&headers);
    match state.trigger_tx.try_send(source.clone()) {
        Ok(()) => info!(target: "app::api", %source, "pipeline trigger accepted"),
        Err(_) => {
            warn!(target: "app::api", %source, "pipeline already queued, trigger dropped");
        }
    }

    Json(json!({
        "status": "Accepted",
        "message": "Pipeline scheduled. Reconcile -> Ingest -> Plan.",
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

fn trigger_source(headers: &HeaderMap) -> String {
    headers
        .get("X-Source")
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_TRIGGER_SOURCE)
        .to_string()
}
