// src/api.rs
//! HTTP monitor-management surface.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::compose::{compose_digest, Digest, DigestWindow};
use crate::error::MonitorError;
use crate::fingerprint::anon_hash;
use crate::history::AlertLog;
use crate::monitor::{
    parse_frequency, Monitor, MonitorId, MonitorKind, MonitorRegistry, Parameters,
};
use crate::rank::{rank_items, TaskItem, TaskRanking, Weights};
use crate::scheduler::{CheckScheduler, CycleReport};
use crate::store::SnapshotStore;

pub const DEFAULT_DIGEST_DAYS: u32 = 7;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MonitorRegistry>,
    pub scheduler: Arc<CheckScheduler>,
    pub alerts: Arc<AlertLog>,
    pub store: Option<Arc<SnapshotStore>>,
}

impl AppState {
    /// State sharing the scheduler's registry and alert log.
    pub fn new(scheduler: Arc<CheckScheduler>, store: Option<Arc<SnapshotStore>>) -> Self {
        Self {
            registry: Arc::clone(scheduler.registry()),
            alerts: Arc::clone(scheduler.alerts()),
            scheduler,
            store,
        }
    }

    async fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.registry).await {
                warn!(target: "api", error = %e, "persisting monitors failed");
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/monitors", post(create_monitor).get(list_monitors))
        .route("/monitors/{id}", get(get_monitor))
        .route("/monitors/{id}/deactivate", post(deactivate_monitor))
        .route("/monitors/{id}/activate", post(activate_monitor))
        .route("/cycle", post(run_cycle))
        .route("/digest", get(get_digest))
        .route("/rank", post(rank))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---- errors ----

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::InvalidParameters(_) => ApiError::BadRequest(err.to_string()),
            MonitorError::NotFound(_) => ApiError::NotFound(err.to_string()),
            MonitorError::Storage(_) | MonitorError::Serialization(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

// ---- monitors ----

/// `"daily"`-style name or a number of seconds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FrequencyInput {
    Seconds(u64),
    Named(String),
}

impl Default for FrequencyInput {
    fn default() -> Self {
        FrequencyInput::Named("daily".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CreateMonitorReq {
    kind: MonitorKind,
    #[serde(default)]
    parameters: Parameters,
    contact: String,
    #[serde(default)]
    frequency: FrequencyInput,
}

/// Monitor as returned over HTTP: the dedup memory is summarized, not dumped.
#[derive(Debug, Serialize, Deserialize)]
pub struct MonitorView {
    pub id: MonitorId,
    pub kind: MonitorKind,
    pub parameters: Parameters,
    pub contact: String,
    pub frequency_secs: u64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_checked: Option<DateTime<Utc>>,
    pub seen_count: usize,
}

impl From<Monitor> for MonitorView {
    fn from(m: Monitor) -> Self {
        Self {
            seen_count: m.seen_fingerprints.len(),
            id: m.id,
            kind: m.kind,
            parameters: m.parameters,
            contact: m.contact,
            frequency_secs: m.frequency_secs,
            active: m.active,
            created_at: m.created_at,
            last_checked: m.last_checked,
        }
    }
}

async fn create_monitor(
    State(state): State<AppState>,
    Json(body): Json<CreateMonitorReq>,
) -> Result<(StatusCode, Json<MonitorView>), ApiError> {
    let frequency = match body.frequency {
        FrequencyInput::Seconds(s) => std::time::Duration::from_secs(s),
        FrequencyInput::Named(name) => parse_frequency(&name)?,
    };
    let monitor = state
        .registry
        .create(body.kind, body.parameters, &body.contact, frequency)?;
    state.persist().await;
    Ok((StatusCode::CREATED, Json(monitor.into())))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    active_only: bool,
    contact: Option<String>,
}

async fn list_monitors(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Json<Vec<MonitorView>> {
    let monitors = match q.contact.as_deref() {
        Some(contact) => state
            .registry
            .for_contact(contact)
            .into_iter()
            .filter(|m| !q.active_only || m.active)
            .collect(),
        None => state.registry.list(q.active_only),
    };
    Json(monitors.into_iter().map(MonitorView::from).collect())
}

async fn get_monitor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MonitorView>, ApiError> {
    state
        .registry
        .get(&MonitorId::from(id.as_str()))
        .map(|m| Json(m.into()))
        .ok_or_else(|| MonitorError::NotFound(id.clone()).into())
}

async fn deactivate_monitor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MonitorView>, ApiError> {
    set_active(state, id, false).await
}

async fn activate_monitor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MonitorView>, ApiError> {
    set_active(state, id, true).await
}

async fn set_active(state: AppState, id: String, active: bool) -> Result<Json<MonitorView>, ApiError> {
    let monitor = state
        .registry
        .set_active(&MonitorId::from(id.as_str()), active)?;
    state.persist().await;
    Ok(Json(monitor.into()))
}

// ---- cycle ----

async fn run_cycle(State(state): State<AppState>) -> Json<CycleReport> {
    let report = state.scheduler.run_cycle(Utc::now()).await;
    state.persist().await;
    Json(report)
}

// ---- digest ----

#[derive(Debug, Deserialize)]
struct DigestQuery {
    contact: String,
    days: Option<u32>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl DigestQuery {
    fn window(&self, now: DateTime<Utc>) -> Result<DigestWindow, ApiError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= end => Ok(DigestWindow { start, end }),
            (Some(_), Some(_)) => Err(ApiError::BadRequest("start must not be after end".into())),
            (None, None) => DigestWindow::last_days(now, self.days.unwrap_or(DEFAULT_DIGEST_DAYS))
                .ok_or_else(|| ApiError::BadRequest("days is out of range".into())),
            _ => Err(ApiError::BadRequest(
                "start and end must be given together".into(),
            )),
        }
    }
}

async fn get_digest(
    State(state): State<AppState>,
    Query(q): Query<DigestQuery>,
) -> Result<Json<Digest>, ApiError> {
    if q.contact.trim().is_empty() {
        return Err(ApiError::BadRequest("contact must not be empty".into()));
    }
    let window = q.window(Utc::now())?;
    let monitors = state.registry.for_contact(&q.contact);
    let digest = compose_digest(&q.contact, &monitors, &state.alerts, window);
    info!(
        target: "api",
        contact = %anon_hash(q.contact.trim()),
        alerts = digest.alerts_included,
        highlights = digest.highlights.len(),
        "digest composed"
    );
    Ok(Json(digest))
}

// ---- ranking ----

#[derive(Debug, Deserialize)]
struct RankReq {
    items: Vec<TaskItem>,
    #[serde(default)]
    weights: Weights,
}

async fn rank(Json(body): Json<RankReq>) -> Json<TaskRanking> {
    Json(rank_items(body.items, &body.weights))
}
