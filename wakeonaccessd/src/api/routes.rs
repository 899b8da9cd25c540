use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use shared::protocol::API_PREFIX;
use shared::types::WakeEntry;
use wake_on_access::collab::StaticCandidates;
use wake_on_access::{AccessContext, AccessOutcome, WakeOnAccess, WakeOutcome};

#[derive(Clone)]
pub struct AppState {
    pub woa: WakeOnAccess,
    pub hash_rx: watch::Receiver<String>,
    /// Configured discovery hosts, queued when the feature gets switched on
    pub candidates: Arc<Vec<String>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AccessResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<AccessOutcome> for AccessResponse {
    fn from(outcome: AccessOutcome) -> Self {
        let (outcome, error) = match outcome {
            AccessOutcome::Disabled => ("disabled", None),
            AccessOutcome::UnknownHost => ("unknown_host", None),
            AccessOutcome::Touched => ("touched", None),
            AccessOutcome::Wake(Ok(WakeOutcome::AlreadyAwake)) => ("already_awake", None),
            AccessOutcome::Wake(Ok(WakeOutcome::Woken)) => ("woken", None),
            AccessOutcome::Wake(Err(e)) => ("failed", Some(e.to_string())),
        };
        Self { outcome, error }
    }
}

#[derive(Deserialize)]
pub struct AccessQuery {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/hosts", get(get_hosts))
        .route("/hosts/hash", get(get_hash))
        .route("/hosts/:host", get(get_host))
        .route("/access", post(access_url))
        .route("/access/:host", post(access_host))
        .route("/discover/:host", post(discover_host))
        .route("/enabled", get(get_enabled).put(put_enabled))
        .route("/reload", post(reload));

    Router::new().nest(API_PREFIX, v1).with_state(state)
}

async fn get_hosts(State(state): State<AppState>) -> Json<Vec<WakeEntry>> {
    Json(state.woa.registry().entries())
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.hash_rx.borrow().clone()
}

async fn get_host(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> Result<Json<WakeEntry>, StatusCode> {
    state
        .woa
        .registry()
        .find(&host)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Blocks until the host answers or the wake gives up
async fn access_host(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> Result<Json<AccessResponse>, StatusCode> {
    let woa = state.woa.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let trigger = format!("API request for {}", host);
        woa.on_access(&host, &AccessContext::new(&trigger))
    })
    .await
    .map_err(|e| {
        tracing::error!("Access task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(outcome.into()))
}

async fn access_url(
    State(state): State<AppState>,
    Query(params): Query<AccessQuery>,
) -> Result<Json<AccessResponse>, StatusCode> {
    let woa = state.woa.clone();
    let outcome = tokio::task::spawn_blocking(move || woa.on_access_url(&params.url, None))
        .await
        .map_err(|e| {
            tracing::error!("Access task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(outcome.into()))
}

async fn discover_host(State(state): State<AppState>, Path(host): Path<String>) -> StatusCode {
    match state.woa.queue_discovery(&host) {
        Some(_) => StatusCode::ACCEPTED,
        None => StatusCode::CONFLICT,
    }
}

async fn get_enabled(State(state): State<AppState>) -> Json<EnabledBody> {
    Json(EnabledBody {
        enabled: state.woa.is_enabled(),
    })
}

async fn put_enabled(
    State(state): State<AppState>,
    Json(body): Json<EnabledBody>,
) -> Json<EnabledBody> {
    let candidates = StaticCandidates(state.candidates.as_ref().clone());
    let jobs = state.woa.set_enabled(body.enabled, &candidates);
    if !jobs.is_empty() {
        tracing::info!("Queued hardware address discovery for {} hosts", jobs.len());
    }

    Json(EnabledBody {
        enabled: state.woa.is_enabled(),
    })
}

async fn reload(State(state): State<AppState>) -> StatusCode {
    let registry = Arc::clone(state.woa.registry());
    match tokio::task::spawn_blocking(move || registry.reload()).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            tracing::error!("Reload task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
