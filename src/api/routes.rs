use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::api::health::HealthSnapshot;
use crate::db::models::DispatchRow;
use crate::db::DispatchLog;
use crate::engine::{DailyRun, Engine, LifetimeAccuracy};
use crate::error::AppError;
use crate::scheduler::JobSummary;
use crate::types::{ControlMsg, ModelId, PredictionRecord};

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
    pub dispatches: DispatchLog,
    pub control_tx: mpsc::Sender<ControlMsg>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/jobs", get(get_jobs))
        .route("/model", get(get_model).put(put_model))
        .route("/run", post(post_run))
        .route("/shutdown", post(post_shutdown))
        .route("/predictions", get(get_predictions))
        .route("/stats/accuracy", get(get_stats_accuracy))
        .route("/dispatches/recent", get(get_recent_dispatches))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param / body structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PredictionsQuery {
    /// Defaults to today in the schedule timezone.
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct RecentDispatchesQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct ModelBody {
    pub model: String,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ModelResponse {
    pub model: ModelId,
    pub available: Vec<ModelId>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.engine.health().snapshot())
}

async fn get_jobs(State(state): State<ApiState>) -> Json<Vec<JobSummary>> {
    Json(state.engine.jobs().await)
}

fn model_response(model: ModelId) -> Json<ModelResponse> {
    Json(ModelResponse { model, available: ModelId::ALL.to_vec() })
}

async fn get_model(State(state): State<ApiState>) -> Json<ModelResponse> {
    model_response(state.engine.model())
}

async fn put_model(
    State(state): State<ApiState>,
    Json(body): Json<ModelBody>,
) -> Result<Json<ModelResponse>, AppError> {
    let model: ModelId = body.model.parse()?;
    state
        .control_tx
        .send(ControlMsg::SwitchModel(model))
        .await
        .map_err(|_| AppError::Config("control loop is not running".to_string()))?;
    Ok(model_response(model))
}

async fn post_run(State(state): State<ApiState>) -> Result<Json<DailyRun>, AppError> {
    Ok(Json(state.engine.run_daily().await?))
}

async fn post_shutdown(State(state): State<ApiState>) -> StatusCode {
    match state.control_tx.send(ControlMsg::Shutdown).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn get_predictions(
    State(state): State<ApiState>,
    Query(params): Query<PredictionsQuery>,
) -> Result<Json<Vec<PredictionRecord>>, AppError> {
    let date = params.date.unwrap_or_else(|| state.engine.now().date_naive());
    Ok(Json(state.engine.predictions_for(date).await?))
}

async fn get_stats_accuracy(
    State(state): State<ApiState>,
) -> Result<Json<LifetimeAccuracy>, AppError> {
    Ok(Json(state.engine.lifetime_accuracy().await?))
}

async fn get_recent_dispatches(
    State(state): State<ApiState>,
    Query(params): Query<RecentDispatchesQuery>,
) -> Result<Json<Vec<DispatchRow>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(state.dispatches.recent(limit).await?))
}
