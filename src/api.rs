//! ==============================================================================
//! api.rs - http surface
//! ==============================================================================
//!
//! routes:
//!     GET  /api/sensor-data          -> readings.rs (latest or mock)
//!     POST /api/control              -> controls.rs (always "success")
//!     GET  /api/historical-data      -> history.rs  (?hours=N, default 24)
//!     anything else                  -> 404 {status: "error", message}
//!
//! cors is wide open; the dashboard is served from another origin.
//!
//! ==============================================================================

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ApiConfig, HistoryConfig};
use crate::domain::{MockState, SensorReading, StatusResponse};
use crate::store::RemoteStore;
use crate::{controls, history, readings};

// ==============================================================================
// shared state
// ==============================================================================
// cloned into every handler. nothing in here is mutated after startup, so
// no locking is needed.

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RemoteStore>,
    pub mock: Arc<MockState>,
    pub history: HistoryConfig,
    pub log_payloads: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn RemoteStore>, config: &ApiConfig) -> Self {
        Self {
            store,
            mock: Arc::new(config.mock.to_state()),
            history: config.history,
            log_payloads: config.logging.log_payloads,
        }
    }
}

// ==============================================================================
// errors
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("hours must be a non-negative integer, got {0:?}")]
    InvalidHours(String),
    #[error("hours must be at most {max}, got {requested}")]
    TooManyHours { requested: u32, max: u32 },
    #[error("{}", .0.body_text())]
    InvalidBody(JsonRejection),
    #[error("Not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidHours(_) | ApiError::TooManyHours { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvalidBody(rejection) => rejection.status(),
            ApiError::NotFound => StatusCode::NOT_FOUND,
        };
        (status, Json(StatusResponse::error(self.to_string()))).into_response()
    }
}

// ==============================================================================
// router
// ==============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sensor-data", get(sensor_data_handler).fallback(not_found))
        .route("/api/control", post(control_handler).fallback(not_found))
        .route("/api/historical-data", get(historical_data_handler).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// latest reading from the store, or mock data when it has none
async fn sensor_data_handler(State(state): State<AppState>) -> Json<Value> {
    let reading = readings::current_reading(state.store.as_ref(), &state.mock).await;
    Json(reading.into_json())
}

/// POST /api/control with any json body
async fn control_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(settings) = body.map_err(ApiError::InvalidBody)?;
    Ok(Json(controls::update_controls(state.store.as_ref(), settings, state.log_payloads).await))
}

#[derive(Deserialize)]
struct HistoryParams {
    hours: Option<String>,
}

/// GET /api/historical-data?hours=N
async fn historical_data_handler(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<SensorReading>>, ApiError> {
    let hours = parse_hours(params.hours.as_deref(), &state.history)?;
    Ok(Json(history::generate(hours, Local::now())))
}

fn parse_hours(raw: Option<&str>, limits: &HistoryConfig) -> Result<u32, ApiError> {
    let hours = match raw {
        None => limits.default_hours,
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| ApiError::InvalidHours(raw.to_string()))?,
    };
    if hours > limits.max_hours {
        return Err(ApiError::TooManyHours { requested: hours, max: limits.max_hours });
    }
    Ok(hours)
}
