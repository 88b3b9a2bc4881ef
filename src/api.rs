use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::debug;

use crate::config::PublicAppConfig;
use crate::errors::ResolveError;
use crate::model::GeocodeAttempt;
use crate::pipeline::{LocationQuery, Orchestrator, COORDINATE_HINT};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<PublicAppConfig>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub config: PublicAppConfig,
}

/// User-facing failure body. Carries a hint instead of raw provider errors;
/// the attempt trail travels separately in `geocode_debug`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub hint: String,
    pub address_tried: String,
    pub city: String,
    pub area: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geocode_debug: Option<Vec<GeocodeAttempt>>,
}

impl ErrorBody {
    pub fn new(query: &LocationQuery, err: ResolveError) -> Self {
        let error = err.to_string();
        let supplied_text = [&query.address, &query.city, &query.area]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()));
        let (hint, geocode_debug) = match err {
            ResolveError::InvalidCoordinateInput => (COORDINATE_HINT.to_string(), None),
            ResolveError::NoCoordinateFound { hint, debug } => {
                (hint, supplied_text.then_some(debug))
            }
        };
        Self {
            error,
            hint,
            address_tried: query.address.clone().unwrap_or_default(),
            city: query.city.clone().unwrap_or_default(),
            area: query.area.clone().unwrap_or_default(),
            geocode_debug,
        }
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/find-dumpyards", get(find_dumpyards))
        .route("/api/health", get(health))
        .with_state(state)
}

async fn find_dumpyards(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Response {
    match state.orchestrator.run(&query).await {
        Ok(result) => {
            debug!(facilities = result.facilities.len(), "facility lookup complete");
            Json(result).into_response()
        }
        Err(err) => ErrorBody::new(&query, err).into_response(),
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        config: state.config.as_ref().clone(),
    })
}
