use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::sensor::SensorView;
use crate::services::SensorService;

#[derive(Clone)]
pub struct AppState {
    pub sensor_service: SensorService,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/sensors", get(list_sensors))
        .route("/sensors/{entity_id}", get(get_sensor))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[instrument(skip(state))]
async fn list_sensors(State(state): State<AppState>) -> Json<Vec<SensorView>> {
    let sensors = state.sensor_service.sensors().await;
    debug!("Returning {} sensors", sensors.len());
    Json(sensors)
}

#[instrument(skip(state))]
async fn get_sensor(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<SensorView>, StatusCode> {
    let sensor = state
        .sensor_service
        .sensor(&entity_id)
        .await
        .ok_or_else(|| {
            warn!("Sensor {} not found", entity_id);
            StatusCode::NOT_FOUND
        })?;

    info!("Retrieved sensor {} (state {:?})", entity_id, sensor.state);
    Ok(Json(sensor))
}
