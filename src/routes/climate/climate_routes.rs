use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use log::error;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{
    db, AppState, PrecipitationReading, StationRecord, TemperatureReading, TemperatureStats,
    OBSERVATION_CUTOFF,
};

fn internal_error(err: db::Error) -> (StatusCode, String) {
    error!("error querying climate dataset: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to query dataset: {}", err),
    )
}

/// Shapes precipitation rows as the upstream API did: one single-key object
/// per measurement row, date mapped to reading. Rows sharing a date are kept
/// separate rather than merged.
pub fn precipitation_entries(readings: Vec<PrecipitationReading>) -> Vec<Value> {
    readings
        .into_iter()
        .map(|reading| {
            let mut entry = Map::new();
            entry.insert(reading.date, serde_json::json!(reading.prcp));
            Value::Object(entry)
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/api/v1.0/precipitation",
    responses(
        (status = OK, description = "Precipitation readings for the last recorded year, one object per measurement row", body = Vec<Value>),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query dataset")
    ))]
pub async fn precipitation(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Value>>, (StatusCode, String)> {
    let readings = state
        .climate_db
        .precipitation_since(OBSERVATION_CUTOFF)
        .await
        .map_err(internal_error)?;

    Ok(Json(precipitation_entries(readings)))
}

#[utoipa::path(
    get,
    path = "/api/v1.0/stations",
    responses(
        (status = OK, description = "Distinct weather stations in the dataset", body = Vec<StationRecord>),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query dataset")
    ))]
pub async fn stations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StationRecord>>, (StatusCode, String)> {
    let stations = state.climate_db.stations().await.map_err(internal_error)?;

    Ok(Json(stations))
}

#[utoipa::path(
    get,
    path = "/api/v1.0/tobs",
    responses(
        (status = OK, description = "Temperature observations for the most active station over the last recorded year", body = Vec<TemperatureReading>),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query dataset")
    ))]
pub async fn tobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TemperatureReading>>, (StatusCode, String)> {
    let Some(station_id) = state
        .climate_db
        .most_active_station()
        .await
        .map_err(internal_error)?
    else {
        // No measurements at all, so no most-active station exists
        return Ok(Json(vec![]));
    };

    let readings = state
        .climate_db
        .observations_since(&station_id, OBSERVATION_CUTOFF)
        .await
        .map_err(internal_error)?;

    Ok(Json(readings))
}

// The start/stop parameters are deliberately NOT validated as dates. The
// upstream API passed them straight into the SQL comparison, so a malformed
// value degrades to string comparison and yields a null-filled aggregate
// instead of a 4xx. Preserved for parity.

#[utoipa::path(
    get,
    path = "/api/v1.0/{start}",
    params(
        ("start" = String, Path, description = "Inclusive ISO lower bound for observation dates"),
    ),
    responses(
        (status = OK, description = "Min/max/avg temperature from the start date onward; nulls when no rows match", body = Vec<TemperatureStats>),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query dataset")
    ))]
pub async fn temperature_stats_from(
    State(state): State<Arc<AppState>>,
    Path(start): Path<String>,
) -> Result<Json<Vec<TemperatureStats>>, (StatusCode, String)> {
    let stats = state
        .climate_db
        .temperature_stats(&start, None)
        .await
        .map_err(internal_error)?;

    Ok(Json(vec![stats]))
}

#[utoipa::path(
    get,
    path = "/api/v1.0/{start}/{stop}",
    params(
        ("start" = String, Path, description = "Inclusive ISO lower bound for observation dates"),
        ("stop" = String, Path, description = "Inclusive ISO upper bound for observation dates"),
    ),
    responses(
        (status = OK, description = "Min/max/avg temperature within the date range; nulls when no rows match", body = Vec<TemperatureStats>),
        (status = INTERNAL_SERVER_ERROR, description = "Failed to query dataset")
    ))]
pub async fn temperature_stats_range(
    State(state): State<Arc<AppState>>,
    Path((start, stop)): Path<(String, String)>,
) -> Result<Json<Vec<TemperatureStats>>, (StatusCode, String)> {
    let stats = state
        .climate_db
        .temperature_stats(&start, Some(&stop))
        .await
        .map_err(internal_error)?;

    Ok(Json(vec![stats]))
}
