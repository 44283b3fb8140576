use crate::helpers::{spawn_app, MockClimateAccess};
use axum::{
    body::{to_bytes, Body},
    http::Request,
};
use climate_api::{
    PrecipitationReading, StationRecord, TemperatureReading, TemperatureStats, OBSERVATION_CUTOFF,
};
use hyper::{header, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn get_json(test_app: &crate::helpers::TestApp, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();

    let response = test_app
        .app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to execute request.");

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).expect("Response body was not valid JSON");
    (status, json)
}

#[tokio::test]
async fn home_lists_the_data_routes() {
    let climate_db = MockClimateAccess::new();
    let test_app = spawn_app(Arc::new(climate_db)).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let response = test_app
        .app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();

    assert!(html.contains("/api/v1.0/precipitation"));
    assert!(html.contains("/api/v1.0/stations"));
    assert!(html.contains("/api/v1.0/tobs"));
    assert!(html.contains("/api/v1.0/&lt;start&gt;"));
    assert!(html.contains("/api/v1.0/&lt;start&gt;/&lt;stop&gt;"));
}

#[tokio::test]
async fn precipitation_returns_one_entry_per_measurement_row() {
    let mut climate_db = MockClimateAccess::new();

    climate_db
        .expect_precipitation_since()
        .withf(|cutoff| cutoff == OBSERVATION_CUTOFF)
        .times(1)
        .returning(|_| Ok(mock_precipitation()));

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (status, json) = get_json(&test_app, "/api/v1.0/precipitation").await;

    assert!(status.is_success());
    let entries = json.as_array().expect("Expected a JSON array");
    assert_eq!(entries.len(), 3);
    // Every entry maps exactly one date to its reading
    for entry in entries {
        assert_eq!(entry.as_object().unwrap().len(), 1);
    }
    assert_eq!(entries[0], serde_json::json!({"2016-08-24": 0.08}));
    assert_eq!(entries[1], serde_json::json!({"2016-08-24": 2.15}));
    assert_eq!(entries[2], serde_json::json!({"2016-08-25": null}));
}

#[tokio::test]
async fn stations_returns_flat_report_objects() {
    let mut climate_db = MockClimateAccess::new();

    climate_db
        .expect_stations()
        .times(1)
        .returning(|| Ok(mock_stations()));

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (status, json) = get_json(&test_app, "/api/v1.0/stations").await;

    assert!(status.is_success());
    let stations = json.as_array().expect("Expected a JSON array");
    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0]["ID"], "USC00519397");
    assert_eq!(stations[0]["Name"], "WAIKIKI 717.2, HI US");
    assert_eq!(stations[0]["Latitude"], 21.2716);
    assert_eq!(stations[0]["Longitude"], -157.8168);
    assert_eq!(stations[0]["Elevation"], 3.0);
    assert_eq!(stations[1]["ID"], "USC00519281");
}

#[tokio::test]
async fn tobs_queries_only_the_most_active_station() {
    let mut climate_db = MockClimateAccess::new();

    climate_db
        .expect_most_active_station()
        .times(1)
        .returning(|| Ok(Some(String::from("USC00519281"))));
    climate_db
        .expect_observations_since()
        .withf(|station_id, cutoff| station_id == "USC00519281" && cutoff == OBSERVATION_CUTOFF)
        .times(1)
        .returning(|_, _| Ok(mock_observations()));

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (status, json) = get_json(&test_app, "/api/v1.0/tobs").await;

    assert!(status.is_success());
    let readings = json.as_array().expect("Expected a JSON array");
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0]["Date"], "2016-08-24");
    assert_eq!(readings[0]["tobs"], 77.0);
    assert_eq!(readings[1]["Date"], "2016-08-25");
    assert_eq!(readings[1]["tobs"], 80.0);
}

#[tokio::test]
async fn tobs_is_empty_when_the_dataset_has_no_measurements() {
    let mut climate_db = MockClimateAccess::new();

    climate_db
        .expect_most_active_station()
        .times(1)
        .returning(|| Ok(None));
    climate_db.expect_observations_since().never();

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (status, json) = get_json(&test_app, "/api/v1.0/tobs").await;

    assert!(status.is_success());
    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn start_route_returns_exactly_one_stats_object() {
    let mut climate_db = MockClimateAccess::new();

    climate_db
        .expect_temperature_stats()
        .withf(|start, stop| start == "2016-01-01" && stop.is_none())
        .times(1)
        .returning(|_, _| {
            Ok(TemperatureStats {
                min: Some(53.0),
                max: Some(87.0),
                avg: Some(71.6),
            })
        });

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (status, json) = get_json(&test_app, "/api/v1.0/2016-01-01").await;

    assert!(status.is_success());
    let stats = json.as_array().expect("Expected a JSON array");
    assert_eq!(stats.len(), 1);
    let min = stats[0]["Min"].as_f64().unwrap();
    let max = stats[0]["Max"].as_f64().unwrap();
    let avg = stats[0]["Avg"].as_f64().unwrap();
    assert!(min <= avg && avg <= max);
}

#[tokio::test]
async fn range_route_passes_both_bounds_to_the_query() {
    let mut climate_db = MockClimateAccess::new();

    climate_db
        .expect_temperature_stats()
        .withf(|start, stop| start == "2017-01-01" && *stop == Some("2017-01-07"))
        .times(1)
        .returning(|_, _| {
            Ok(TemperatureStats {
                min: Some(62.0),
                max: Some(74.0),
                avg: Some(68.5),
            })
        });

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (status, json) = get_json(&test_app, "/api/v1.0/2017-01-01/2017-01-07").await;

    assert!(status.is_success());
    assert_eq!(
        json,
        serde_json::json!([{"Min": 62.0, "Max": 74.0, "Avg": 68.5}])
    );
}

#[tokio::test]
async fn inverted_range_yields_a_null_filled_aggregate() {
    let mut climate_db = MockClimateAccess::new();

    // start > stop matches no rows; the aggregate still produces one row
    climate_db
        .expect_temperature_stats()
        .withf(|start, stop| start == "2017-06-01" && *stop == Some("2017-01-01"))
        .times(1)
        .returning(|_, _| {
            Ok(TemperatureStats {
                min: None,
                max: None,
                avg: None,
            })
        });

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (status, json) = get_json(&test_app, "/api/v1.0/2017-06-01/2017-01-01").await;

    assert!(status.is_success());
    assert_eq!(
        json,
        serde_json::json!([{"Min": null, "Max": null, "Avg": null}])
    );
}

#[tokio::test]
async fn malformed_date_passes_through_without_a_client_error() {
    let mut climate_db = MockClimateAccess::new();

    // No validation: the raw segment reaches the query untouched
    climate_db
        .expect_temperature_stats()
        .withf(|start, stop| start == "not-a-date" && stop.is_none())
        .times(1)
        .returning(|_, _| {
            Ok(TemperatureStats {
                min: None,
                max: None,
                avg: None,
            })
        });

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (status, json) = get_json(&test_app, "/api/v1.0/not-a-date").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["Min"], Value::Null);
}

#[tokio::test]
async fn static_routes_win_over_the_date_capture() {
    let mut climate_db = MockClimateAccess::new();

    // If /api/v1.0/stations were ever routed as a {start} capture this
    // expectation would trip
    climate_db.expect_temperature_stats().never();
    climate_db
        .expect_stations()
        .times(1)
        .returning(|| Ok(mock_stations()));

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (status, json) = get_json(&test_app, "/api/v1.0/stations").await;

    assert!(status.is_success());
    assert!(json.as_array().unwrap()[0].get("ID").is_some());
}

#[tokio::test]
async fn repeated_calls_return_identical_results() {
    let mut climate_db = MockClimateAccess::new();

    climate_db
        .expect_precipitation_since()
        .times(2)
        .returning(|_| Ok(mock_precipitation()));

    let test_app = spawn_app(Arc::new(climate_db)).await;
    let (_, first) = get_json(&test_app, "/api/v1.0/precipitation").await;
    let (_, second) = get_json(&test_app, "/api/v1.0/precipitation").await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn dataset_errors_surface_as_server_errors() {
    let mut climate_db = MockClimateAccess::new();

    climate_db
        .expect_stations()
        .times(1)
        .returning(|| Err(climate_api::db::Error::MissingTable(String::from("station"))));

    let test_app = spawn_app(Arc::new(climate_db)).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1.0/stations")
        .body(Body::empty())
        .unwrap();

    let response = test_app
        .app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

fn mock_precipitation() -> Vec<PrecipitationReading> {
    vec![
        PrecipitationReading {
            date: String::from("2016-08-24"),
            prcp: Some(0.08),
        },
        // Same date, different station: stays a separate entry
        PrecipitationReading {
            date: String::from("2016-08-24"),
            prcp: Some(2.15),
        },
        PrecipitationReading {
            date: String::from("2016-08-25"),
            prcp: None,
        },
    ]
}

fn mock_stations() -> Vec<StationRecord> {
    vec![
        StationRecord {
            station: String::from("USC00519397"),
            name: String::from("WAIKIKI 717.2, HI US"),
            latitude: 21.2716,
            longitude: -157.8168,
            elevation: 3.0,
        },
        StationRecord {
            station: String::from("USC00519281"),
            name: String::from("WAIHEE 837.5, HI US"),
            latitude: 21.45167,
            longitude: -157.84889,
            elevation: 32.9,
        },
    ]
}

fn mock_observations() -> Vec<TemperatureReading> {
    vec![
        TemperatureReading {
            date: String::from("2016-08-24"),
            tobs: Some(77.0),
        },
        TemperatureReading {
            date: String::from("2016-08-25"),
            tobs: Some(80.0),
        },
    ]
}
