use anyhow::Context;
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::{str::FromStr, time::Duration};
use utoipa::ToSchema;

/// Stand-in for "12 months before the latest recorded date".
///
/// The source dataset ends at 2016-08-23; the upstream service hard-coded the
/// cutoff instead of deriving it from MAX(date). Kept as-is so results match
/// the original byte for byte. See DESIGN.md before changing this.
pub const OBSERVATION_CUTOFF: &str = "2016-08-23";

const MEASUREMENT_COLUMNS: [&str; 4] = ["station", "date", "prcp", "tobs"];
const STATION_COLUMNS: [&str; 5] = ["station", "name", "latitude", "longitude", "elevation"];

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to query dataset: {0}")]
    Query(#[from] sqlx::Error),
    #[error("Dataset is missing expected table '{0}'")]
    MissingTable(String),
    #[error("Dataset table '{table}' is missing expected column '{column}'")]
    MissingColumn { table: String, column: String },
}

/// One measurement row's date and precipitation reading.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PrecipitationReading {
    pub date: String,
    pub prcp: Option<f64>,
}

/// One measurement row's date and temperature observation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema, sqlx::FromRow)]
pub struct TemperatureReading {
    #[serde(rename = "Date")]
    pub date: String,
    pub tobs: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema, sqlx::FromRow)]
pub struct StationRecord {
    #[serde(rename = "ID")]
    pub station: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Elevation")]
    pub elevation: f64,
}

/// Aggregate over zero rows still produces one row, with every field null.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema, sqlx::FromRow)]
pub struct TemperatureStats {
    #[serde(rename = "Min")]
    pub min: Option<f64>,
    #[serde(rename = "Max")]
    pub max: Option<f64>,
    #[serde(rename = "Avg")]
    pub avg: Option<f64>,
}

#[async_trait]
pub trait ClimateData: Sync + Send {
    /// (date, prcp) for every measurement with date >= cutoff, in natural row
    /// order. Rows sharing a date (multiple stations) are NOT collapsed.
    async fn precipitation_since(&self, cutoff: &str)
        -> Result<Vec<PrecipitationReading>, Error>;
    /// Distinct station metadata tuples.
    async fn stations(&self) -> Result<Vec<StationRecord>, Error>;
    /// Station id with the highest measurement count, None for an empty
    /// table. Tie-break is whatever ordering SQLite happens to return.
    async fn most_active_station(&self) -> Result<Option<String>, Error>;
    /// (date, tobs) for one station with date >= cutoff.
    async fn observations_since(
        &self,
        station_id: &str,
        cutoff: &str,
    ) -> Result<Vec<TemperatureReading>, Error>;
    /// MIN/MAX/AVG of tobs over date >= start (and date <= stop when given).
    async fn temperature_stats(
        &self,
        start: &str,
        stop: Option<&str>,
    ) -> Result<TemperatureStats, Error>;
}

pub struct ClimateAccess {
    pool: SqlitePool,
}

impl ClimateAccess {
    /// Opens the dataset read-only and verifies the two expected tables are
    /// present before the service accepts traffic. A dataset we cannot serve
    /// is a startup failure, not a per-request one.
    pub async fn new(db_file: &str) -> Result<Self, anyhow::Error> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_file))
            .with_context(|| format!("Invalid dataset path: {}", db_file))?
            .create_if_missing(false)
            .read_only(true)
            .pragma("query_only", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open dataset at: {}", db_file))?;

        let access = Self { pool };
        access.discover_table("measurement", &MEASUREMENT_COLUMNS).await?;
        access.discover_table("station", &STATION_COLUMNS).await?;
        info!("Climate dataset opened read-only at: {}", db_file);

        Ok(access)
    }

    /// Introspects the live schema rather than trusting a hand-declared one:
    /// pulls the table's column list and checks every column we query against.
    async fn discover_table(&self, table: &str, expected: &[&str]) -> Result<(), Error> {
        // PRAGMA does not accept bound parameters; `table` is always one of
        // our own string literals.
        let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Err(Error::MissingTable(table.to_string()));
        }

        let columns: Vec<String> = rows
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();
        for column in expected {
            if !columns.iter().any(|c| c == column) {
                return Err(Error::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }

        info!("Discovered table '{}' with columns: {}", table, columns.join(", "));
        Ok(())
    }
}

#[async_trait]
impl ClimateData for ClimateAccess {
    async fn precipitation_since(
        &self,
        cutoff: &str,
    ) -> Result<Vec<PrecipitationReading>, Error> {
        // One scoped session per request; released on drop before the
        // response is serialized.
        let mut conn = self.pool.acquire().await?;
        let readings = sqlx::query_as::<_, PrecipitationReading>(
            "SELECT date, prcp FROM measurement WHERE date >= ?",
        )
        .bind(cutoff)
        .fetch_all(&mut *conn)
        .await?;
        Ok(readings)
    }

    async fn stations(&self) -> Result<Vec<StationRecord>, Error> {
        let mut conn = self.pool.acquire().await?;
        let stations = sqlx::query_as::<_, StationRecord>(
            "SELECT DISTINCT station, name, latitude, longitude, elevation FROM station",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(stations)
    }

    async fn most_active_station(&self) -> Result<Option<String>, Error> {
        let mut conn = self.pool.acquire().await?;
        let top: Option<(String,)> = sqlx::query_as(
            "SELECT station FROM measurement
             GROUP BY station
             ORDER BY COUNT(station) DESC
             LIMIT 1",
        )
        .fetch_optional(&mut *conn)
        .await?;
        Ok(top.map(|(station,)| station))
    }

    async fn observations_since(
        &self,
        station_id: &str,
        cutoff: &str,
    ) -> Result<Vec<TemperatureReading>, Error> {
        let mut conn = self.pool.acquire().await?;
        let readings = sqlx::query_as::<_, TemperatureReading>(
            "SELECT date, tobs FROM measurement WHERE station = ? AND date >= ?",
        )
        .bind(station_id)
        .bind(cutoff)
        .fetch_all(&mut *conn)
        .await?;
        Ok(readings)
    }

    async fn temperature_stats(
        &self,
        start: &str,
        stop: Option<&str>,
    ) -> Result<TemperatureStats, Error> {
        let mut conn = self.pool.acquire().await?;
        // An aggregate always yields exactly one row; over zero matching rows
        // every column is NULL. fetch_one is therefore safe here.
        let stats = match stop {
            Some(stop) => {
                sqlx::query_as::<_, TemperatureStats>(
                    "SELECT MIN(tobs) AS min, MAX(tobs) AS max, AVG(tobs) AS avg
                     FROM measurement WHERE date >= ? AND date <= ?",
                )
                .bind(start)
                .bind(stop)
                .fetch_one(&mut *conn)
                .await?
            }
            None => {
                sqlx::query_as::<_, TemperatureStats>(
                    "SELECT MIN(tobs) AS min, MAX(tobs) AS max, AVG(tobs) AS avg
                     FROM measurement WHERE date >= ?",
                )
                .bind(start)
                .fetch_one(&mut *conn)
                .await?
            }
        };
        Ok(stats)
    }
}
