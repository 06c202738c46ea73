#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! PostgreSQL storage for the mobility pipeline.
//!
//! [`PgStore`] implements the store traits of the index, badge, and
//! competition engines on top of a `switchy_database` connection. Every
//! statement is a named SQL template from `queries/`, embedded at compile
//! time. Spatial columns use `PostGIS`; geometries travel as `GeoJSON`.
//!
//! The schema itself is owned by the portal and is not managed here.

pub mod badges;
pub mod competitions;
pub mod db;
pub mod indexes;
pub mod queries;
pub mod tracks;

use chrono::{DateTime, NaiveDateTime, Utc};
use mobility_track_models::VehicleMode;
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<DbError> for mobility_index::IndexError {
    fn from(value: DbError) -> Self {
        Self::Storage(Box::new(value))
    }
}

impl From<DbError> for mobility_badge::BadgeError {
    fn from(value: DbError) -> Self {
        Self::Storage(Box::new(value))
    }
}

impl From<DbError> for mobility_competition::CompetitionError {
    fn from(value: DbError) -> Self {
        Self::Storage(Box::new(value))
    }
}

/// Store backed by a single database connection.
///
/// Borrowing the connection keeps one store per worker cheap; batch jobs
/// open one connection per worker and wrap it here.
#[derive(Clone, Copy)]
pub struct PgStore<'a> {
    db: &'a dyn Database,
}

impl<'a> PgStore<'a> {
    #[must_use]
    pub const fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    #[must_use]
    pub const fn database(&self) -> &'a dyn Database {
        self.db
    }

    /// `GeoJSON` geometry of a named region of interest.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn region_of_interest(&self, name: &str) -> Result<Option<String>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                queries::SELECT_REGION_OF_INTEREST,
                &[DatabaseValue::String(name.to_string())],
            )
            .await?;

        rows.first()
            .map(|row| row.to_value("geojson").map_err(|e| conversion("geojson", e)))
            .transpose()
    }
}

pub(crate) fn conversion(column: &str, error: impl std::fmt::Display) -> DbError {
    DbError::Conversion {
        message: format!("Failed to read column {column}: {error}"),
    }
}

pub(crate) fn utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

pub(crate) fn parse_vehicle_mode(value: &str) -> Result<VehicleMode, DbError> {
    value.parse::<VehicleMode>().map_err(|e| DbError::Conversion {
        message: format!("Unknown vehicle mode '{value}': {e}"),
    })
}

/// Comma-separated storage names, as expected by `string_to_array`.
pub(crate) fn join_names<T: AsRef<str>>(values: &[T]) -> String {
    values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}
