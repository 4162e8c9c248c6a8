pub mod operations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};

pub(crate) fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Invalid {}: {}", column, e)))
}

pub(crate) fn parse_date(value: &str, column: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| AppError::Database(format!("Invalid {}: {}", column, e)))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
