use chrono::{DateTime, Duration, SecondsFormat, Utc};
use chronodb_core::{CoreError, CoreResult};
use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::MIGRATOR;

/// Creates a SQLite connection pool configured for catalog workloads.
pub async fn create_sqlite_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<SqlitePool, sqlx::Error> {
    let options = database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Runs all outstanding migrations against the provided connection pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

pub(crate) fn map_sqlx_error(entity: &'static str, id: String, err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            if message.contains("UNIQUE constraint failed") {
                CoreError::already_exists(entity, id)
            } else if message.contains("FOREIGN KEY constraint failed") {
                CoreError::invalid_state(format!("foreign key constraint failed for {entity} `{id}`"))
            } else {
                CoreError::StorageError(message)
            }
        }
        other => CoreError::StorageError(other.to_string()),
    }
}

pub(crate) fn storage_error(err: sqlx::Error) -> CoreError {
    CoreError::StorageError(err.to_string())
}

pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(field: &str, value: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| CoreError::internal(format!("invalid {field}: {err}")))
}

pub(crate) fn encode_duration(field: &str, value: Duration) -> CoreResult<i64> {
    value
        .num_microseconds()
        .ok_or_else(|| CoreError::ValidationError(format!("{field} is out of range")))
}

pub(crate) fn decode_duration(micros: i64) -> Duration {
    Duration::microseconds(micros)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_keep_microseconds() {
        let ts = DateTime::parse_from_rfc3339("2019-07-01T12:00:00.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        let encoded = encode_timestamp(ts);
        assert_eq!(decode_timestamp("last_start", &encoded).unwrap(), ts);
    }

    #[test]
    fn durations_round_trip_as_microseconds() {
        let interval = Duration::days(4) + Duration::microseconds(7);
        let micros = encode_duration("schedule_interval", interval).unwrap();
        assert_eq!(decode_duration(micros), interval);
    }

    #[test]
    fn garbage_timestamp_is_internal_error() {
        let err = decode_timestamp("next_start", "yesterday").unwrap_err();
        assert_eq!(err.code(), "internal_error");
    }
}
