//! Persistence boundary for application records, plus the SQLite-backed store.
//!
//! Schema:
//! - medicine_applications: one row per logged administration, keyed by UUID

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::application::ApplicationRecord;
use crate::recurrence::RecurrencePolicy;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS medicine_applications (
    id BLOB PRIMARY KEY,
    medicine_id BLOB NOT NULL,
    user_id BLOB NOT NULL,
    animal_id BLOB NOT NULL,
    applied_at TEXT NOT NULL,
    quantity REAL NOT NULL CHECK (quantity >= 0),
    next_application_at TEXT,
    frequency TEXT NOT NULL,
    ends_at TEXT,
    external_event_ref TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_applications_animal
    ON medicine_applications(animal_id, applied_at);
";

const COLUMNS: &str = "id, medicine_id, user_id, animal_id, applied_at, quantity, \
    next_application_at, frequency, ends_at, external_event_ref, created_at";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("database worker failed: {0}")]
    Worker(String),
    #[error("{0}")]
    Message(String),
}

impl RepositoryError {
    pub fn message<T: Into<String>>(message: T) -> Self {
        RepositoryError::Message(message.into())
    }
}

/// Storage for [`ApplicationRecord`]s.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Insert a new record and return it as stored.
    async fn save(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApplicationRecord>, RepositoryError>;

    /// Delete a record; a missing id is not an error.
    async fn delete_by_id(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Records for one animal, most recent application first.
    async fn list_for_animal(
        &self,
        animal_id: Uuid,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// SQLite-backed repository. Queries run on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteApplicationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteApplicationRepository {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        debug!(path = %path.display(), "Opened application database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, work: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| RepositoryError::message("database connection lock poisoned"))?;
            work(&guard)
        })
        .await
        .map_err(|err| RepositoryError::Worker(err.to_string()))?
    }
}

#[async_trait]
impl ApplicationRepository for SqliteApplicationRepository {
    async fn save(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO medicine_applications ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    record.id,
                    record.medicine_id,
                    record.user_id,
                    record.animal_id,
                    record.applied_at,
                    record.quantity,
                    record.next_application_at,
                    record.recurrence.as_str(),
                    record.ends_at,
                    record.external_event_ref,
                    record.created_at,
                ],
            )?;
            Ok(record)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.run(move |conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM medicine_applications WHERE id = ?1"),
                    params![id],
                    map_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM medicine_applications WHERE id = ?1",
                params![id],
            )?;
            debug!(application_id = %id, removed, "Deleted application row");
            Ok(())
        })
        .await
    }

    async fn list_for_animal(
        &self,
        animal_id: Uuid,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM medicine_applications \
                 WHERE animal_id = ?1 ORDER BY applied_at DESC"
            ))?;
            let records = stmt
                .query_map(params![animal_id], map_record)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<ApplicationRecord> {
    let frequency: String = row.get(7)?;
    let recurrence = frequency.parse::<RecurrencePolicy>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(err))
    })?;

    Ok(ApplicationRecord {
        id: row.get(0)?,
        medicine_id: row.get(1)?,
        user_id: row.get(2)?,
        animal_id: row.get(3)?,
        applied_at: row.get(4)?,
        quantity: row.get(5)?,
        next_application_at: row.get(6)?,
        recurrence,
        ends_at: row.get(8)?,
        external_event_ref: row.get(9)?,
        created_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(animal_id: Uuid, day: u32) -> ApplicationRecord {
        ApplicationRecord {
            id: Uuid::new_v4(),
            medicine_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            animal_id,
            applied_at: Utc.with_ymd_and_hms(2024, 3, day, 9, 30, 0).unwrap(),
            quantity: 1.5,
            next_application_at: Some(Utc.with_ymd_and_hms(2024, 3, day + 1, 9, 30, 0).unwrap()),
            recurrence: RecurrencePolicy::EveryWeekday,
            ends_at: None,
            external_event_ref: Some(format!("evt-{day}")),
            created_at: Utc.with_ymd_and_hms(2024, 3, day, 9, 31, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_save_and_find_round_trip() {
        let repo = SqliteApplicationRepository::open_in_memory().unwrap();
        let stored = repo.save(record(Uuid::new_v4(), 10)).await.unwrap();

        let found = repo.find_by_id(stored.id).await.unwrap();
        assert_eq!(found, Some(stored));
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_ok() {
        let repo = SqliteApplicationRepository::open_in_memory().unwrap();
        repo.delete_by_id(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_for_animal_is_newest_first() {
        let repo = SqliteApplicationRepository::open_in_memory().unwrap();
        let animal = Uuid::new_v4();
        repo.save(record(animal, 10)).await.unwrap();
        repo.save(record(animal, 12)).await.unwrap();
        repo.save(record(Uuid::new_v4(), 11)).await.unwrap();

        let listed = repo.list_for_animal(animal).await.unwrap();
        let days: Vec<_> = listed
            .iter()
            .map(|r| r.external_event_ref.clone().unwrap())
            .collect();
        assert_eq!(days, vec!["evt-12", "evt-10"]);
    }

    #[tokio::test]
    async fn test_negative_quantity_violates_constraint() {
        let repo = SqliteApplicationRepository::open_in_memory().unwrap();
        let mut bad = record(Uuid::new_v4(), 10);
        bad.quantity = -1.0;
        assert!(matches!(
            repo.save(bad).await,
            Err(RepositoryError::Sqlite(_))
        ));
    }
}
