//! SQLite-backed event store

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::init::init_database;
use super::store::{EventFilter, EventStore};
use crate::events::{record_username, record_video_id, RawRecord};
use crate::{Error, Result};

/// Ratings stored as JSON documents in one SQLite file
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteEventStore {
    /// Open (creating if needed) the database at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = init_database(path).await?;
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_rows(rows: Vec<(String, String)>) -> Result<Vec<RawRecord>> {
        rows.into_iter()
            .map(|(guid, document)| -> Result<RawRecord> {
                match serde_json::from_str::<serde_json::Value>(&document)? {
                    serde_json::Value::Object(map) => Ok(map),
                    _ => Err(Error::Internal(format!(
                        "rating {} is not a JSON object",
                        guid
                    ))),
                }
            })
            .collect()
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    async fn insert_raw(&self, record: RawRecord) -> Result<()> {
        let guid = Uuid::new_v4().to_string();
        let document = serde_json::to_string(&record)?;

        sqlx::query(
            "INSERT INTO ratings (guid, video_id, username, document) VALUES (?, ?, ?, ?)",
        )
        .bind(&guid)
        .bind(record_video_id(&record))
        .bind(record_username(&record))
        .bind(document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<RawRecord>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT guid, document FROM ratings ORDER BY created_at, guid")
                .fetch_all(&self.pool)
                .await?;
        Self::parse_rows(rows)
    }

    async fn fetch_video(&self, video_id: &str) -> Result<Vec<RawRecord>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT guid, document FROM ratings WHERE video_id = ? ORDER BY created_at, guid",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        debug!("Fetched {} ratings for video {}", rows.len(), video_id);
        Self::parse_rows(rows)
    }

    async fn delete_matching(&self, filter: &EventFilter) -> Result<u64> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM ratings WHERE 1 = 1");
        if let Some(video_id) = &filter.video_id {
            query.push(" AND video_id = ").push_bind(video_id.clone());
        }
        if let Some(username) = &filter.username {
            query.push(" AND username = ").push_bind(username.clone());
        }

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
