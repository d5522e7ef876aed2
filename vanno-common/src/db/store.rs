//! Event store trait
//!
//! The analysis pipeline only ever needs three things from storage: append an
//! event, read everything for one video, and bulk-delete. Implementations are
//! passed to the pipeline per call, so the backing database can be switched
//! without touching any global.

use async_trait::async_trait;

use crate::events::{record_username, record_video_id, RatingEvent, RawRecord};
use crate::Result;

/// Selects events for bulk deletion
///
/// Both fields unset matches every event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub video_id: Option<String>,
    pub username: Option<String>,
}

impl EventFilter {
    /// Filter matching every stored event
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching every event of one video
    pub fn video(video_id: impl Into<String>) -> Self {
        Self {
            video_id: Some(video_id.into()),
            username: None,
        }
    }

    pub fn matches(&self, record: &RawRecord) -> bool {
        if let Some(video_id) = &self.video_id {
            if record_video_id(record).as_deref() != Some(video_id.as_str()) {
                return false;
            }
        }
        if let Some(username) = &self.username {
            if record_username(record).as_deref() != Some(username.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Append-only collection of rating documents
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Short description for logs (e.g. the database path)
    fn describe(&self) -> String;

    /// Store a validated event
    async fn insert(&self, event: &RatingEvent) -> Result<()> {
        self.insert_raw(event.to_record()).await
    }

    /// Store a document as-is
    async fn insert_raw(&self, record: RawRecord) -> Result<()>;

    /// Every stored document, in no particular order
    async fn fetch_all(&self) -> Result<Vec<RawRecord>>;

    /// Every document belonging to one video
    async fn fetch_video(&self, video_id: &str) -> Result<Vec<RawRecord>> {
        let filter = EventFilter::video(video_id);
        Ok(self
            .fetch_all()
            .await?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    /// Remove matching documents, returning how many were removed
    async fn delete_matching(&self, filter: &EventFilter) -> Result<u64>;
}
