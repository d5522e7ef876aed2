//! In-memory event store for tests and throwaway sessions

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{EventFilter, EventStore};
use crate::events::RawRecord;
use crate::Result;

#[derive(Debug, Default)]
pub struct MemoryEventStore {
    records: RwLock<Vec<RawRecord>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with documents
    pub fn with_records(records: Vec<RawRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    fn describe(&self) -> String {
        "in-memory store".to_string()
    }

    async fn insert_raw(&self, record: RawRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<RawRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn delete_matching(&self, filter: &EventFilter) -> Result<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| !filter.matches(record));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RatingEvent;

    fn event(video: &str, user: &str, t: f64) -> RatingEvent {
        RatingEvent::from_submission(video, user, t, &["value".to_string()], &[50.0], None)
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_fetch_and_delete() {
        let store = MemoryEventStore::new();
        store.insert(&event("1", "a", 0.0)).await.unwrap();
        store.insert(&event("1", "b", 1.0)).await.unwrap();
        store.insert(&event("2", "a", 2.0)).await.unwrap();

        assert_eq!(store.fetch_all().await.unwrap().len(), 3);
        assert_eq!(store.fetch_video("1").await.unwrap().len(), 2);

        let removed = store.delete_matching(&EventFilter::video("1")).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len().await, 1);

        let removed = store.delete_matching(&EventFilter::all()).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.is_empty().await);
    }
}
