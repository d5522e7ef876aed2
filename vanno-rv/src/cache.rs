//! Result cache for computed charts and clusterings
//!
//! Artifacts are held behind `Arc` and replaced whole, so a reader gets either
//! the previous artifact or the new one, never a mix. Invalidation keeps the
//! last artifact around but marks it stale; callers treat stale like missing
//! and recompute.
//!
//! Every video carries a generation that `invalidate` bumps, and `clear` bumps
//! a cache-wide epoch. A computation takes a [`CacheTicket`] before reading the
//! store and may only publish its result while that ticket is still current,
//! so a save that lands mid-computation never ends up behind a fresh artifact.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::analysis::cluster::ClusterReport;
use crate::analysis::plot::ChartData;

/// Kind of computed result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Chart,
    Clusters,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub video_id: String,
    pub kind: ArtifactKind,
}

impl CacheKey {
    pub fn new(video_id: &str, kind: ArtifactKind) -> Self {
        Self {
            video_id: video_id.to_string(),
            kind,
        }
    }
}

/// A cached computation result
#[derive(Debug, Clone)]
pub enum Artifact {
    Chart(Arc<ChartData>),
    Clusters(Arc<ClusterReport>),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Chart(_) => ArtifactKind::Chart,
            Artifact::Clusters(_) => ArtifactKind::Clusters,
        }
    }

    pub fn into_chart(self) -> Option<Arc<ChartData>> {
        match self {
            Artifact::Chart(chart) => Some(chart),
            Artifact::Clusters(_) => None,
        }
    }

    pub fn into_clusters(self) -> Option<Arc<ClusterReport>> {
        match self {
            Artifact::Clusters(report) => Some(report),
            Artifact::Chart(_) => None,
        }
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone)]
pub enum CacheLookup {
    Fresh(Artifact),
    /// Invalidated since it was stored; holds the last known good artifact
    Stale(Artifact),
    Missing,
}

impl CacheLookup {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CacheLookup::Fresh(_))
    }

    /// Stale and missing both mean the caller must recompute
    pub fn needs_recompute(&self) -> bool {
        !self.is_fresh()
    }
}

/// Generation snapshot taken before a computation reads the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTicket {
    epoch: u64,
    generation: u64,
}

#[derive(Debug)]
struct CacheSlot {
    artifact: Artifact,
    stale: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheSlot>,
    generations: HashMap<String, u64>,
    epoch: u64,
}

impl CacheState {
    fn ticket(&self, video_id: &str) -> CacheTicket {
        CacheTicket {
            epoch: self.epoch,
            generation: self.generations.get(video_id).copied().unwrap_or(0),
        }
    }

    fn lookup(&self, video_id: &str, kind: ArtifactKind) -> CacheLookup {
        match self.entries.get(&CacheKey::new(video_id, kind)) {
            Some(slot) if slot.stale => CacheLookup::Stale(slot.artifact.clone()),
            Some(slot) => CacheLookup::Fresh(slot.artifact.clone()),
            None => CacheLookup::Missing,
        }
    }
}

/// Process-wide cache shared by all request handlers
#[derive(Debug, Default)]
pub struct ResultCache {
    state: RwLock<CacheState>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh artifact, if any
    pub async fn get(&self, video_id: &str, kind: ArtifactKind) -> Option<Artifact> {
        match self.lookup(video_id, kind).await {
            CacheLookup::Fresh(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub async fn lookup(&self, video_id: &str, kind: ArtifactKind) -> CacheLookup {
        self.state.read().await.lookup(video_id, kind)
    }

    /// Lookup plus the ticket a recomputation must present to [`Self::set`]
    pub async fn lookup_for_update(
        &self,
        video_id: &str,
        kind: ArtifactKind,
    ) -> (CacheLookup, CacheTicket) {
        let state = self.state.read().await;
        (state.lookup(video_id, kind), state.ticket(video_id))
    }

    pub async fn ticket(&self, video_id: &str) -> CacheTicket {
        self.state.read().await.ticket(video_id)
    }

    /// Store a freshly computed artifact if nothing was invalidated since
    /// `ticket` was taken
    ///
    /// Returns whether the artifact was stored.
    pub async fn set(&self, video_id: &str, artifact: Artifact, ticket: CacheTicket) -> bool {
        let key = CacheKey::new(video_id, artifact.kind());
        let mut state = self.state.write().await;
        if state.ticket(video_id) != ticket {
            debug!(
                "Discarding {:?} for video {}: invalidated during computation",
                key.kind, video_id
            );
            return false;
        }
        debug!("Caching {:?} for video {}", key.kind, video_id);
        state.entries.insert(
            key,
            CacheSlot {
                artifact,
                stale: false,
            },
        );
        true
    }

    /// Mark every artifact of a video stale and retire outstanding tickets
    pub async fn invalidate(&self, video_id: &str) {
        let mut state = self.state.write().await;
        *state.generations.entry(video_id.to_string()).or_insert(0) += 1;
        for kind in [ArtifactKind::Chart, ArtifactKind::Clusters] {
            if let Some(slot) = state.entries.get_mut(&CacheKey::new(video_id, kind)) {
                slot.stale = true;
            }
        }
    }

    /// Drop everything
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let dropped = state.entries.len();
        state.entries.clear();
        state.generations.clear();
        state.epoch += 1;
        debug!("Cleared {} cached artifact(s)", dropped);
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::resample::ExtentPolicy;

    fn chart(video_id: &str) -> Artifact {
        Artifact::Chart(Arc::new(ChartData {
            video_id: video_id.to_string(),
            variable: "value".to_string(),
            variables: vec!["value".to_string()],
            extent: ExtentPolicy::Global,
            max_t: 1.0,
            lines: Vec::new(),
            points: Vec::new(),
            mean: None,
            dropped_users: Vec::new(),
        }))
    }

    #[tokio::test]
    async fn test_tri_state() {
        let cache = ResultCache::new();
        assert!(matches!(
            cache.lookup("1", ArtifactKind::Chart).await,
            CacheLookup::Missing
        ));

        let ticket = cache.ticket("1").await;
        assert!(cache.set("1", chart("1"), ticket).await);
        assert!(cache.lookup("1", ArtifactKind::Chart).await.is_fresh());
        assert!(cache.get("1", ArtifactKind::Chart).await.is_some());
        assert!(cache.get("1", ArtifactKind::Clusters).await.is_none());

        cache.invalidate("1").await;
        let lookup = cache.lookup("1", ArtifactKind::Chart).await;
        assert!(matches!(lookup, CacheLookup::Stale(_)));
        assert!(lookup.needs_recompute());
        assert!(cache.get("1", ArtifactKind::Chart).await.is_none());

        let (_, ticket) = cache.lookup_for_update("1", ArtifactKind::Chart).await;
        assert!(cache.set("1", chart("1"), ticket).await);
        assert!(cache.lookup("1", ArtifactKind::Chart).await.is_fresh());
    }

    #[tokio::test]
    async fn test_invalidate_is_per_video() {
        let cache = ResultCache::new();
        for video in ["1", "2"] {
            let ticket = cache.ticket(video).await;
            cache.set(video, chart(video), ticket).await;
        }

        cache.invalidate("1").await;
        assert!(cache.get("2", ArtifactKind::Chart).await.is_some());
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
        assert!(matches!(
            cache.lookup("2", ArtifactKind::Chart).await,
            CacheLookup::Missing
        ));
    }

    #[tokio::test]
    async fn test_set_after_invalidate_is_discarded() {
        let cache = ResultCache::new();

        // A save lands while the chart is being computed
        let (lookup, ticket) = cache.lookup_for_update("1", ArtifactKind::Chart).await;
        assert!(matches!(lookup, CacheLookup::Missing));
        cache.invalidate("1").await;
        assert!(!cache.set("1", chart("1"), ticket).await);
        assert!(cache.is_empty().await);

        // Other videos keep their tickets
        let other = cache.ticket("2").await;
        cache.invalidate("1").await;
        assert!(cache.set("2", chart("2"), other).await);

        let ticket = cache.ticket("1").await;
        cache.clear().await;
        assert!(!cache.set("1", chart("1"), ticket).await);

        let ticket = cache.ticket("1").await;
        assert!(cache.set("1", chart("1"), ticket).await);
        assert!(cache.lookup("1", ArtifactKind::Chart).await.is_fresh());
    }

    #[tokio::test]
    async fn test_artifact_accessors() {
        let artifact = chart("1");
        assert_eq!(artifact.kind(), ArtifactKind::Chart);
        assert!(artifact.clone().into_clusters().is_none());
        assert_eq!(artifact.into_chart().unwrap().video_id, "1");
    }
}
