//! vanno-rv library - researcher view
//!
//! Turns stored rating events into charts and participant clusters, and
//! serves them together with the participant save endpoints and the study
//! configuration (videos, sliders, databases) over HTTP.

use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use vanno_common::config::TomlConfig;
use vanno_common::db::{EventStore, SqliteEventStore};
use vanno_common::registry::{SliderRegistry, VideoRegistry};

pub mod access;
pub mod analysis;
pub mod api;
pub mod cache;
pub mod error;

use analysis::AnalysisDefaults;
use cache::ResultCache;

/// The event store requests currently read from and write to
#[derive(Clone)]
pub struct ActiveStore {
    /// Database profile name
    pub name: String,
    pub store: Arc<dyn EventStore>,
}

impl ActiveStore {
    pub fn new(name: &str, store: Arc<dyn EventStore>) -> Self {
        Self {
            name: name.to_string(),
            store,
        }
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<ActiveStore>>,
    pub cache: Arc<ResultCache>,
    pub config: Arc<TomlConfig>,
    pub root_folder: Arc<PathBuf>,
    pub videos: Arc<RwLock<VideoRegistry>>,
    pub sliders: Arc<RwLock<SliderRegistry>>,
    pub defaults: AnalysisDefaults,
}

impl AppState {
    pub fn new(
        config: TomlConfig,
        root_folder: PathBuf,
        active: ActiveStore,
        videos: VideoRegistry,
        sliders: SliderRegistry,
    ) -> Self {
        let defaults = AnalysisDefaults::from(&config.analysis);
        Self {
            store: Arc::new(RwLock::new(active)),
            cache: Arc::new(ResultCache::new()),
            config: Arc::new(config),
            root_folder: Arc::new(root_folder),
            videos: Arc::new(RwLock::new(videos)),
            sliders: Arc::new(RwLock::new(sliders)),
            defaults,
        }
    }

    /// Snapshot of the active store handle
    ///
    /// A request keeps using this handle even if the database is switched
    /// while it runs.
    pub async fn active_store(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.store.read().await.store)
    }

    pub async fn active_database(&self) -> String {
        self.store.read().await.name.clone()
    }

    /// Open a configured database profile and make it the active store
    pub async fn switch_database(&self, name: &str) -> vanno_common::Result<()> {
        let path = self.config.database_path(&self.root_folder, name)?;
        let store = SqliteEventStore::open(&path).await?;

        let mut active = self.store.write().await;
        *active = ActiveStore::new(name, Arc::new(store));
        // Results of the previous database must not outlive the switch
        self.cache.clear().await;

        info!("Switched to database '{}' ({})", name, path.display());
        Ok(())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    Router::new()
        // Participant page
        .route("/api/ratings", post(api::save_rating))
        .route("/api/ratings/2d", post(api::save_rating_2d))
        // Researcher view
        .route("/api/chart/:video_id", get(api::get_chart))
        .route("/api/clusters/:video_id", get(api::get_clusters))
        .route("/api/export", get(api::export_csv))
        .route("/api/export/json", get(api::export_json))
        // Study configuration
        .route("/api/videos", get(api::list_videos).post(api::add_video))
        .route("/api/videos/:id", delete(api::remove_video))
        .route("/api/sliders", get(api::list_sliders).post(api::add_slider))
        .route("/api/sliders/:name", delete(api::remove_slider))
        // Data management
        .route("/api/admin/delete_all", post(api::delete_all))
        .route("/api/admin/databases", get(api::list_databases))
        .route("/api/admin/database", post(api::switch_database))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
