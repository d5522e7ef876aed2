//! HTTP API handlers for vanno-rv

pub mod admin;
pub mod analysis;
pub mod export;
pub mod health;
pub mod ratings;
pub mod registry;

pub use admin::{delete_all, list_databases, switch_database};
pub use analysis::{get_chart, get_clusters};
pub use export::{export_csv, export_json};
pub use health::health_routes;
pub use ratings::{save_rating, save_rating_2d};
pub use registry::{add_slider, add_video, list_sliders, list_videos, remove_slider, remove_video};
