//! # vanno Common Library
//!
//! Shared code for the vanno video-annotation services:
//! - Rating event model and raw store records
//! - Event store adapter (SQLite and in-memory)
//! - Bootstrap configuration loading
//! - File-based video and slider registries

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod registry;

pub use error::{Error, Result};
pub use events::{RatingEvent, RawRecord};
