//! Registry of faces extracted from videos.
//!
//! An external extractor writes face crops grouped by cluster; [`ingest`]
//! registers them together with their source video, [`resolver`] maps an
//! image handed back by a gallery to its stored face by content hash,
//! [`curation`] names and merges identities, and [`query`] filters and
//! groups faces for display.

pub mod config;
pub mod curation;
pub mod db;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod ingest;
pub mod logging;
pub mod query;
pub mod resolver;

pub use error::{RegistryError, Result};
