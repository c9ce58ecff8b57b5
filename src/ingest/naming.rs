//! The extractor's output naming schema.
//!
//! ```text
//! <output root>/
//! ├── 0/
//! │   ├── 120_0.jpg        frame 120, cluster 0
//! │   └── 488_1.jpg
//! └── noise/
//!     └── 73_0.jpg         frame 73, unclustered (-1)
//! ```
//!
//! The frame number is required: without it no timestamp can be derived, so a
//! malformed filename is a `Parse` error. The cluster directory is only a hint
//! and falls back to [`UNCLUSTERED`].

use std::path::Path;
use tracing::warn;

use crate::db::UNCLUSTERED;
use crate::error::{RegistryError, Result};

/// Frame number from the leading numeric segment of `{frame}_{suffix}.jpg`.
pub fn parse_frame_number(path: &Path) -> Result<i64> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .ok_or_else(|| RegistryError::Parse(format!("no file name in {}", path.display())))?;

    let token = stem.split('_').next().unwrap_or_default();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RegistryError::Parse(format!(
            "frame number missing from {}",
            path.display()
        )));
    }

    token.parse::<i64>().map_err(|e| {
        RegistryError::Parse(format!("frame number in {}: {}", path.display(), e))
    })
}

/// Cluster id from the directory holding `path` below `root`.
pub fn parse_cluster_id(root: &Path, path: &Path) -> i64 {
    let token = path
        .strip_prefix(root)
        .ok()
        .and_then(|rel| rel.parent())
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().into_owned());

    match token.as_deref().map(str::parse::<i64>) {
        Some(Ok(cluster_id)) => cluster_id,
        Some(Err(_)) => {
            warn!("Unclustered crop {:?} (token {:?})", path, token);
            UNCLUSTERED
        }
        None => UNCLUSTERED,
    }
}

/// Frame rates that are negative or not finite are treated as unknown.
pub fn normalize_fps(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        0.0
    }
}

pub fn timestamp_seconds(frame_number: i64, fps: f64) -> f64 {
    if fps > 0.0 {
        frame_number as f64 / fps
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_frame_number() {
        assert_eq!(parse_frame_number(Path::new("/out/3/120_0.jpg")).unwrap(), 120);
        assert_eq!(parse_frame_number(Path::new("/out/3/0007_face_2.jpg")).unwrap(), 7);
        assert_eq!(parse_frame_number(Path::new("/out/3/42.jpg")).unwrap(), 42);
    }

    #[test]
    fn test_parse_frame_number_rejects_malformed() {
        for name in ["face_12.jpg", "_1.jpg", "-5_0.jpg", "12a_0.jpg", "99999999999999999999_0.jpg"] {
            let err = parse_frame_number(&PathBuf::from("/out/0").join(name)).unwrap_err();
            assert!(matches!(err, RegistryError::Parse(_)), "{} should not parse", name);
        }
    }

    #[test]
    fn test_parse_cluster_id() {
        let root = Path::new("/out");
        assert_eq!(parse_cluster_id(root, Path::new("/out/4/1_0.jpg")), 4);
        assert_eq!(parse_cluster_id(root, Path::new("/out/noise/1_0.jpg")), UNCLUSTERED);
        assert_eq!(parse_cluster_id(root, Path::new("/out/1_0.jpg")), UNCLUSTERED);
    }

    #[test]
    fn test_timestamp_is_exact_division() {
        assert_eq!(timestamp_seconds(90, 30.0), 3.0);
        assert_eq!(timestamp_seconds(1001, 30000.0 / 1001.0), 1001.0 / (30000.0 / 1001.0));
        assert_eq!(timestamp_seconds(90, 0.0), 0.0);
    }

    #[test]
    fn test_normalize_fps() {
        assert_eq!(normalize_fps(25.0), 25.0);
        assert_eq!(normalize_fps(-1.0), 0.0);
        assert_eq!(normalize_fps(f64::NAN), 0.0);
        assert_eq!(normalize_fps(f64::INFINITY), 0.0);
    }
}
