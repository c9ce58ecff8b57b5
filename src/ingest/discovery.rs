use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{RegistryError, Result};

/// Find every crop below `directory` whose extension is in `extensions`.
///
/// Unlike a best-effort scan, an unreadable subdirectory is an error: a face
/// silently skipped here would be missing from an otherwise complete ingest.
pub fn discover_crops(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut crops = Vec::new();

    for entry in WalkDir::new(directory).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(directory).to_path_buf();
            RegistryError::io(path, e.into())
        })?;
        let path = entry.path();

        if entry.file_type().is_file() {
            if let Some(ext) = path.extension() {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                    crops.push(path.to_path_buf());
                }
            }
        }
    }

    // Sort by path for consistent ordering
    crops.sort();

    Ok(crops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_discover_crops() {
        let dir = tempdir().unwrap();

        fs::create_dir(dir.path().join("0")).unwrap();
        fs::create_dir(dir.path().join("noise")).unwrap();
        File::create(dir.path().join("0/10_0.jpg")).unwrap();
        File::create(dir.path().join("0/20_0.JPG")).unwrap();
        File::create(dir.path().join("noise/5_0.jpg")).unwrap();
        File::create(dir.path().join("0/log.txt")).unwrap();

        let extensions = vec!["jpg".to_string()];
        let crops = discover_crops(dir.path(), &extensions).unwrap();

        assert_eq!(crops.len(), 3);
        assert!(crops.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let err = discover_crops(Path::new("/nonexistent/extract"), &["jpg".to_string()]).unwrap_err();
        assert_eq!(err.kind(), "IOError");
    }
}
