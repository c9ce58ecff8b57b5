//! Extraction ingest: run the extractor, read back its crops and register one
//! video plus all of its faces atomically.
//!
//! The store transaction is opened only after extraction has finished and
//! every crop has been parsed and fingerprinted, so a slow extractor never
//! holds the registry open.

pub mod discovery;
pub mod extractor;
pub mod naming;

use chrono::Utc;
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::db::{Database, NewFace, NewVideo};
use crate::error::{RegistryError, Result};
use crate::fingerprint::fingerprint_file;

pub use discovery::discover_crops;
pub use extractor::{CommandExtractor, CommandProbe, ExtractionRequest, Extractor, Style};

/// Outcome of a committed ingest.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub video_id: i64,
    pub face_ids: Vec<i64>,
    pub output_dir: PathBuf,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Registered {} face(s) as video #{} from {}",
            self.face_ids.len(),
            self.video_id,
            self.output_dir.display()
        )
    }
}

pub struct Ingester<E> {
    extractor: E,
    faces_root: PathBuf,
    extensions: Vec<String>,
}

impl<E: Extractor> Ingester<E> {
    pub fn new(extractor: E, config: &IngestConfig) -> Self {
        Self {
            extractor,
            faces_root: config.faces_root.clone(),
            extensions: config.image_extensions.clone(),
        }
    }

    /// Extract faces from `video_path` and register them.
    ///
    /// `fps` comes from an external probe; 0 means unknown and yields zero
    /// timestamps. On any failure the registry is left untouched.
    pub async fn ingest(
        &self,
        db: &Database,
        video_path: &Path,
        style: Style,
        fps: f64,
    ) -> Result<IngestReport> {
        let video_path = absolute_video_path(video_path)?;
        let output_dir = self.prepare_output_dir(&video_path)?;

        let request = ExtractionRequest {
            video: &video_path,
            style,
            output_dir: &output_dir,
        };
        self.extractor.extract(&request).await?;

        self.ingest_extracted(db, &video_path, &output_dir, fps)
    }

    /// Register crops that an extractor has already written to `output_dir`.
    pub fn ingest_extracted(
        &self,
        db: &Database,
        video_path: &Path,
        output_dir: &Path,
        fps: f64,
    ) -> Result<IngestReport> {
        let video_path = absolute_video_path(video_path)?;
        let output_dir = output_dir
            .canonicalize()
            .map_err(|e| RegistryError::io(output_dir, e))?;
        let fps = naming::normalize_fps(fps);

        let faces = collect_faces(&output_dir, &self.extensions, fps).map_err(|e| {
            warn!("Ingest of {:?} aborted, nothing written: {}", video_path, e);
            e
        })?;
        if faces.is_empty() {
            warn!("Extractor produced no face crops in {:?}", output_dir);
        }

        let filename = video_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let video = NewVideo {
            filename,
            filepath: video_path.to_string_lossy().to_string(),
            upload_date: Utc::now(),
            fps,
        };

        let record = db.record_ingest(&video, &faces)?;
        info!(
            "Ingested {:?}: video #{} with {} faces",
            video_path,
            record.video_id,
            record.face_ids.len()
        );

        Ok(IngestReport {
            video_id: record.video_id,
            face_ids: record.face_ids,
            output_dir,
        })
    }

    /// A fresh directory per ingest so earlier crops are never re-discovered.
    fn prepare_output_dir(&self, video_path: &Path) -> Result<PathBuf> {
        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        let stamp = Utc::now().format("%Y%m%d-%H%M%S%.3f");

        let mut dir = self.faces_root.join(format!("{}-{}", stem, stamp));
        let mut attempt = 1;
        while dir.exists() {
            attempt += 1;
            dir = self.faces_root.join(format!("{}-{}-{}", stem, stamp, attempt));
        }

        std::fs::create_dir_all(&dir).map_err(|e| RegistryError::io(&dir, e))?;
        dir.canonicalize().map_err(|e| RegistryError::io(&dir, e))
    }
}

fn absolute_video_path(video_path: &Path) -> Result<PathBuf> {
    let path = video_path
        .canonicalize()
        .map_err(|e| RegistryError::io(video_path, e))?;
    if !path.is_file() {
        return Err(RegistryError::Input(format!(
            "{} is not a video file",
            path.display()
        )));
    }
    Ok(path)
}

/// Parse and fingerprint every crop below `root`.
///
/// Frame numbers are validated for all crops before any file is hashed; the
/// first malformed name aborts the whole batch.
pub fn collect_faces(root: &Path, extensions: &[String], fps: f64) -> Result<Vec<NewFace>> {
    let crops = discover_crops(root, extensions)?;

    let parsed = crops
        .iter()
        .map(|path| -> Result<(&PathBuf, i64, i64)> {
            let frame_number = naming::parse_frame_number(path)?;
            let cluster_id = naming::parse_cluster_id(root, path);
            Ok((path, frame_number, cluster_id))
        })
        .collect::<Result<Vec<_>>>()?;

    parsed
        .par_iter()
        .map(|(path, frame_number, cluster_id)| -> Result<NewFace> {
            Ok(NewFace {
                frame_number: *frame_number,
                timestamp_seconds: naming::timestamp_seconds(*frame_number, fps),
                image_path: path.to_string_lossy().to_string(),
                cluster_id: *cluster_id,
                content_sha256: Some(fingerprint_file(path)?),
            })
        })
        .collect()
}
