use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::db::FaceView;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Csv => "CSV",
        }
    }

    /// Guess from the output file's extension, falling back to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => anyhow::bail!("Unknown export format: {}", other),
        }
    }
}

/// One face row as written to an export file
#[derive(Debug, Serialize)]
pub struct ExportedFace {
    pub face_id: i64,
    pub display_name: String,
    pub person_name: Option<String>,
    pub cluster_id: i64,
    pub video: String,
    pub video_path: String,
    pub upload_date: String,
    pub frame_number: i64,
    pub timestamp_seconds: f64,
    pub image_path: String,
    pub sha256: Option<String>,
}

impl From<&FaceView> for ExportedFace {
    fn from(view: &FaceView) -> Self {
        Self {
            face_id: view.face.id,
            display_name: view.display_name(),
            person_name: view.face.person_name.clone(),
            cluster_id: view.face.cluster_id,
            video: view.video.filename.clone(),
            video_path: view.video.filepath.clone(),
            upload_date: view.video.upload_date.to_rfc3339(),
            frame_number: view.face.frame_number,
            timestamp_seconds: view.face.timestamp_seconds,
            image_path: view.face.image_path.clone(),
            sha256: view.face.content_sha256.clone(),
        }
    }
}

/// Export query results to a file, keeping their order
pub fn export_faces(views: &[FaceView], output_path: &Path, format: ExportFormat) -> Result<usize> {
    let faces: Vec<ExportedFace> = views.iter().map(ExportedFace::from).collect();

    match format {
        ExportFormat::Json => export_json(&faces, output_path),
        ExportFormat::Csv => export_csv(&faces, output_path),
    }
    .with_context(|| format!("Failed to write {} export to {:?}", format.name(), output_path))?;

    tracing::info!("Exported {} faces to {:?}", faces.len(), output_path);
    Ok(faces.len())
}

fn export_json(faces: &[ExportedFace], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(faces)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(faces: &[ExportedFace], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    // Header row comes from the struct field names
    for face in faces {
        wtr.serialize(face)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{at, face, memory_db, video};
    use crate::query::{query, FaceFilter};
    use tempfile::tempdir;

    fn views() -> Vec<FaceView> {
        let db = memory_db();
        let record = db
            .record_ingest(
                &video("a.mp4", at(0), 25.0),
                &[face(50, 25.0, 1, "a"), face(25, 25.0, 2, "b")],
            )
            .unwrap();
        db.set_person_name(record.face_ids[0], "Alice, Jr.").unwrap();
        query(&db, &FaceFilter::default()).unwrap()
    }

    #[test]
    fn test_export_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("faces.json");

        let count = export_faces(&views(), &path, ExportFormat::Json).unwrap();
        assert_eq!(count, 2);

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows[0]["display_name"], "Cluster 2");
        assert_eq!(rows[0]["timestamp_seconds"], 1.0);
        assert_eq!(rows[1]["display_name"], "Alice, Jr.");
    }

    #[test]
    fn test_export_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("faces.csv");

        export_faces(&views(), &path, ExportFormat::Csv).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[0], "face_id");
        assert_eq!(&headers[1], "display_name");

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][1], "Alice, Jr.");
        assert_eq!(&rows[0][2], "");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("html".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::from_path(Path::new("out.CSV")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Json);
    }
}
