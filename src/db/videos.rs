//! Video records and the atomic ingest commit.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::faces::NewFace;
use super::{format_timestamp, parse_timestamp, Database};
use crate::error::Result;

/// A registered source video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Video {
    pub id: i64,
    pub filename: String,
    pub filepath: String,
    pub upload_date: DateTime<Utc>,
    /// Frames per second, 0 when unknown.
    pub fps: f64,
}

/// A video about to be registered.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub filename: String,
    pub filepath: String,
    pub upload_date: DateTime<Utc>,
    pub fps: f64,
}

/// Ids assigned by a committed ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRecord {
    pub video_id: i64,
    pub face_ids: Vec<i64>,
}

fn row_to_video(row: &rusqlite::Row) -> rusqlite::Result<Video> {
    let uploaded: String = row.get(3)?;
    Ok(Video {
        id: row.get(0)?,
        filename: row.get(1)?,
        filepath: row.get(2)?,
        upload_date: parse_timestamp(3, &uploaded)?,
        fps: row.get(4)?,
    })
}

impl Database {
    /// Insert one video and all of its faces in a single transaction.
    ///
    /// Either every row is written or none is: the transaction rolls back
    /// when dropped on any error path.
    pub fn record_ingest(&self, video: &NewVideo, faces: &[NewFace]) -> Result<IngestRecord> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO videos (filename, filepath, upload_date, fps) VALUES (?1, ?2, ?3, ?4)",
            params![
                video.filename,
                video.filepath,
                format_timestamp(&video.upload_date),
                video.fps,
            ],
        )?;
        let video_id = tx.last_insert_rowid();

        let mut face_ids = Vec::with_capacity(faces.len());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO faces (video_id, frame_number, timestamp_seconds, face_image_path, cluster_id, content_sha256)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for face in faces {
                stmt.execute(params![
                    video_id,
                    face.frame_number,
                    face.timestamp_seconds,
                    face.image_path,
                    face.cluster_id,
                    face.content_sha256,
                ])?;
                face_ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit()?;
        Ok(IngestRecord { video_id, face_ids })
    }

    pub fn get_video(&self, video_id: i64) -> Result<Option<Video>> {
        let video = self
            .conn
            .query_row(
                "SELECT id, filename, filepath, upload_date, fps FROM videos WHERE id = ?",
                [video_id],
                row_to_video,
            )
            .optional()?;
        Ok(video)
    }

    /// All videos in upload order.
    pub fn get_all_videos(&self) -> Result<Vec<Video>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, filepath, upload_date, fps FROM videos ORDER BY upload_date, id",
        )?;
        let videos = stmt
            .query_map([], row_to_video)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(videos)
    }

    pub fn count_videos(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{at, face, memory_db, video};

    #[test]
    fn test_record_ingest_links_faces_to_new_video() {
        let db = memory_db();
        let record = db
            .record_ingest(
                &video("a.mp4", at(0), 25.0),
                &[face(10, 25.0, 1, "a"), face(50, 25.0, -1, "b")],
            )
            .unwrap();

        assert_eq!(record.face_ids.len(), 2);
        let faces = db.get_faces_for_video(record.video_id).unwrap();
        assert_eq!(faces.len(), 2);
        assert!(faces.iter().all(|f| f.video_id == record.video_id));

        let stored = db.get_video(record.video_id).unwrap().unwrap();
        assert_eq!(stored.filename, "a.mp4");
        assert_eq!(stored.upload_date, at(0));
    }

    #[test]
    fn test_record_ingest_rolls_back_on_failure() {
        let db = memory_db();
        // Negative frame numbers violate the CHECK constraint on the second row
        let mut bad = face(-1, 25.0, 1, "bad");
        bad.timestamp_seconds = 0.0;
        let result = db.record_ingest(&video("a.mp4", at(0), 25.0), &[face(1, 25.0, 1, "ok"), bad]);

        assert!(result.is_err());
        assert_eq!(db.count_videos().unwrap(), 0);
        assert_eq!(db.count_faces().unwrap(), 0);
    }

    #[test]
    fn test_video_without_faces() {
        let db = memory_db();
        let record = db.record_ingest(&video("empty.mp4", at(0), 0.0), &[]).unwrap();
        assert!(record.face_ids.is_empty());
        assert_eq!(db.get_all_videos().unwrap().len(), 1);
    }
}
