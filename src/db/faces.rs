//! Face records, curation writes and the joined face/video read model.

use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::videos::Video;
use super::{parse_timestamp, Database};
use crate::error::{RegistryError, Result};

/// Cluster id assigned when the extractor's cluster token is not an integer.
pub const UNCLUSTERED: i64 = -1;

/// A face crop extracted from a video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face {
    pub id: i64,
    pub video_id: i64,
    pub frame_number: i64,
    pub timestamp_seconds: f64,
    pub image_path: String,
    pub person_name: Option<String>,
    pub cluster_id: i64,
    pub content_sha256: Option<String>,
}

impl Face {
    /// Name shown for this face: the curated name, else a cluster placeholder.
    pub fn display_name(&self) -> String {
        display_name_for(self.person_name.as_deref(), self.cluster_id)
    }
}

pub fn display_name_for(person_name: Option<&str>, cluster_id: i64) -> String {
    match person_name {
        Some(name) => name.to_string(),
        None => format!("Cluster {}", cluster_id),
    }
}

/// A face about to be registered.
#[derive(Debug, Clone)]
pub struct NewFace {
    pub frame_number: i64,
    pub timestamp_seconds: f64,
    pub image_path: String,
    pub cluster_id: i64,
    pub content_sha256: Option<String>,
}

/// Face joined with its owning video, as handed to presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceView {
    pub face: Face,
    pub video: Video,
}

impl FaceView {
    pub fn display_name(&self) -> String {
        self.face.display_name()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub videos: i64,
    pub faces: i64,
    pub named_faces: i64,
    pub unclustered_faces: i64,
    /// Distinct display names, named people and unnamed clusters alike.
    pub display_names: i64,
}

const FACE_COLUMNS: &str =
    "id, video_id, frame_number, timestamp_seconds, face_image_path, person_name, cluster_id, content_sha256";

fn row_to_face(row: &rusqlite::Row) -> rusqlite::Result<Face> {
    Ok(Face {
        id: row.get(0)?,
        video_id: row.get(1)?,
        frame_number: row.get(2)?,
        timestamp_seconds: row.get(3)?,
        image_path: row.get(4)?,
        person_name: row.get(5)?,
        cluster_id: row.get(6)?,
        content_sha256: row.get(7)?,
    })
}

fn row_to_face_view(row: &rusqlite::Row) -> rusqlite::Result<FaceView> {
    let face = row_to_face(row)?;
    let uploaded: String = row.get(11)?;
    Ok(FaceView {
        face,
        video: Video {
            id: row.get(8)?,
            filename: row.get(9)?,
            filepath: row.get(10)?,
            upload_date: parse_timestamp(11, &uploaded)?,
            fps: row.get(12)?,
        },
    })
}

impl Database {
    // ========================================================================
    // Face lookups
    // ========================================================================

    pub fn get_face(&self, face_id: i64) -> Result<Option<Face>> {
        let face = self
            .conn
            .query_row(
                &format!("SELECT {} FROM faces WHERE id = ?", FACE_COLUMNS),
                [face_id],
                row_to_face,
            )
            .optional()?;
        Ok(face)
    }

    pub fn face_exists(&self, face_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM faces WHERE id = ?",
            [face_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_faces_for_video(&self, video_id: i64) -> Result<Vec<Face>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM faces WHERE video_id = ? ORDER BY timestamp_seconds, id",
            FACE_COLUMNS
        ))?;
        let faces = stmt
            .query_map([video_id], row_to_face)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(faces)
    }

    /// Ids of faces whose stored crop has the given SHA-256, lowest id first.
    pub fn find_faces_by_fingerprint(&self, sha256: &str) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM faces WHERE content_sha256 = ? ORDER BY id")?;
        let ids = stmt
            .query_map([sha256], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Faces registered before fingerprinting existed.
    pub fn get_faces_without_fingerprint(&self) -> Result<Vec<(i64, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, face_image_path FROM faces WHERE content_sha256 IS NULL ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Store fingerprints for several faces in one transaction.
    pub fn set_fingerprints(&self, fingerprints: &[(i64, String)]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE faces SET content_sha256 = ?1 WHERE id = ?2 AND content_sha256 IS NULL",
            )?;
            for (face_id, sha256) in fingerprints {
                updated += stmt.execute(params![sha256, face_id])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    // ========================================================================
    // Curation writes
    // ========================================================================

    /// Set the curated name on one face. Returns the affected row count.
    pub fn set_person_name(&self, face_id: i64, name: &str) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE faces SET person_name = ?1 WHERE id = ?2",
            params![name, face_id],
        )?;
        Ok(changed)
    }

    /// Set the curated name on every listed face, all or nothing.
    ///
    /// Fails with `NotFound` (and writes nothing) when any id is unknown.
    pub fn set_person_name_many(&self, face_ids: &[i64], name: &str) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut affected = 0;
        {
            let mut stmt = tx.prepare("UPDATE faces SET person_name = ?1 WHERE id = ?2")?;
            for face_id in face_ids {
                let changed = stmt.execute(params![name, face_id])?;
                if changed == 0 {
                    return Err(RegistryError::NotFound(format!("face {}", face_id)));
                }
                affected += changed;
            }
        }
        tx.commit()?;
        Ok(affected)
    }

    /// Delete every face and every video. Returns (faces, videos) removed.
    pub fn clear_all(&self) -> Result<(usize, usize)> {
        let tx = self.conn.unchecked_transaction()?;
        let faces = tx.execute("DELETE FROM faces", [])?;
        let videos = tx.execute("DELETE FROM videos", [])?;
        tx.commit()?;
        Ok((faces, videos))
    }

    // ========================================================================
    // Read model
    // ========================================================================

    /// Faces joined with their video, optionally restricted to one video
    /// filename, in chronological order.
    pub fn get_face_views(&self, video_filename: Option<&str>) -> Result<Vec<FaceView>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT f.id, f.video_id, f.frame_number, f.timestamp_seconds, f.face_image_path,
                   f.person_name, f.cluster_id, f.content_sha256,
                   v.id, v.filename, v.filepath, v.upload_date, v.fps
            FROM faces f
            JOIN videos v ON f.video_id = v.id
            WHERE ?1 IS NULL OR v.filename = ?1
            ORDER BY v.upload_date, f.timestamp_seconds, f.id
            "#,
        )?;
        let views = stmt
            .query_map([video_filename], row_to_face_view)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
    }

    pub fn count_faces(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM faces", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_stats(&self) -> Result<RegistryStats> {
        let stats = self.conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM videos),
                COUNT(*),
                COUNT(person_name),
                COALESCE(SUM(CASE WHEN cluster_id = -1 THEN 1 ELSE 0 END), 0),
                COUNT(DISTINCT COALESCE(person_name, 'Cluster ' || cluster_id))
            FROM faces
            "#,
            [],
            |row| {
                Ok(RegistryStats {
                    videos: row.get(0)?,
                    faces: row.get(1)?,
                    named_faces: row.get(2)?,
                    unclustered_faces: row.get(3)?,
                    display_names: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{at, face, memory_db, video};

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(display_name_for(None, 3), "Cluster 3");
        assert_eq!(display_name_for(None, UNCLUSTERED), "Cluster -1");
        assert_eq!(display_name_for(Some("Alice"), 3), "Alice");
    }

    #[test]
    fn test_set_person_name_many_is_all_or_nothing() {
        let db = memory_db();
        let record = db
            .record_ingest(&video("a.mp4", at(0), 25.0), &[face(1, 25.0, 1, "a")])
            .unwrap();
        let id = record.face_ids[0];

        let err = db.set_person_name_many(&[id, id + 100], "Bob").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
        assert_eq!(db.get_face(id).unwrap().unwrap().person_name, None);
    }

    #[test]
    fn test_fingerprint_lookup_orders_by_id() {
        let db = memory_db();
        let record = db
            .record_ingest(
                &video("a.mp4", at(0), 25.0),
                &[face(1, 25.0, 1, "same"), face(2, 25.0, 1, "other"), face(3, 25.0, 2, "same")],
            )
            .unwrap();
        let sha = format!("{:0>64}", "same");
        let ids = db.find_faces_by_fingerprint(&sha).unwrap();
        assert_eq!(ids, vec![record.face_ids[0], record.face_ids[2]]);
    }

    #[test]
    fn test_face_views_filter_by_video() {
        let db = memory_db();
        db.record_ingest(&video("a.mp4", at(0), 25.0), &[face(1, 25.0, 1, "a")])
            .unwrap();
        db.record_ingest(&video("b.mp4", at(10), 25.0), &[face(1, 25.0, 1, "b")])
            .unwrap();

        assert_eq!(db.get_face_views(None).unwrap().len(), 2);
        let only_b = db.get_face_views(Some("b.mp4")).unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].video.filename, "b.mp4");
        assert!(db.get_face_views(Some("B.MP4")).unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let db = memory_db();
        let record = db
            .record_ingest(
                &video("a.mp4", at(0), 25.0),
                &[
                    face(1, 25.0, 1, "a"),
                    face(2, 25.0, UNCLUSTERED, "b"),
                    face(3, 25.0, UNCLUSTERED, "c"),
                ],
            )
            .unwrap();
        db.set_person_name(record.face_ids[0], "Alice").unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(
            stats,
            RegistryStats {
                videos: 1,
                faces: 3,
                named_faces: 1,
                unclustered_faces: 2,
                display_names: 2,
            }
        );
    }
}
