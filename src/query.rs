//! Read-only filtering and grouping of faces for presentation.
//!
//! Output order never depends on insertion order or hash iteration: records
//! are ordered by (upload date, timestamp, face id) and groups by key.

use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

use crate::db::{Database, FaceView};
use crate::error::{RegistryError, Result};

/// Query filters; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FaceFilter {
    /// Exact video filename.
    pub video: Option<String>,
    /// Case-insensitive substring of the display name.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupAxis {
    Person,
    Video,
    Chronological,
}

impl FromStr for GroupAxis {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "person" => Ok(GroupAxis::Person),
            "video" => Ok(GroupAxis::Video),
            "chronological" | "time" => Ok(GroupAxis::Chronological),
            other => Err(RegistryError::Input(format!(
                "unknown grouping {:?} (expected person, video or chronological)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceGroup {
    pub key: String,
    pub faces: Vec<FaceView>,
}

/// Faces matching `filter`, joined with their videos, in chronological order.
pub fn query(db: &Database, filter: &FaceFilter) -> Result<Vec<FaceView>> {
    let mut views = db.get_face_views(filter.video.as_deref())?;

    if let Some(needle) = filter.name.as_deref().map(str::to_lowercase) {
        views.retain(|v| v.display_name().to_lowercase().contains(&needle));
    }

    Ok(views)
}

/// Total chronological order: upload date, then timestamp, then face id.
pub fn chronological_cmp(a: &FaceView, b: &FaceView) -> Ordering {
    a.video
        .upload_date
        .cmp(&b.video.upload_date)
        .then_with(|| a.face.timestamp_seconds.total_cmp(&b.face.timestamp_seconds))
        .then_with(|| a.face.id.cmp(&b.face.id))
}

/// Partition `records` along `axis`.
///
/// Person and video groups are keyed by display name and video filename and
/// come back in lexical key order, each holding its faces chronologically.
/// The chronological axis yields consecutive runs of the same video in upload
/// order; flattening the groups gives the total chronological order.
pub fn group(records: &[FaceView], axis: GroupAxis) -> Vec<FaceGroup> {
    let mut sorted = records.to_vec();
    sorted.sort_by(chronological_cmp);

    match axis {
        GroupAxis::Person => partition_by(sorted, |v| v.display_name()),
        GroupAxis::Video => partition_by(sorted, |v| v.video.filename.clone()),
        GroupAxis::Chronological => {
            let mut groups: Vec<FaceGroup> = Vec::new();
            let mut current_video = None;
            for view in sorted {
                match groups.last_mut() {
                    Some(last) if current_video == Some(view.video.id) => last.faces.push(view),
                    _ => {
                        current_video = Some(view.video.id);
                        groups.push(FaceGroup {
                            key: format!(
                                "{} ({})",
                                view.video.filename,
                                view.video.upload_date.format("%Y-%m-%d %H:%M:%S")
                            ),
                            faces: vec![view],
                        });
                    }
                }
            }
            groups
        }
    }
}

fn partition_by(sorted: Vec<FaceView>, key: impl Fn(&FaceView) -> String) -> Vec<FaceGroup> {
    let mut buckets: BTreeMap<String, Vec<FaceView>> = BTreeMap::new();
    for view in sorted {
        buckets.entry(key(&view)).or_default().push(view);
    }
    buckets
        .into_iter()
        .map(|(key, faces)| FaceGroup { key, faces })
        .collect()
}

/// Crop bytes for display, or a marker when the file has gone missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Available(Vec<u8>),
    Missing,
}

impl FaceView {
    /// Read the crop for display. A missing or unreadable file is reported
    /// as `Preview::Missing` rather than failing the surrounding listing.
    pub fn load_preview(&self) -> Preview {
        match std::fs::read(&self.face.image_path) {
            Ok(bytes) => Preview::Available(bytes),
            Err(e) => {
                warn!("No preview for face #{} ({}): {}", self.face.id, self.face.image_path, e);
                Preview::Missing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{at, face, memory_db, video};
    use crate::db::{Face, Video};
    use chrono::{DateTime, Utc};
    use tempfile::tempdir;

    fn view(id: i64, video_id: i64, uploaded: DateTime<Utc>, ts: f64, name: Option<&str>) -> FaceView {
        FaceView {
            face: Face {
                id,
                video_id,
                frame_number: (ts * 10.0) as i64,
                timestamp_seconds: ts,
                image_path: format!("/faces/{}.jpg", id),
                person_name: name.map(str::to_string),
                cluster_id: id % 3,
                content_sha256: None,
            },
            video: Video {
                id: video_id,
                filename: format!("video{}.mp4", video_id),
                filepath: format!("/videos/video{}.mp4", video_id),
                upload_date: uploaded,
                fps: 10.0,
            },
        }
    }

    fn order(groups: &[FaceGroup]) -> Vec<(DateTime<Utc>, f64)> {
        groups
            .iter()
            .flat_map(|g| g.faces.iter())
            .map(|v| (v.video.upload_date, v.face.timestamp_seconds))
            .collect()
    }

    #[test]
    fn test_chronological_order() {
        let t1 = at(0);
        let t2 = at(60);
        let records = vec![view(1, 1, t1, 5.0, None), view(2, 1, t1, 2.0, None), view(3, 2, t2, 1.0, None)];

        let groups = group(&records, GroupAxis::Chronological);
        assert_eq!(order(&groups), vec![(t1, 2.0), (t1, 5.0), (t2, 1.0)]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_chronological_tie_break_on_id() {
        let t = at(0);
        let records = vec![view(9, 1, t, 1.0, None), view(4, 1, t, 1.0, None), view(6, 1, t, 1.0, None)];

        let groups = group(&records, GroupAxis::Chronological);
        let ids: Vec<i64> = groups[0].faces.iter().map(|v| v.face.id).collect();
        assert_eq!(ids, vec![4, 6, 9]);
    }

    #[test]
    fn test_person_groups_in_lexical_order() {
        let t = at(0);
        let records = vec![
            view(1, 1, t, 3.0, Some("Zoe")),
            view(2, 1, t, 2.0, Some("Adam")),
            view(3, 1, t, 1.0, None),
            view(4, 1, t, 0.5, Some("Zoe")),
        ];

        let groups = group(&records, GroupAxis::Person);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Adam", "Cluster 0", "Zoe"]);
        let zoe: Vec<i64> = groups[2].faces.iter().map(|v| v.face.id).collect();
        assert_eq!(zoe, vec![4, 1]);

        // Same input in a different order gives the same grouping
        let mut shuffled = records.clone();
        shuffled.reverse();
        assert_eq!(group(&shuffled, GroupAxis::Person), groups);
    }

    #[test]
    fn test_video_groups() {
        let records = vec![view(1, 2, at(60), 1.0, None), view(2, 1, at(0), 1.0, None)];
        let groups = group(&records, GroupAxis::Video);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["video1.mp4", "video2.mp4"]);
    }

    #[test]
    fn test_query_filters() {
        let db = memory_db();
        let a = db
            .record_ingest(
                &video("a.mp4", at(0), 25.0),
                &[face(10, 25.0, 1, "a"), face(20, 25.0, 12, "b")],
            )
            .unwrap();
        db.record_ingest(&video("b.mp4", at(10), 25.0), &[face(5, 25.0, 1, "c")])
            .unwrap();
        db.set_person_name(a.face_ids[0], "Alice Smith").unwrap();

        assert_eq!(query(&db, &FaceFilter::default()).unwrap().len(), 3);

        let by_name = FaceFilter {
            name: Some("aLiCe".to_string()),
            ..FaceFilter::default()
        };
        let found = query(&db, &by_name).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].face.id, a.face_ids[0]);

        let by_cluster = FaceFilter {
            name: Some("cluster 1".to_string()),
            ..FaceFilter::default()
        };
        // "Cluster 1" and "Cluster 12" both contain the substring
        assert_eq!(query(&db, &by_cluster).unwrap().len(), 2);

        let combined = FaceFilter {
            video: Some("b.mp4".to_string()),
            name: Some("cluster".to_string()),
        };
        let found = query(&db, &combined).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].video.filename, "b.mp4");
    }

    #[test]
    fn test_missing_preview_does_not_fail() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("1.jpg");
        std::fs::write(&present, b"crop").unwrap();

        let mut available = view(1, 1, at(0), 0.0, None);
        available.face.image_path = present.to_string_lossy().to_string();
        let missing = view(2, 1, at(0), 0.0, None);

        assert_eq!(available.load_preview(), Preview::Available(b"crop".to_vec()));
        assert_eq!(missing.load_preview(), Preview::Missing);
    }

    #[test]
    fn test_group_axis_parsing() {
        assert_eq!("Person".parse::<GroupAxis>().unwrap(), GroupAxis::Person);
        assert_eq!("chronological".parse::<GroupAxis>().unwrap(), GroupAxis::Chronological);
        assert!("size".parse::<GroupAxis>().is_err());
    }
}
