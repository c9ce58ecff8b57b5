//! Curation engine: rename, merge and clear.
//!
//! Only `person_name` is ever written here. Display names stay derived at
//! read time, and `cluster_id` keeps the extractor's original grouping even
//! after faces from different clusters are merged under one name.

use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{RegistryError, Result};

/// Status of a completed curation call, suitable for showing to a curator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurationOutcome {
    pub affected: usize,
    pub message: String,
}

impl fmt::Display for CurationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub struct Curator<'a> {
    db: &'a Database,
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::Input("name must not be empty".to_string()));
    }
    Ok(trimmed)
}

impl<'a> Curator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Name a single face. Surrounding whitespace is dropped from the name.
    pub fn rename(&self, face_id: i64, new_name: &str) -> Result<CurationOutcome> {
        let name = validate_name(new_name)?;

        let affected = self.db.set_person_name(face_id, name)?;
        debug_assert!(affected <= 1, "rename touched {} rows for face #{}", affected, face_id);
        if affected == 0 {
            return Err(RegistryError::NotFound(format!("face {}", face_id)));
        }

        info!("Renamed face #{} to {:?}", face_id, name);
        Ok(CurationOutcome {
            affected,
            message: format!("Renamed face #{} to '{}'", face_id, name),
        })
    }

    /// Give every listed face the same name in one transaction.
    ///
    /// Duplicate ids count once. If any id is unknown nothing is written.
    /// Repeating a merge with the same arguments leaves the registry as it was.
    pub fn merge(&self, face_ids: &[i64], new_name: &str) -> Result<CurationOutcome> {
        if face_ids.is_empty() {
            return Err(RegistryError::Input("no faces selected to merge".to_string()));
        }
        let name = validate_name(new_name)?;

        let unique: Vec<i64> = face_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let affected = self.db.set_person_name_many(&unique, name)?;

        info!("Merged {} faces as {:?}", affected, name);
        Ok(CurationOutcome {
            affected,
            message: format!("Merged {} face(s) as '{}'", affected, name),
        })
    }

    /// Remove every face and video. Irreversible.
    pub fn clear(&self) -> Result<CurationOutcome> {
        let (faces, videos) = self.db.clear_all()?;

        warn!("Cleared registry: {} faces, {} videos removed", faces, videos);
        Ok(CurationOutcome {
            affected: faces + videos,
            message: format!("Removed {} face(s) and {} video(s)", faces, videos),
        })
    }
}
