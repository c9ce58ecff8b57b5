//! Content resolver: turns what the presentation layer hands back into a
//! stable face id.
//!
//! Galleries only return disposable copies of images, so identity is
//! recovered from the bytes themselves via the indexed SHA-256 fingerprint
//! stored at ingest. A miss is a normal outcome, not an error.

use std::path::Path;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{RegistryError, Result};
use crate::fingerprint::{fingerprint_bytes, fingerprint_file};

/// A face selection as it arrives from the presentation boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceRef {
    /// Raw image payload of the selected picture.
    Bytes(Vec<u8>),
    /// An id the caller already holds; still checked against the registry.
    Id(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(i64),
    NotFound,
}

impl Resolution {
    pub fn face_id(self) -> Option<i64> {
        match self {
            Resolution::Found(id) => Some(id),
            Resolution::NotFound => None,
        }
    }
}

/// Result of filling in fingerprints for older rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub updated: usize,
    pub missing_files: Vec<String>,
}

pub struct ContentResolver<'a> {
    db: &'a Database,
}

impl<'a> ContentResolver<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Find the face whose stored crop is byte-for-byte identical to `bytes`.
    ///
    /// When several faces share identical crops the lowest id wins.
    pub fn resolve(&self, bytes: &[u8]) -> Result<Resolution> {
        let sha256 = fingerprint_bytes(bytes);
        let ids = self.db.find_faces_by_fingerprint(&sha256)?;

        match ids.first() {
            Some(&id) => {
                if ids.len() > 1 {
                    debug!("{} faces share fingerprint {}, using #{}", ids.len(), sha256, id);
                }
                Ok(Resolution::Found(id))
            }
            None => {
                debug!("No face matches fingerprint {}", sha256);
                Ok(Resolution::NotFound)
            }
        }
    }

    pub fn resolve_file(&self, path: &Path) -> Result<Resolution> {
        let bytes = std::fs::read(path).map_err(|e| RegistryError::io(path, e))?;
        self.resolve(&bytes)
    }

    pub fn resolve_ref(&self, face_ref: &FaceRef) -> Result<Resolution> {
        match face_ref {
            FaceRef::Bytes(bytes) => self.resolve(bytes),
            FaceRef::Id(id) => {
                if self.db.face_exists(*id)? {
                    Ok(Resolution::Found(*id))
                } else {
                    Ok(Resolution::NotFound)
                }
            }
        }
    }

    /// Compute fingerprints for faces registered before they were stored.
    ///
    /// Crops that no longer exist are skipped and listed in the report.
    pub fn backfill_fingerprints(&self) -> Result<BackfillReport> {
        let pending = self.db.get_faces_without_fingerprint()?;
        let mut report = BackfillReport::default();
        let mut fingerprints = Vec::with_capacity(pending.len());

        for (face_id, path) in pending {
            match fingerprint_file(Path::new(&path)) {
                Ok(sha256) => fingerprints.push((face_id, sha256)),
                Err(e) => {
                    warn!("Cannot fingerprint face #{}: {}", face_id, e);
                    report.missing_files.push(path);
                }
            }
        }

        report.updated = self.db.set_fingerprints(&fingerprints)?;
        info!(
            "Backfilled {} fingerprints ({} crops missing)",
            report.updated,
            report.missing_files.len()
        );
        Ok(report)
    }
}
