pub const SCHEMA: &str = r#"
-- Videos: one row per ingest call, never mutated
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    filepath TEXT NOT NULL,          -- Absolute path of the source video
    upload_date TEXT NOT NULL,       -- RFC 3339 UTC, fixed width so it sorts lexically
    fps REAL NOT NULL DEFAULT 0      -- 0 when the frame rate is unknown
);

CREATE INDEX IF NOT EXISTS idx_videos_filename ON videos(filename);

-- Faces: crops deposited by the extractor, created in bulk with their video
CREATE TABLE IF NOT EXISTS faces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id INTEGER NOT NULL,
    frame_number INTEGER NOT NULL CHECK (frame_number >= 0),
    timestamp_seconds REAL NOT NULL,
    face_image_path TEXT NOT NULL,   -- Absolute path of the stored crop
    person_name TEXT,                -- NULL until a curator names the face
    cluster_id INTEGER NOT NULL DEFAULT -1,
    content_sha256 TEXT,             -- Hex SHA-256 of the crop bytes
    FOREIGN KEY (video_id) REFERENCES videos(id)
);

CREATE INDEX IF NOT EXISTS idx_faces_video ON faces(video_id);
CREATE INDEX IF NOT EXISTS idx_faces_person ON faces(person_name);
"#;

/// Additive migrations for registries created by earlier versions.
/// Each statement may fail harmlessly when already applied.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE faces ADD COLUMN content_sha256 TEXT",
];

/// Indexes over migrated columns, created after MIGRATIONS have run.
pub const POST_MIGRATION_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_faces_sha256 ON faces(content_sha256);
"#;
