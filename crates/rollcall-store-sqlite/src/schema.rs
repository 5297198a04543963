//! SQL schema for the rollcall SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS villages (
    village_id  INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    district    TEXT,
    state       TEXT
);

CREATE TABLE IF NOT EXISTS student_groups (
    group_id    INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT
);

-- deleted_at is set while a profile deletion is in flight; such rows are
-- invisible to reads until reaped.
CREATE TABLE IF NOT EXISTS students (
    pid                  TEXT PRIMARY KEY,
    first_name           TEXT NOT NULL,
    middle_name          TEXT,
    last_name            TEXT,
    birth_year           INTEGER,
    gender               TEXT NOT NULL DEFAULT 'unspecified',
    profile_pic_url      TEXT,
    school_class         TEXT,
    village_id           INTEGER NOT NULL REFERENCES villages(village_id),
    group_id             INTEGER NOT NULL REFERENCES student_groups(group_id),
    primary_contact_no   TEXT,
    secondary_contact_no TEXT,
    father_name          TEXT,
    mother_name          TEXT,
    is_active            INTEGER NOT NULL DEFAULT 1,
    deleted_at           TEXT
);

CREATE TABLE IF NOT EXISTS volunteers (
    pid         TEXT PRIMARY KEY,
    first_name  TEXT NOT NULL,
    last_name   TEXT,
    email       TEXT,
    mobile_no   TEXT,
    role        TEXT,
    village_id  INTEGER,
    is_active   INTEGER NOT NULL DEFAULT 1
);

-- Vectors are little-endian f32 blobs.
CREATE TABLE IF NOT EXISTS embeddings (
    embedding_id INTEGER PRIMARY KEY AUTOINCREMENT,
    pid          TEXT NOT NULL,
    vector       BLOB NOT NULL,
    model        TEXT,
    created_at   TEXT NOT NULL
);

-- Append-only. Not tied to students: history survives profile deletion.
CREATE TABLE IF NOT EXISTS attendance (
    attendance_id INTEGER PRIMARY KEY AUTOINCREMENT,
    pid           TEXT NOT NULL,
    group_id      INTEGER,
    method        TEXT NOT NULL,
    marked_at     TEXT NOT NULL
);

-- Presence index for artifact files held by the artifact store.
CREATE TABLE IF NOT EXISTS face_artifacts (
    pid          TEXT NOT NULL,
    kind         TEXT NOT NULL,   -- 'raw_frame' | 'face_crop' | 'normalized_face'
    content_hash TEXT NOT NULL,
    byte_len     INTEGER NOT NULL,
    stored_at    TEXT NOT NULL,
    PRIMARY KEY (pid, kind)
);

CREATE TABLE IF NOT EXISTS student_tombstones (
    pid          TEXT PRIMARY KEY,
    requested_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    body        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    channel_id  TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    is_read     INTEGER NOT NULL DEFAULT 0,
    dedup_key   TEXT UNIQUE
);

CREATE INDEX IF NOT EXISTS students_village_idx      ON students(village_id);
CREATE INDEX IF NOT EXISTS students_group_idx        ON students(group_id);
CREATE INDEX IF NOT EXISTS embeddings_pid_idx        ON embeddings(pid);
CREATE INDEX IF NOT EXISTS attendance_pid_idx        ON attendance(pid);
CREATE INDEX IF NOT EXISTS notifications_recent_idx  ON notifications(timestamp DESC, id DESC);
CREATE INDEX IF NOT EXISTS notifications_unread_idx  ON notifications(is_read);

PRAGMA user_version = 1;
";
