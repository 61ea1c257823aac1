//! SQL schema for the Shidduch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS` / `OR IGNORE`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per profile document. The record itself is kept as JSON so that
-- documents round-trip without loss.
CREATE TABLE IF NOT EXISTS profiles (
    profile_id  TEXT PRIMARY KEY,
    app_id      TEXT NOT NULL,
    doc_json    TEXT NOT NULL,
    created_at  INTEGER,          -- client-stamped ms since epoch, or NULL
    updated_at  INTEGER
);

-- Single-row counter, bumped by every write.
CREATE TABLE IF NOT EXISTS store_version (
    id       INTEGER PRIMARY KEY CHECK (id = 0),
    version  INTEGER NOT NULL
);
INSERT OR IGNORE INTO store_version (id, version) VALUES (0, 0);

CREATE INDEX IF NOT EXISTS profiles_app_idx ON profiles(app_id, created_at);

PRAGMA user_version = 1;
";

/// Increment the store version and return the new value.
pub const BUMP_VERSION: &str =
  "UPDATE store_version SET version = version + 1 WHERE id = 0 RETURNING version";

pub const READ_VERSION: &str = "SELECT version FROM store_version WHERE id = 0";
