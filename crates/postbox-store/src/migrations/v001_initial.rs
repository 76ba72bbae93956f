//! v001 -- Initial schema creation.
//!
//! Creates the three tables: `messages`, `preferences` and `users`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    message_id    TEXT PRIMARY KEY NOT NULL,   -- server-assigned, opaque
    title         TEXT,
    sent_at       TEXT,                        -- RFC-3339, UTC
    expires_at    TEXT,                        -- RFC-3339, UTC
    raw_json      TEXT NOT NULL,               -- full server payload
    unread        INTEGER NOT NULL DEFAULT 1,  -- local read state
    unread_origin INTEGER NOT NULL DEFAULT 1,  -- read state confirmed by server
    deleted       INTEGER NOT NULL DEFAULT 0   -- local tombstone
);

CREATE INDEX IF NOT EXISTS idx_messages_sent ON messages(sent_at DESC);

-- ----------------------------------------------------------------
-- Preferences (engine scalars)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS preferences (
    key   TEXT PRIMARY KEY NOT NULL,
    value                                      -- untyped scalar
);

-- ----------------------------------------------------------------
-- Users (single row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                    INTEGER PRIMARY KEY CHECK (id = 1),
    username              TEXT NOT NULL,
    password              TEXT NOT NULL,
    registered_channel_id TEXT,
    created_at            TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
