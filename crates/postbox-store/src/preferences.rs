//! Scalar key/value entries owned by the sync engine.

use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Read an integer preference, `default` when absent.
    pub fn get_i64(&self, key: &str, default: i64) -> Result<i64> {
        let value: Option<i64> = self
            .conn()
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(default))
    }

    pub fn put_i64(&self, key: &str, value: i64) -> Result<()> {
        self.conn().execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_preference(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }
}
