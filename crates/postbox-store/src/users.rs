//! Persistence of the anonymous inbox user.
//!
//! The `users` table holds at most one row; its presence is what makes the
//! user "created".  Nothing in this crate deletes it.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use postbox_shared::types::Credentials;

use crate::database::Database;
use crate::error::Result;
use crate::messages::format_ts;
use crate::models::UserRecord;

impl Database {
    pub fn load_user(&self) -> Result<Option<UserRecord>> {
        let row = self
            .conn()
            .query_row(
                "SELECT username, password, registered_channel_id, created_at
                 FROM users WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((username, password, registered_channel_id, created_str)) = row else {
            return Ok(None);
        };

        let created_at: DateTime<Utc> =
            DateTime::parse_from_rfc3339(&created_str)?.with_timezone(&Utc);

        Ok(Some(UserRecord {
            credentials: Credentials { username, password },
            registered_channel_id,
            created_at,
        }))
    }

    /// Store freshly issued credentials, replacing any previous row.
    pub fn save_user(&self, user: &UserRecord) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO users
             (id, username, password, registered_channel_id, created_at)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                user.credentials.username,
                user.credentials.password,
                user.registered_channel_id,
                format_ts(user.created_at),
            ],
        )?;
        Ok(())
    }

    /// Remember which channel the server last accepted for the user.
    pub fn set_user_channel(&self, channel_id: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE users SET registered_channel_id = ?1 WHERE id = 1",
            params![channel_id],
        )?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> UserRecord {
        UserRecord {
            credentials: Credentials {
                username: "user-1".into(),
                password: "secret".into(),
            },
            registered_channel_id: Some("channel-1".into()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn no_user_by_default() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_user().unwrap().is_none());
        assert!(!db.set_user_channel("c").unwrap());
    }

    #[test]
    fn save_and_load_user() {
        let db = Database::open_in_memory().unwrap();
        db.save_user(&record()).unwrap();
        assert_eq!(db.load_user().unwrap(), Some(record()));

        assert!(db.set_user_channel("channel-2").unwrap());
        let loaded = db.load_user().unwrap().unwrap();
        assert_eq!(loaded.registered_channel_id.as_deref(), Some("channel-2"));
    }
}
