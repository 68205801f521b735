//! Session operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{timestamp_to_utc, Database};
use crate::error::{Error, OpContext, Result};
use crate::ids::random_id;
use crate::models::Session;
use crate::storage::SessionStore;

impl SessionStore for Database {
    fn create_session(&self, user_id: i64, expires_at: DateTime<Utc>) -> Result<Session> {
        let conn = self.conn()?;
        let id = random_id();
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
            params![id, user_id, expires_at.timestamp(), created_at.timestamp()],
        )
        .op("create_session")?;

        Ok(Session {
            id,
            user_id,
            // Stored at second precision
            expires_at: timestamp_to_utc(0, expires_at.timestamp()).op("create_session")?,
            created_at: timestamp_to_utc(0, created_at.timestamp()).op("create_session")?,
        })
    }

    fn get_session(&self, id: &str) -> Result<Session> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, user_id, expires_at, created_at FROM sessions
             WHERE id = ? AND expires_at > ?",
            params![id, Utc::now().timestamp()],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: timestamp_to_utc(2, row.get(2)?)?,
                    created_at: timestamp_to_utc(3, row.get(3)?)?,
                })
            },
        )
        .optional()
        .op("get_session")?
        .ok_or_else(|| Error::NotFound(format!("session {}", id)))
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sessions WHERE id = ?", [id])
            .op("delete_session")?;
        Ok(())
    }

    fn delete_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at <= ?",
                [Utc::now().timestamp()],
            )
            .op("delete_expired_sessions")?;
        if removed > 0 {
            debug!(removed, "Deleted expired sessions");
        }
        Ok(removed)
    }
}
