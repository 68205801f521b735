//! User operations

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{timestamp_to_utc, Database};
use crate::error::{Error, OpContext, Result};
use crate::models::{User, EXCLUDE_CATEGORY_NAME, EXCLUDE_CATEGORY_PATTERN};
use crate::storage::UserStore;

const USER_COLUMNS: &str = "id, username, password_hash, created_at";

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: timestamp_to_utc(3, row.get(3)?)?,
    })
}

impl Database {
    fn query_user(
        &self,
        op: &'static str,
        column: &str,
        value: &dyn rusqlite::ToSql,
        subject: impl FnOnce() -> String,
    ) -> Result<User> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column),
            [value],
            user_from_row,
        )
        .optional()
        .op(op)?
        .ok_or_else(|| Error::NotFound(subject()))
    }
}

impl UserStore for Database {
    fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().op("create_user")?;
        let created_at = Utc::now().timestamp();

        match tx.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
            params![username, password_hash, created_at],
        ) {
            Ok(_) => {}
            Err(e) if Error::is_unique_violation(&e) => {
                return Err(Error::Conflict(format!("username {:?} is taken", username)));
            }
            Err(e) => return Err(Error::Storage { op: "create_user", source: e }),
        }
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO categories (name, pattern, user_id) VALUES (?, ?, ?)",
            params![EXCLUDE_CATEGORY_NAME, EXCLUDE_CATEGORY_PATTERN, id],
        )
        .op("create_user")?;

        tx.commit().op("create_user")?;
        info!(user_id = id, username, "Created user");

        Ok(User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: timestamp_to_utc(3, created_at).op("create_user")?,
        })
    }

    fn get_user_by_id(&self, id: i64) -> Result<User> {
        self.query_user("get_user_by_id", "id", &id, || format!("user {}", id))
    }

    fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.query_user("get_user_by_username", "username", &username, || {
            format!("user {:?}", username)
        })
    }

    fn update_username(&self, id: i64, username: &str) -> Result<()> {
        let conn = self.conn()?;
        let rows = match conn.execute(
            "UPDATE users SET username = ? WHERE id = ?",
            params![username, id],
        ) {
            Ok(rows) => rows,
            Err(e) if Error::is_unique_violation(&e) => {
                return Err(Error::Conflict(format!("username {:?} is taken", username)));
            }
            Err(e) => return Err(Error::Storage { op: "update_username", source: e }),
        };
        if rows == 0 {
            return Err(Error::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ? WHERE id = ?",
                params![password_hash, id],
            )
            .op("update_password")?;
        if rows == 0 {
            return Err(Error::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}
