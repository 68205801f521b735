//! Category operations

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::Database;
use crate::error::{Error, OpContext, Result};
use crate::models::{Category, EXCLUDE_CATEGORY_NAME};
use crate::storage::CategoryStore;

const CATEGORY_COLUMNS: &str = "id, user_id, name, pattern";

fn category_from_row(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        pattern: row.get(3)?,
    })
}

/// Reject empty names and patterns that do not compile
fn validate_category(name: &str, pattern: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("category name is required".to_string()));
    }
    if pattern.is_empty() {
        return Err(Error::Validation("category pattern is required".to_string()));
    }
    regex::Regex::new(pattern)
        .map_err(|e| Error::Validation(format!("invalid pattern {:?}: {}", pattern, e)))?;
    Ok(())
}

fn write_error(op: &'static str, name: &str, err: rusqlite::Error) -> Error {
    if Error::is_unique_violation(&err) {
        Error::Conflict(format!("category {:?} already exists", name))
    } else {
        Error::Storage { op, source: err }
    }
}

impl CategoryStore for Database {
    fn create_category(&self, user_id: i64, name: &str, pattern: &str) -> Result<i64> {
        validate_category(name, pattern)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (name, pattern, user_id) VALUES (?, ?, ?)",
            params![name, pattern, user_id],
        )
        .map_err(|e| write_error("create_category", name, e))?;

        let id = conn.last_insert_rowid();
        info!(user_id, category_id = id, name, "Created category");
        Ok(id)
    }

    fn get_categories(&self, user_id: i64) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM categories WHERE user_id = ? ORDER BY id",
                CATEGORY_COLUMNS
            ))
            .op("get_categories")?;

        let categories = stmt
            .query_map([user_id], category_from_row)
            .op("get_categories")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .op("get_categories")?;

        Ok(categories)
    }

    fn get_category(&self, user_id: i64, id: i64) -> Result<Category> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM categories WHERE id = ? AND user_id = ?",
                CATEGORY_COLUMNS
            ),
            params![id, user_id],
            category_from_row,
        )
        .optional()
        .op("get_category")?
        .ok_or_else(|| Error::NotFound(format!("category {}", id)))
    }

    fn update_category(&self, user_id: i64, id: i64, name: &str, pattern: &str) -> Result<()> {
        validate_category(name, pattern)?;
        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE categories SET name = ?, pattern = ? WHERE id = ? AND user_id = ?",
                params![name, pattern, id, user_id],
            )
            .map_err(|e| write_error("update_category", name, e))?;

        if rows == 0 {
            return Err(Error::NotFound(format!("category {}", id)));
        }
        Ok(())
    }

    fn delete_category(&self, user_id: i64, id: i64) -> Result<()> {
        let category = self.get_category(user_id, id)?;
        if category.is_exclude() {
            return Err(Error::Validation(format!(
                "the {} category cannot be deleted",
                EXCLUDE_CATEGORY_NAME
            )));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction().op("delete_category")?;

        let uncategorized = tx
            .execute(
                "UPDATE expenses SET category_id = NULL WHERE category_id = ? AND user_id = ?",
                params![id, user_id],
            )
            .op("delete_category")?;

        let rows = tx
            .execute(
                "DELETE FROM categories WHERE id = ? AND user_id = ?",
                params![id, user_id],
            )
            .op("delete_category")?;
        if rows == 0 {
            return Err(Error::NotFound(format!("category {}", id)));
        }

        tx.commit().op("delete_category")?;
        info!(user_id, category_id = id, uncategorized, "Deleted category");
        Ok(())
    }

    fn delete_categories(&self, user_id: i64) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().op("delete_categories")?;

        tx.execute(
            "UPDATE expenses SET category_id = NULL
             WHERE user_id = ? AND category_id IS NOT NULL
               AND category_id NOT IN (SELECT id FROM categories WHERE user_id = ? AND name = ?)",
            params![user_id, user_id, EXCLUDE_CATEGORY_NAME],
        )
        .op("delete_categories")?;

        let removed = tx
            .execute(
                "DELETE FROM categories WHERE user_id = ? AND name != ?",
                params![user_id, EXCLUDE_CATEGORY_NAME],
            )
            .op("delete_categories")?;

        tx.commit().op("delete_categories")?;
        info!(user_id, removed, "Deleted categories");
        Ok(removed)
    }

    fn get_exclude_category(&self, user_id: i64) -> Result<Category> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM categories WHERE user_id = ? AND name = ?",
                CATEGORY_COLUMNS
            ),
            params![user_id, EXCLUDE_CATEGORY_NAME],
            category_from_row,
        )
        .optional()
        .op("get_exclude_category")?
        .ok_or_else(|| Error::NotFound(format!("exclude category for user {}", user_id)))
    }
}
