//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Accounts and their exclude category
//! - `sessions` - Sign-in sessions
//! - `categories` - Category rules
//! - `expenses` - Expense CRUD and queries
//! - `expense_query` - Dynamic WHERE/ORDER BY builder for filtered reads
//! - `migrations` - Ordered schema steps

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DbConfig;
use crate::error::{Error, OpContext, Result};
use crate::models::{Expense, ExpenseType};

mod categories;
mod expense_query;
mod expenses;
mod migrations;
mod sessions;
mod users;

#[cfg(test)]
mod tests;

pub use expense_query::{ExpenseQuery, FilterResult};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];
const SYNCHRONOUS_MODES: &[&str] = &["OFF", "NORMAL", "FULL", "EXTRA"];

/// Columns read by [`expense_from_row`], in order
pub(crate) const EXPENSE_COLUMNS: &str =
    "id, source, amount, description, expense_type, date, currency, category_id, user_id";

/// Convert a stored Unix-second timestamp
pub(crate) fn timestamp_to_utc(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

pub(crate) fn expense_from_row(row: &rusqlite::Row) -> rusqlite::Result<Expense> {
    let code: i64 = row.get(4)?;
    let expense_type =
        ExpenseType::from_i64(code).ok_or(rusqlite::Error::IntegralValueOutOfRange(4, code))?;

    Ok(Expense {
        id: row.get(0)?,
        source: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        amount: row.get(2)?,
        description: row.get(3)?,
        expense_type,
        date: timestamp_to_utc(5, row.get(5)?)?,
        currency: row.get(6)?,
        category_id: row.get(7)?,
        user_id: row.get(8)?,
    })
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("db_path", &self.db_path)
            .field("pool", &self.pool.state())
            .finish()
    }
}

impl Database {
    /// Open (creating if needed) the database described by `config` and
    /// bring its schema up to date
    ///
    /// Migration failures are fatal and returned as [`Error::Migration`].
    pub fn open(config: &DbConfig) -> Result<Self> {
        let journal_mode = checked_pragma("journal_mode", &config.journal_mode, JOURNAL_MODES)?;
        let synchronous = checked_pragma("synchronous", &config.synchronous, SYNCHRONOUS_MODES)?;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);

        // Per-connection settings; journal_mode is per-file and set once below
        let manager = SqliteConnectionManager::file(&config.source).with_init(move |conn| {
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "synchronous", &synchronous)?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_open_conns.max(1))
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)?;

        let db = Self {
            pool,
            db_path: config.source.clone(),
        };

        let mode: String = db
            .conn()?
            .pragma_update_and_check(None, "journal_mode", &journal_mode, |row| row.get(0))
            .op("journal_mode")?;
        debug!(journal_mode = %mode, "Configured journal mode");

        db.apply_migrations()?;
        info!(path = %db.db_path, "Database ready");
        Ok(db)
    }

    /// Open a database file with default settings
    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(&DbConfig {
            source: path.to_string(),
            ..DbConfig::default()
        })
    }

    /// Create a private throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "expensetrace_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any leftovers from an earlier run
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }

        Self::open_path(&path.to_string_lossy())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Apply every pending migration; returns how many ran
    pub fn apply_migrations(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let applied = migrations::apply_migrations(&mut conn)?;
        if applied == 0 {
            debug!("Database schema is up to date");
        }
        Ok(applied)
    }

    /// Highest applied migration, 0 for an empty database
    pub fn schema_version(&self) -> Result<usize> {
        let conn = self.conn()?;
        migrations::current_version(&conn)
    }

    /// Number of known migrations
    pub fn latest_schema_version() -> usize {
        migrations::MIGRATIONS.len()
    }

    /// Drop every table, leaving an empty database
    ///
    /// The next [`Database::apply_migrations`] recreates the schema.
    pub fn drop_tables(&self) -> Result<()> {
        let mut conn = self.conn()?;
        migrations::drop_tables(&mut conn)?;
        info!(path = %self.db_path, "Dropped all tables");
        Ok(())
    }
}

fn checked_pragma(name: &str, value: &str, allowed: &[&str]) -> Result<String> {
    let upper = value.trim().to_uppercase();
    if allowed.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(Error::Config(format!(
            "invalid {} {:?} (expected one of {})",
            name,
            value,
            allowed.join(", ")
        )))
    }
}
