//! Schema migrations
//!
//! Steps are numbered from 1 by their position in [`MIGRATIONS`]. Each pending
//! step runs in its own transaction and is recorded in `schema_migrations` on
//! success. The list is append-only: released steps never change, a new shape
//! means a new step.
//!
//! Table rebuilds (create `*_new`, copy, drop, rename) run with foreign key
//! enforcement switched off for the connection. Before committing, the runner
//! executes `PRAGMA foreign_key_check` and rejects the step if any row points
//! at a missing parent.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::info;

use crate::error::{Error, OpContext, Result};
use crate::models::{EXCLUDE_CATEGORY_NAME, EXCLUDE_CATEGORY_PATTERN, LEGACY_USERNAME};

/// Password hash of the seeded legacy account ("admin", bcrypt)
const LEGACY_PASSWORD_HASH: &str = "$2a$10$1DMMhCw0qMlNedcIxHpVjeJzGCjIN1JWyR.QLz7YzljbzEj4Jgsem";

pub(crate) struct Migration {
    pub name: &'static str,
    /// Rebuilds tables and needs foreign keys off while it runs
    pub rebuild: bool,
    apply: fn(&Transaction) -> rusqlite::Result<()>,
}

pub(crate) const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "Create expenses table",
        rebuild: false,
        apply: create_expenses,
    },
    Migration {
        name: "Create categories table",
        rebuild: false,
        apply: create_categories,
    },
    Migration {
        name: "Set category_id to NULL",
        rebuild: false,
        apply: null_category_sentinel,
    },
    Migration {
        name: "Set foreign key constraints expenses <-> categories",
        rebuild: true,
        apply: expenses_category_fk,
    },
    Migration {
        name: "Add type column to categories",
        rebuild: false,
        apply: add_category_type,
    },
    Migration {
        name: "Remove type column from categories",
        rebuild: false,
        apply: drop_category_type,
    },
    Migration {
        name: "Add exclude category",
        rebuild: false,
        apply: seed_exclude_category,
    },
    Migration {
        name: "Create users table",
        rebuild: false,
        apply: create_users,
    },
    Migration {
        name: "Create sessions table",
        rebuild: false,
        apply: create_sessions,
    },
    Migration {
        name: "Add user_id to expenses table",
        rebuild: true,
        apply: expenses_user_id,
    },
    Migration {
        name: "Add user_id to categories table",
        rebuild: true,
        apply: categories_user_id,
    },
];

/// Highest applied version, 0 for a fresh database
pub(crate) fn current_version(conn: &Connection) -> Result<usize> {
    ensure_migrations_table(conn)?;
    let version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .op("schema_version")?;
    Ok(version as usize)
}

/// Apply every pending step; returns how many ran
pub(crate) fn apply_migrations(conn: &mut Connection) -> Result<usize> {
    apply_migrations_up_to(conn, MIGRATIONS.len())
}

/// Apply pending steps up to and including `target`
pub(crate) fn apply_migrations_up_to(conn: &mut Connection, target: usize) -> Result<usize> {
    let current = current_version(conn)?;
    let mut applied = 0;

    for (index, migration) in MIGRATIONS.iter().enumerate().take(target) {
        let version = index + 1;
        if version <= current {
            continue;
        }

        info!("Applying migration {}: {}", version, migration.name);

        if migration.rebuild {
            set_foreign_keys(conn, false).map_err(|e| failure(version, migration, e))?;
        }
        let result = run_step(conn, version, migration);
        if migration.rebuild {
            set_foreign_keys(conn, true).map_err(|e| failure(version, migration, e))?;
        }
        result?;

        applied += 1;
    }

    if applied > 0 {
        info!("Database schema at version {}", current.max(target.min(MIGRATIONS.len())));
    }
    Ok(applied)
}

fn run_step(conn: &mut Connection, version: usize, migration: &Migration) -> Result<()> {
    let tx = conn
        .transaction()
        .map_err(|e| failure(version, migration, e))?;

    (migration.apply)(&tx).map_err(|e| failure(version, migration, e))?;

    if migration.rebuild {
        if let Some(violation) = first_fk_violation(&tx).map_err(|e| failure(version, migration, e))? {
            // Dropping `tx` rolls the step back
            return Err(Error::Migration {
                version,
                name: migration.name,
                reason: violation,
            });
        }
    }

    tx.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)",
        params![version as i64, Utc::now().timestamp()],
    )
    .map_err(|e| failure(version, migration, e))?;

    tx.commit().map_err(|e| failure(version, migration, e))
}

fn failure(version: usize, migration: &Migration, err: rusqlite::Error) -> Error {
    Error::Migration {
        version,
        name: migration.name,
        reason: err.to_string(),
    }
}

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )
    .op("create_migrations_table")
}

fn set_foreign_keys(conn: &Connection, on: bool) -> rusqlite::Result<()> {
    conn.execute_batch(if on {
        "PRAGMA foreign_keys = ON;"
    } else {
        "PRAGMA foreign_keys = OFF;"
    })
}

fn first_fk_violation(tx: &Transaction) -> rusqlite::Result<Option<String>> {
    tx.query_row("PRAGMA foreign_key_check", [], |row| {
        let table: String = row.get(0)?;
        let rowid: Option<i64> = row.get(1)?;
        let parent: String = row.get(2)?;
        let fkid: i64 = row.get(3)?;
        Ok(format!(
            "foreign key constraint violation: table={}, rowid={}, parent={}, fkid={}",
            table,
            rowid.map(|r| r.to_string()).unwrap_or_default(),
            parent,
            fkid
        ))
    })
    .optional()
}

/// Drop every data table and the migration record
pub(crate) fn drop_tables(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction().op("drop_tables")?;
    tx.execute_batch(
        "DROP TABLE IF EXISTS expenses;
         DROP TABLE IF EXISTS categories;
         DROP TABLE IF EXISTS sessions;
         DROP TABLE IF EXISTS users;
         DROP TABLE IF EXISTS schema_migrations;",
    )
    .op("drop_tables")?;
    tx.commit().op("drop_tables")
}

// 1
fn create_expenses(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY,
            source TEXT,
            amount INTEGER NOT NULL,
            description TEXT NOT NULL,
            expense_type INTEGER NOT NULL,
            date INTEGER NOT NULL,
            currency TEXT NOT NULL,
            category_id INTEGER,
            UNIQUE(source, date, description, amount) ON CONFLICT FAIL
        ) STRICT;",
    )
}

// 2
fn create_categories(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            pattern TEXT NOT NULL,
            UNIQUE(name) ON CONFLICT FAIL
        ) STRICT;",
    )
}

// 3: 0 used to mean "no category"
fn null_category_sentinel(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE expenses SET category_id = NULL WHERE category_id = 0",
        [],
    )?;
    Ok(())
}

// 4
fn expenses_category_fk(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE expenses_new (
            id INTEGER PRIMARY KEY,
            source TEXT,
            amount INTEGER NOT NULL,
            description TEXT NOT NULL,
            expense_type INTEGER NOT NULL,
            date INTEGER NOT NULL,
            currency TEXT NOT NULL,
            category_id INTEGER,
            UNIQUE(source, date, description, amount) ON CONFLICT FAIL,
            FOREIGN KEY(category_id) REFERENCES categories(id)
        ) STRICT;
        INSERT INTO expenses_new SELECT * FROM expenses;
        DROP TABLE expenses;
        ALTER TABLE expenses_new RENAME TO expenses;",
    )
}

// 5: income categories were those whose expenses summed positive
fn add_category_type(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute(
        "ALTER TABLE categories ADD COLUMN type INTEGER NOT NULL DEFAULT 0",
        [],
    )?;

    let ids = {
        let mut stmt = tx.prepare("SELECT id FROM categories")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };

    for id in ids {
        let total: Option<i64> = tx.query_row(
            "SELECT SUM(amount) FROM expenses WHERE category_id = ?",
            [id],
            |row| row.get(0),
        )?;
        let category_type = if total.unwrap_or(0) > 0 { 1 } else { 0 };
        tx.execute(
            "UPDATE categories SET type = ? WHERE id = ?",
            params![category_type, id],
        )?;
    }
    Ok(())
}

// 6
fn drop_category_type(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute("ALTER TABLE categories DROP COLUMN type", [])?;
    Ok(())
}

// 7
fn seed_exclude_category(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO categories (name, pattern) VALUES (?, ?)",
        params![EXCLUDE_CATEGORY_NAME, EXCLUDE_CATEGORY_PATTERN],
    )?;
    Ok(())
}

// 8: existing rows are adopted by user 1
fn create_users(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(username) ON CONFLICT FAIL
        ) STRICT;",
    )?;
    tx.execute(
        "INSERT INTO users (id, username, password_hash, created_at) VALUES (1, ?, ?, ?)",
        params![LEGACY_USERNAME, LEGACY_PASSWORD_HASH, Utc::now().timestamp()],
    )?;
    Ok(())
}

// 9
fn create_sessions(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        ) STRICT;",
    )
}

// 10
fn expenses_user_id(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE expenses_new (
            id INTEGER PRIMARY KEY,
            source TEXT,
            amount INTEGER NOT NULL,
            description TEXT NOT NULL,
            expense_type INTEGER NOT NULL,
            date INTEGER NOT NULL,
            currency TEXT NOT NULL,
            category_id INTEGER,
            user_id INTEGER NOT NULL DEFAULT 1,
            UNIQUE(source, date, description, amount, user_id) ON CONFLICT FAIL,
            FOREIGN KEY(category_id) REFERENCES categories(id),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        ) STRICT;
        INSERT INTO expenses_new (id, source, amount, description, expense_type, date, currency, category_id, user_id)
            SELECT id, source, amount, description, expense_type, date, currency, category_id, 1 FROM expenses;
        DROP TABLE expenses;
        ALTER TABLE expenses_new RENAME TO expenses;",
    )
}

// 11: expenses is rebuilt too so its foreign key follows the new categories
fn categories_user_id(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE categories_new (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            pattern TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            UNIQUE(name, user_id) ON CONFLICT FAIL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        ) STRICT;
        INSERT INTO categories_new (id, name, pattern, user_id)
            SELECT id, name, pattern, 1 FROM categories;
        CREATE TABLE expenses_temp (
            id INTEGER PRIMARY KEY,
            source TEXT,
            amount INTEGER NOT NULL,
            description TEXT NOT NULL,
            expense_type INTEGER NOT NULL,
            date INTEGER NOT NULL,
            currency TEXT NOT NULL,
            category_id INTEGER,
            user_id INTEGER NOT NULL DEFAULT 1,
            UNIQUE(source, date, description, amount, user_id) ON CONFLICT FAIL,
            FOREIGN KEY(category_id) REFERENCES categories_new(id),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        ) STRICT;
        INSERT INTO expenses_temp SELECT * FROM expenses;
        DROP TABLE expenses;
        DROP TABLE categories;
        ALTER TABLE categories_new RENAME TO categories;
        ALTER TABLE expenses_temp RENAME TO expenses;",
    )
}
