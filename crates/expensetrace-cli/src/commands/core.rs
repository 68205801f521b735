//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `resolve_user` - Look up the user named by `--user`
//! - `cmd_init` - Create or upgrade the schema
//! - `cmd_delete` - Drop every table

use std::io::{self, Write};

use anyhow::{Context, Result};
use expensetrace_core::{Config, Database, User, UserStore};

/// Open the configured database; migrations run on open
pub fn open_db(config: &Config) -> Result<Database> {
    Database::open(&config.db)
        .with_context(|| format!("Failed to open database at {}", config.db.source))
}

pub fn resolve_user(db: &Database, username: &str) -> Result<User> {
    db.get_user_by_username(username)
        .with_context(|| format!("Unknown user '{}'", username))
}

pub fn cmd_init(db: &Database) -> Result<()> {
    println!("🔧 Initializing database at {}...", db.path());

    // Opening already migrated; this only reports the outcome
    let applied = db.apply_migrations().context("Failed to apply migrations")?;
    let version = db.schema_version()?;

    if applied > 0 {
        println!("   Applied {} migrations", applied);
    }
    println!("   Schema version: {}", version);
    println!("✅ Database ready!");
    println!();
    println!("Next steps:");
    println!("  1. Add categories: expensetrace category add Food 'restaurant|grocer'");
    println!("  2. Import a statement: expensetrace import statement.csv");
    println!("  3. See where it went: expensetrace report --month 1");

    Ok(())
}

pub fn cmd_delete(db: &Database, yes: bool) -> Result<()> {
    if !yes && !confirm("⚠️  This will DROP every table, including users and categories.")? {
        println!("Cancelled.");
        return Ok(());
    }

    db.drop_tables().context("Failed to drop tables")?;
    println!("✅ All tables dropped. Run 'expensetrace init' to recreate the schema.");

    Ok(())
}

/// Ask a yes/no question on stdin; anything but "y" is a no
pub fn confirm(warning: &str) -> Result<bool> {
    println!("{}", warning);
    print!("Are you sure? [y/N] ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
