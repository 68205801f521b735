//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ExpenseTrace - Track where your money goes
#[derive(Parser)]
#[command(name = "expensetrace")]
#[command(about = "Personal expense tracker: import statements, categorize, report", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (YAML); a missing file means defaults
    #[arg(long, env = "EXPENSETRACE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database path, overrides the configured source
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// User whose data the command works on
    #[arg(short, long, default_value = "admin", global = true)]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or upgrade the database schema
    Init,

    /// Import expenses from a CSV or JSON statement
    Import {
        /// Statement file (.csv or .json)
        file: PathBuf,

        /// Source name for rows that don't carry one (defaults to the file name)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Show a monthly or yearly report
    Report {
        /// Month (1-12); without it the whole year is reported
        #[arg(short, long)]
        month: Option<u32>,

        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// List the expenses of every category
        #[arg(short, long)]
        verbose: bool,
    },

    /// Manage categorization rules
    Category {
        #[command(subcommand)]
        action: Option<CategoryAction>,
    },

    /// Search expenses
    Search {
        /// Filter as key=value (description, source, amount_min, amount_max,
        /// date_from, date_to, sort)
        #[arg(short, long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        /// Substring of the description
        #[arg(short, long)]
        keyword: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export expenses to CSV
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Filter as key=value, same keys as `search`
        #[arg(short, long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,
    },

    /// Drop every table in the database
    Delete {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum CategoryAction {
    /// List categories
    List,

    /// Add a category and apply it to uncategorized expenses
    Add {
        /// Category name
        name: String,

        /// Regex matched against lowercased descriptions
        pattern: String,
    },

    /// Change a category's name or pattern
    Update {
        /// Category ID
        id: i64,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New pattern
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Add one literal description to a category's pattern
    Extend {
        /// Category ID
        id: i64,

        /// Description to match from now on
        description: String,
    },

    /// Delete a category; its expenses become uncategorized
    Delete {
        /// Category ID
        id: i64,
    },

    /// Delete every category except the exclude one
    Reset {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Match uncategorized expenses against the current rules
    Recategorize,

    /// Show uncategorized expenses grouped by description
    Inspect {
        /// Write the groups as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Parse a `key=value` argument
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.trim().is_empty() {
        return Err(format!("missing key in '{}'", s));
    }
    Ok((key.trim().to_string(), value.to_string()))
}
