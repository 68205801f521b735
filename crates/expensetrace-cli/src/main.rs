//! ExpenseTrace CLI - Personal expense tracker
//!
//! Usage:
//!   expensetrace init                     Create or upgrade the database
//!   expensetrace import statement.csv     Import a bank statement
//!   expensetrace report --month 1         Monthly report
//!   expensetrace category add Food food   Add a categorization rule

mod cli;
mod commands;


use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use expensetrace_core::config::{Config, DEFAULT_CONFIG_PATH};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;

    // Priority: RUST_LOG env var > EXPENSETRACE_LOG_LEVEL > config file > info
    expensetrace_core::logging::init(&config.logger).context("Failed to set up logging")?;

    let db = Arc::new(commands::open_db(&config)?);
    let user_id = || commands::resolve_user(&db, &cli.user).map(|user| user.id);

    match cli.command {
        Commands::Init => commands::cmd_init(&db),
        Commands::Import { file, source } => {
            commands::cmd_import(Arc::clone(&db), user_id()?, &file, source.as_deref()).await
        }
        Commands::Report {
            month,
            year,
            verbose,
        } => commands::cmd_report(&db, user_id()?, month, year, verbose),
        Commands::Category { action } => {
            let user_id = user_id()?;
            let categorizer = commands::categorizer(Arc::clone(&db));
            match action {
                None | Some(CategoryAction::List) => {
                    commands::cmd_category_list(&categorizer, user_id)
                }
                Some(CategoryAction::Add { name, pattern }) => {
                    commands::cmd_category_add(&categorizer, user_id, &name, &pattern)
                }
                Some(CategoryAction::Update { id, name, pattern }) => commands::cmd_category_update(
                    &categorizer,
                    user_id,
                    id,
                    name.as_deref(),
                    pattern.as_deref(),
                ),
                Some(CategoryAction::Extend { id, description }) => {
                    commands::cmd_category_extend(&categorizer, user_id, id, &description)
                }
                Some(CategoryAction::Delete { id }) => {
                    commands::cmd_category_delete(&categorizer, user_id, id)
                }
                Some(CategoryAction::Reset { yes }) => {
                    commands::cmd_category_reset(&categorizer, user_id, yes)
                }
                Some(CategoryAction::Recategorize) => {
                    commands::cmd_category_recategorize(&categorizer, user_id)
                }
                Some(CategoryAction::Inspect { output }) => {
                    commands::cmd_category_inspect(&categorizer, user_id, output.as_deref())
                }
            }
        }
        Commands::Search {
            filters,
            keyword,
            json,
        } => commands::cmd_search(&db, user_id()?, &filters, keyword.as_deref(), json),
        Commands::Export { output, filters } => {
            commands::cmd_export(&db, user_id()?, output.as_deref(), &filters)
        }
        Commands::Delete { yes } => commands::cmd_delete(&db, yes),
    }
}

/// Config file and environment, then `--db` on top
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());
    let mut config = Config::load_from(&path, |key| std::env::var(key).ok())
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(db) = &cli.db {
        config.db.source = db.to_string_lossy().into_owned();
    }
    Ok(config)
}
