//! ExpenseTrace Core Library
//!
//! Shared functionality for the expensetrace personal finance tracker:
//! - SQLite storage with versioned migrations
//! - CSV and JSON statement import with field mapping
//! - Regex category rules and recategorization
//! - Monthly and yearly reports
//! - Filtered search and CSV export

pub mod categorizer;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod ids;
pub mod import;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod money;
pub mod period;
pub mod report;
pub mod storage;

pub use categorizer::{extend_pattern, Categorizer, CategoryChange, UncategorizedGroup};
pub use config::{Config, DbConfig, LogFormat, LogLevel, LogOutput, LoggerConfig};
pub use db::Database;
pub use error::{Error, Result};
pub use filter::{parse_expense_filters, ExpenseFilter, SortDirection, SortField, SortOptions};
pub use import::{FieldMapping, ImportInfo, ImportPreview, ImportService, ImportSessionStore};
pub use matcher::{CategoryMatcher, MatcherCache};
pub use models::*;
pub use report::{CategoryBucket, Report, ReportKind};
pub use storage::{CategoryStore, ExpenseStore, SessionStore, Storage, UserStore};
