//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, delete) and shared utilities (open_db, resolve_user)
//! - `categories` - Category rule management
//! - `import` - Statement import and CSV export
//! - `reports` - Monthly and yearly reports
//! - `search` - Filtered expense search

pub mod categories;
pub mod core;
pub mod import;
pub mod reports;
pub mod search;

// Re-export command functions for main.rs
pub use categories::*;
pub use core::*;
pub use import::*;
pub use reports::*;
pub use search::*;

use expensetrace_core::money::format_money;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Render cents as `-1,234.56`
pub fn money(cents: i64) -> String {
    format_money(cents, ",", ".")
}
