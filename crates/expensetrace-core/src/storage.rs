//! Storage capabilities
//!
//! The persistence interface is split by domain so each `db/*.rs` file
//! implements one trait for [`crate::Database`]. Services take `S: Storage`,
//! which any type providing all four capabilities satisfies.
//!
//! Every operation except the user/session lookups is scoped by `user_id`.
//! "Get one" operations return [`crate::Error::NotFound`] when the row is
//! absent.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::filter::{ExpenseFilter, SortOptions};
use crate::models::{Category, Expense, NewExpense, Session, User};

pub trait UserStore {
    /// Insert the user and their exclude category in one transaction
    fn create_user(&self, username: &str, password_hash: &str) -> Result<User>;
    fn get_user_by_id(&self, id: i64) -> Result<User>;
    fn get_user_by_username(&self, username: &str) -> Result<User>;
    fn update_username(&self, id: i64, username: &str) -> Result<()>;
    fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;
}

pub trait SessionStore {
    /// Create a session with a fresh 32-hex identifier
    fn create_session(&self, user_id: i64, expires_at: DateTime<Utc>) -> Result<Session>;
    /// Missing and expired sessions are both `NotFound`
    fn get_session(&self, id: &str) -> Result<Session>;
    fn delete_session(&self, id: &str) -> Result<()>;
    fn delete_expired_sessions(&self) -> Result<usize>;
}

pub trait CategoryStore {
    fn create_category(&self, user_id: i64, name: &str, pattern: &str) -> Result<i64>;
    /// Categories in insertion order
    fn get_categories(&self, user_id: i64) -> Result<Vec<Category>>;
    fn get_category(&self, user_id: i64, id: i64) -> Result<Category>;
    fn update_category(&self, user_id: i64, id: i64, name: &str, pattern: &str) -> Result<()>;
    fn delete_category(&self, user_id: i64, id: i64) -> Result<()>;
    /// Remove every category except the exclude one, uncategorizing their expenses
    fn delete_categories(&self, user_id: i64) -> Result<usize>;
    fn get_exclude_category(&self, user_id: i64) -> Result<Category>;
}

pub trait ExpenseStore {
    /// `INSERT OR IGNORE` against the uniqueness tuple in one transaction;
    /// one flag per input row, `false` for duplicates
    fn insert_expenses_each(&self, user_id: i64, expenses: &[NewExpense]) -> Result<Vec<bool>>;
    /// Rows inserted by [`ExpenseStore::insert_expenses_each`]
    fn insert_expenses(&self, user_id: i64, expenses: &[NewExpense]) -> Result<usize> {
        let inserted = self.insert_expenses_each(user_id, expenses)?;
        Ok(inserted.into_iter().filter(|inserted| *inserted).count())
    }
    /// `INSERT OR REPLACE` keyed by id; returns rows written
    fn update_expenses(&self, user_id: i64, expenses: &[Expense]) -> Result<usize>;
    fn get_expense(&self, user_id: i64, id: i64) -> Result<Expense>;
    fn update_expense(&self, user_id: i64, expense: &Expense) -> Result<()>;
    fn delete_expense(&self, user_id: i64, id: i64) -> Result<()>;
    /// Charges only
    fn get_expenses(&self, user_id: i64) -> Result<Vec<Expense>>;
    /// Charges and income
    fn get_all_expenses(&self, user_id: i64) -> Result<Vec<Expense>>;
    /// Inclusive on both ends
    fn get_expenses_from_date_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Expense>>;
    /// Uncategorized charges
    fn get_expenses_without_category(&self, user_id: i64) -> Result<Vec<Expense>>;
    fn get_expenses_without_category_matching(
        &self,
        user_id: i64,
        keyword: &str,
    ) -> Result<Vec<Expense>>;
    fn count_expenses_without_category(&self, user_id: i64) -> Result<i64>;
    fn get_expenses_by_category(&self, user_id: i64, category_id: i64) -> Result<Vec<Expense>>;
    /// Oldest expense
    fn get_first_expense(&self, user_id: i64) -> Result<Expense>;
    /// `description LIKE %keyword%`
    fn search_expenses(&self, user_id: i64, keyword: &str) -> Result<Vec<Expense>>;
    /// Exact description match
    fn search_expenses_by_description(&self, user_id: i64, description: &str)
        -> Result<Vec<Expense>>;
    fn get_expenses_filtered(
        &self,
        user_id: i64,
        filter: &ExpenseFilter,
        sort: &SortOptions,
    ) -> Result<Vec<Expense>>;
}

/// The full capability set handed to services and entry points
pub trait Storage: UserStore + SessionStore + CategoryStore + ExpenseStore {}

impl<T> Storage for T where T: UserStore + SessionStore + CategoryStore + ExpenseStore {}
