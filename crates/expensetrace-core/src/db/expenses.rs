//! Expense operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Params};
use tracing::{debug, info};

use super::expense_query::ExpenseQuery;
use super::{expense_from_row, Database, EXPENSE_COLUMNS};
use crate::error::{Error, OpContext, Result};
use crate::filter::{ExpenseFilter, SortOptions};
use crate::models::{Expense, ExpenseType, NewExpense};
use crate::storage::ExpenseStore;

impl Database {
    /// Run a SELECT over the expense columns with the given tail
    fn query_expenses<P: Params>(
        &self,
        op: &'static str,
        tail: &str,
        params: P,
    ) -> Result<Vec<Expense>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM expenses {}", EXPENSE_COLUMNS, tail))
            .op(op)?;

        let expenses = stmt
            .query_map(params, expense_from_row)
            .op(op)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .op(op)?;

        Ok(expenses)
    }

    fn query_expense<P: Params>(
        &self,
        op: &'static str,
        tail: &str,
        params: P,
        missing: impl FnOnce() -> String,
    ) -> Result<Expense> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM expenses {}", EXPENSE_COLUMNS, tail),
            params,
            expense_from_row,
        )
        .optional()
        .op(op)?
        .ok_or_else(|| Error::NotFound(missing()))
    }

    /// Number of matching rows for a filter, ignoring sort
    pub fn count_expenses_filtered(&self, user_id: i64, filter: &ExpenseFilter) -> Result<i64> {
        let query = ExpenseQuery::new(user_id).filter(filter).build();
        let conn = self.conn()?;
        conn.query_row(
            &query.build_count_query(),
            query.params_refs().as_slice(),
            |row| row.get(0),
        )
        .op("count_expenses_filtered")
    }
}

impl ExpenseStore for Database {
    fn insert_expenses_each(&self, user_id: i64, expenses: &[NewExpense]) -> Result<Vec<bool>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().op("insert_expenses")?;
        let mut inserted = Vec::with_capacity(expenses.len());

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO expenses
                        (source, amount, description, expense_type, date, currency, category_id, user_id)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .op("insert_expenses")?;

            for e in expenses {
                let changed = stmt
                    .execute(params![
                        e.source,
                        e.amount,
                        e.description,
                        e.expense_type.as_i64(),
                        e.date.timestamp(),
                        e.currency,
                        e.category_id,
                        user_id,
                    ])
                    .op("insert_expenses")?;
                inserted.push(changed > 0);
            }
        }

        tx.commit().op("insert_expenses")?;

        let count = inserted.iter().filter(|i| **i).count();
        info!(user_id, inserted = count, skipped = expenses.len() - count, "Inserted expenses");
        Ok(inserted)
    }

    fn update_expenses(&self, user_id: i64, expenses: &[Expense]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().op("update_expenses")?;
        let mut written = 0;

        {
            // Ids that belong to another user are left alone
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO expenses
                        (id, source, amount, description, expense_type, date, currency, category_id, user_id)
                     SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
                     WHERE NOT EXISTS (SELECT 1 FROM expenses WHERE id = ?1 AND user_id != ?9)",
                )
                .op("update_expenses")?;

            for e in expenses {
                written += stmt
                    .execute(params![
                        e.id,
                        e.source,
                        e.amount,
                        e.description,
                        e.expense_type.as_i64(),
                        e.date.timestamp(),
                        e.currency,
                        e.category_id,
                        user_id,
                    ])
                    .op("update_expenses")?;
            }
        }

        tx.commit().op("update_expenses")?;
        debug!(user_id, written, "Updated expenses");
        Ok(written)
    }

    fn get_expense(&self, user_id: i64, id: i64) -> Result<Expense> {
        self.query_expense(
            "get_expense",
            "WHERE id = ? AND user_id = ?",
            params![id, user_id],
            || format!("expense {}", id),
        )
    }

    fn update_expense(&self, user_id: i64, expense: &Expense) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE expenses
                 SET source = ?, amount = ?, description = ?, expense_type = ?, date = ?,
                     currency = ?, category_id = ?
                 WHERE id = ? AND user_id = ?",
                params![
                    expense.source,
                    expense.amount,
                    expense.description,
                    expense.expense_type.as_i64(),
                    expense.date.timestamp(),
                    expense.currency,
                    expense.category_id,
                    expense.id,
                    user_id,
                ],
            )
            .map_err(|e| {
                if Error::is_unique_violation(&e) {
                    Error::Conflict(format!("expense {} duplicates an existing row", expense.id))
                } else {
                    Error::Storage {
                        op: "update_expense",
                        source: e,
                    }
                }
            })?;

        if rows == 0 {
            return Err(Error::NotFound(format!("expense {}", expense.id)));
        }
        Ok(())
    }

    fn delete_expense(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                "DELETE FROM expenses WHERE id = ? AND user_id = ?",
                params![id, user_id],
            )
            .op("delete_expense")?;
        if rows == 0 {
            return Err(Error::NotFound(format!("expense {}", id)));
        }
        Ok(())
    }

    fn get_expenses(&self, user_id: i64) -> Result<Vec<Expense>> {
        self.query_expenses(
            "get_expenses",
            "WHERE user_id = ? AND expense_type = ? ORDER BY date DESC, id DESC",
            params![user_id, ExpenseType::Charge.as_i64()],
        )
    }

    fn get_all_expenses(&self, user_id: i64) -> Result<Vec<Expense>> {
        self.query_expenses(
            "get_all_expenses",
            "WHERE user_id = ? ORDER BY date DESC, id DESC",
            [user_id],
        )
    }

    fn get_expenses_from_date_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Expense>> {
        self.query_expenses(
            "get_expenses_from_date_range",
            "WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date, id",
            params![user_id, start.timestamp(), end.timestamp()],
        )
    }

    fn get_expenses_without_category(&self, user_id: i64) -> Result<Vec<Expense>> {
        self.query_expenses(
            "get_expenses_without_category",
            "WHERE user_id = ? AND category_id IS NULL AND expense_type = ? ORDER BY date DESC, id DESC",
            params![user_id, ExpenseType::Charge.as_i64()],
        )
    }

    fn get_expenses_without_category_matching(
        &self,
        user_id: i64,
        keyword: &str,
    ) -> Result<Vec<Expense>> {
        self.query_expenses(
            "get_expenses_without_category_matching",
            "WHERE user_id = ? AND category_id IS NULL AND expense_type = ? AND description LIKE ?
             ORDER BY date DESC, id DESC",
            params![
                user_id,
                ExpenseType::Charge.as_i64(),
                format!("%{}%", keyword)
            ],
        )
    }

    fn count_expenses_without_category(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM expenses WHERE user_id = ? AND category_id IS NULL AND expense_type = ?",
            params![user_id, ExpenseType::Charge.as_i64()],
            |row| row.get(0),
        )
        .op("count_expenses_without_category")
    }

    fn get_expenses_by_category(&self, user_id: i64, category_id: i64) -> Result<Vec<Expense>> {
        self.query_expenses(
            "get_expenses_by_category",
            "WHERE user_id = ? AND category_id = ? ORDER BY date DESC, id DESC",
            params![user_id, category_id],
        )
    }

    fn get_first_expense(&self, user_id: i64) -> Result<Expense> {
        self.query_expense(
            "get_first_expense",
            "WHERE user_id = ? ORDER BY date ASC, id ASC LIMIT 1",
            [user_id],
            || format!("expenses for user {}", user_id),
        )
    }

    fn search_expenses(&self, user_id: i64, keyword: &str) -> Result<Vec<Expense>> {
        self.query_expenses(
            "search_expenses",
            "WHERE user_id = ? AND description LIKE ? ORDER BY date DESC, id DESC",
            params![user_id, format!("%{}%", keyword)],
        )
    }

    fn search_expenses_by_description(
        &self,
        user_id: i64,
        description: &str,
    ) -> Result<Vec<Expense>> {
        self.query_expenses(
            "search_expenses_by_description",
            "WHERE user_id = ? AND description = ? ORDER BY date DESC, id DESC",
            params![user_id, description],
        )
    }

    fn get_expenses_filtered(
        &self,
        user_id: i64,
        filter: &ExpenseFilter,
        sort: &SortOptions,
    ) -> Result<Vec<Expense>> {
        let query = ExpenseQuery::new(user_id).filter(filter).sort(*sort).build();
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&query.build_select_query())
            .op("get_expenses_filtered")?;

        let expenses = stmt
            .query_map(query.params_refs().as_slice(), expense_from_row)
            .op("get_expenses_filtered")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .op("get_expenses_filtered")?;

        debug!(user_id, sort = %sort, rows = expenses.len(), "Filtered expenses");
        Ok(expenses)
    }
}
