//! CSV export
//!
//! Columns: `ID,Source,Date,Description,Amount,Type,Currency,Category`.
//! Dates are `YYYY-MM-DD`, amounts are fixed-point with two decimals and the
//! category column holds the resolved name or stays empty.

use std::collections::HashMap;
use std::io::Write;

use tracing::info;

use crate::error::Result;
use crate::filter::{ExpenseFilter, SortOptions};
use crate::models::Expense;
use crate::money::format_decimal;
use crate::storage::{CategoryStore, ExpenseStore};

pub const CSV_HEADER: [&str; 8] = [
    "ID",
    "Source",
    "Date",
    "Description",
    "Amount",
    "Type",
    "Currency",
    "Category",
];

/// Write `expenses` as CSV, resolving category names through `storage`
///
/// Returns the number of data rows written.
pub fn write_csv<S, W>(storage: &S, user_id: i64, expenses: &[Expense], writer: W) -> Result<usize>
where
    S: CategoryStore + ?Sized,
    W: Write,
{
    let names: HashMap<i64, String> = storage
        .get_categories(user_id)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;

    for expense in expenses {
        let category = expense
            .category_id
            .and_then(|id| names.get(&id))
            .map(String::as_str)
            .unwrap_or("");

        let id = expense.id.to_string();
        let date = expense.date.format("%Y-%m-%d").to_string();
        let amount = format_decimal(expense.amount);
        wtr.write_record([
            id.as_str(),
            expense.source.as_str(),
            date.as_str(),
            expense.description.as_str(),
            amount.as_str(),
            expense.expense_type.as_str(),
            expense.currency.as_str(),
            category,
        ])?;
    }

    wtr.flush()?;
    Ok(expenses.len())
}

/// Run a filtered query and export its rows
pub fn export_filtered<S, W>(
    storage: &S,
    user_id: i64,
    filter: &ExpenseFilter,
    sort: &SortOptions,
    writer: W,
) -> Result<usize>
where
    S: CategoryStore + ExpenseStore + ?Sized,
    W: Write,
{
    let expenses = storage.get_expenses_filtered(user_id, filter, sort)?;
    let written = write_csv(storage, user_id, &expenses, writer)?;
    info!(user_id, rows = written, "Exported expenses");
    Ok(written)
}
