//! Search command implementation

use std::collections::HashMap;

use anyhow::Result;
use expensetrace_core::{parse_expense_filters, CategoryStore, Database, Expense, ExpenseStore};

use super::{money, truncate};

/// Find expenses matching `key=value` filters
///
/// `--keyword` is shorthand for `description=<keyword>`; an explicit
/// description filter wins over it.
pub fn search(
    db: &Database,
    user_id: i64,
    filters: &[(String, String)],
    keyword: Option<&str>,
) -> Result<Vec<Expense>> {
    let keyword = keyword.map(|k| ("description", k));
    let pairs = filters
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .chain(keyword);

    let (filter, sort) = parse_expense_filters(pairs)?;
    Ok(db.get_expenses_filtered(user_id, &filter, &sort)?)
}

pub fn cmd_search(
    db: &Database,
    user_id: i64,
    filters: &[(String, String)],
    keyword: Option<&str>,
    json: bool,
) -> Result<()> {
    let expenses = search(db, user_id, filters, keyword)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&expenses)?);
        return Ok(());
    }

    if expenses.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    let names: HashMap<i64, String> = db
        .get_categories(user_id)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    println!();
    println!(
        "   {:>6} │ {:10} │ {:35} │ {:>12} │ {:15}",
        "ID", "Date", "Description", "Amount", "Category"
    );
    println!("   ───────┼────────────┼─────────────────────────────────────┼──────────────┼────────────────");

    let mut total = 0i64;
    for expense in &expenses {
        total += expense.amount;
        let category = expense
            .category_id
            .and_then(|id| names.get(&id))
            .map(String::as_str)
            .unwrap_or("-");
        println!(
            "   {:>6} │ {:10} │ {:35} │ {:>12} │ {:15}",
            expense.id,
            expense.date.format("%Y-%m-%d"),
            truncate(&expense.description, 35),
            money(expense.amount),
            truncate(category, 15)
        );
    }

    println!();
    println!("   {} expenses, total {}", expenses.len(), money(total));

    Ok(())
}
