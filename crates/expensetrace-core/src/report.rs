//! Monthly and yearly reports
//!
//! A report aggregates one window of expenses into income, spending and
//! per-category buckets. Expenses in the exclude category are skipped
//! entirely, so they affect neither totals nor duplicates.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Category, Expense, ExpenseType};
use crate::period::{calendar_days, month_range, month_title, year_range};
use crate::storage::{CategoryStore, ExpenseStore};

pub const UNCATEGORIZED_CHARGE: &str = "uncategorized charge";
pub const UNCATEGORIZED_INCOME: &str = "uncategorized income";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Monthly,
    Yearly,
}

/// Expenses sharing one category name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub name: String,
    /// Signed sum in cents
    pub amount: i64,
    pub expenses: Vec<Expense>,
    /// Share of the spending total for charge buckets, of income otherwise
    pub percentage_of_total: f64,
    pub last_transaction: Option<DateTime<Utc>>,
    pub avg_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub kind: ReportKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Sum of charges, zero or negative
    pub spending: i64,
    pub income: i64,
    pub savings: i64,
    pub savings_percentage: f64,
    pub earnings_per_day: i64,
    pub average_spending_per_day: i64,
    /// Sorted by amount, largest first
    pub categories: Vec<CategoryBucket>,
    /// Descriptions seen more than once, one entry per repeat
    pub duplicates: Vec<String>,
}

/// Aggregate `expenses` for the window `[start, end]`
///
/// Category names are resolved through `storage`; an expense pointing at a
/// category the user does not own is an error.
pub fn generate<S: CategoryStore + ?Sized>(
    storage: &S,
    user_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    expenses: &[Expense],
    kind: ReportKind,
) -> Result<Report> {
    let categories: HashMap<i64, Category> = storage
        .get_categories(user_id)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut buckets: HashMap<String, CategoryBucket> = HashMap::new();
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    let mut income = 0i64;
    let mut spending = 0i64;

    for expense in expenses {
        let category = match expense.category_id {
            Some(id) => {
                let category = categories
                    .get(&id)
                    .ok_or_else(|| Error::NotFound(format!("category {}", id)))?;
                if category.is_exclude() {
                    continue;
                }
                Some(category.name.as_str())
            }
            None => None,
        };

        if !seen.insert(expense.description.as_str()) {
            duplicates.push(expense.description.clone());
        }

        match expense.expense_type {
            ExpenseType::Charge => spending += expense.amount,
            ExpenseType::Income => income += expense.amount,
        }

        let name = bucket_name(expense.expense_type, category);
        buckets
            .entry(name.to_string())
            .or_insert_with(|| CategoryBucket {
                name: name.to_string(),
                amount: 0,
                expenses: Vec::new(),
                percentage_of_total: 0.0,
                last_transaction: None,
                avg_amount: 0,
            })
            .push(expense);
    }

    let mut categories: Vec<CategoryBucket> = buckets
        .into_values()
        .map(|bucket| bucket.finish(income, spending))
        .collect();
    categories.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.name.cmp(&b.name)));

    let savings = income - (-spending);
    let savings_percentage = if income == 0 {
        0.0
    } else {
        savings as f64 / income as f64 * 100.0
    };
    let days = calendar_days(start, end);

    let title = match kind {
        ReportKind::Monthly => month_title(start),
        ReportKind::Yearly => start.year().to_string(),
    };

    debug!(
        user_id,
        title = %title,
        expenses = expenses.len(),
        buckets = categories.len(),
        "Generated report"
    );

    Ok(Report {
        title,
        kind,
        start,
        end,
        spending,
        income,
        savings,
        savings_percentage,
        earnings_per_day: income / days,
        average_spending_per_day: -spending / days,
        categories,
        duplicates,
    })
}

/// Report for one calendar month, loading its expenses from storage
pub fn generate_for_month<S>(storage: &S, user_id: i64, month: u32, year: i32) -> Result<Report>
where
    S: CategoryStore + ExpenseStore + ?Sized,
{
    let (start, end) = month_range(month, year)?;
    let expenses = storage.get_expenses_from_date_range(user_id, start, end)?;
    generate(storage, user_id, start, end, &expenses, ReportKind::Monthly)
}

/// Report for one calendar year, loading its expenses from storage
pub fn generate_for_year<S>(storage: &S, user_id: i64, year: i32) -> Result<Report>
where
    S: CategoryStore + ExpenseStore + ?Sized,
{
    let (start, end) = year_range(year)?;
    let expenses = storage.get_expenses_from_date_range(user_id, start, end)?;
    generate(storage, user_id, start, end, &expenses, ReportKind::Yearly)
}

fn bucket_name(expense_type: ExpenseType, category: Option<&str>) -> &str {
    match (category, expense_type) {
        (Some(name), _) => name,
        (None, ExpenseType::Charge) => UNCATEGORIZED_CHARGE,
        (None, ExpenseType::Income) => UNCATEGORIZED_INCOME,
    }
}

impl CategoryBucket {
    fn push(&mut self, expense: &Expense) {
        self.amount += expense.amount;
        if self.last_transaction.map_or(true, |last| expense.date > last) {
            self.last_transaction = Some(expense.date);
        }
        self.expenses.push(expense.clone());
    }

    fn finish(mut self, income: i64, spending: i64) -> Self {
        if self.amount < 0 && spending < 0 {
            self.percentage_of_total = self.amount as f64 / spending as f64 * 100.0;
        } else if self.amount > 0 && income > 0 {
            self.percentage_of_total = self.amount as f64 / income as f64 * 100.0;
        }
        if !self.expenses.is_empty() {
            self.avg_amount = self.amount / self.expenses.len() as i64;
        }
        self
    }
}
