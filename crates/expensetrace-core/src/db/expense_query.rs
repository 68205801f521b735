//! Expense query builder for filtered reads
//!
//! Turns an [`ExpenseFilter`] and [`SortOptions`] into a parameterized
//! WHERE/ORDER BY pair. Every query is scoped to one user; the other
//! predicates are optional and combined with AND.

use crate::filter::{ExpenseFilter, SortDirection, SortField, SortOptions};
use crate::period::start_of_day;

use super::EXPENSE_COLUMNS;

/// Builder for filtered expense queries
///
/// The lifetime `'query` covers the borrowed filter values.
pub struct ExpenseQuery<'query> {
    user_id: i64,
    description: Option<&'query str>,
    source: Option<&'query str>,
    amount_min: Option<i64>,
    amount_max: Option<i64>,
    date_from: Option<chrono::NaiveDate>,
    date_to: Option<chrono::NaiveDate>,
    sort: SortOptions,
}

/// Result of building a query - SQL components and their parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> ExpenseQuery<'query> {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            description: None,
            source: None,
            amount_min: None,
            amount_max: None,
            date_from: None,
            date_to: None,
            sort: SortOptions::default(),
        }
    }

    /// Copy every predicate from a parsed filter
    pub fn filter(self, filter: &'query ExpenseFilter) -> Self {
        self.description(filter.description.as_deref())
            .source(filter.source.as_deref())
            .amount_range(filter.amount_min, filter.amount_max)
            .date_range(filter.date_from, filter.date_to)
    }

    /// Substring match on the description
    pub fn description(mut self, value: Option<&'query str>) -> Self {
        self.description = value;
        self
    }

    /// Substring match on the source
    pub fn source(mut self, value: Option<&'query str>) -> Self {
        self.source = value;
        self
    }

    /// Inclusive amount bounds in cents
    pub fn amount_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.amount_min = min;
        self.amount_max = max;
        self
    }

    /// Inclusive calendar-day bounds, UTC
    pub fn date_range(
        mut self,
        from: Option<chrono::NaiveDate>,
        to: Option<chrono::NaiveDate>,
    ) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn sort(mut self, sort: SortOptions) -> Self {
        self.sort = sort;
        self
    }

    /// Build the query components
    pub fn build(self) -> FilterResult {
        let mut conditions = vec!["user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(self.user_id)];

        if let Some(d) = self.description.map(str::trim).filter(|d| !d.is_empty()) {
            conditions.push("description LIKE ?".to_string());
            params.push(Box::new(format!("%{}%", d)));
        }

        if let Some(s) = self.source.map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push("source LIKE ?".to_string());
            params.push(Box::new(format!("%{}%", s)));
        }

        if let Some(min) = self.amount_min {
            conditions.push("amount >= ?".to_string());
            params.push(Box::new(min));
        }

        if let Some(max) = self.amount_max {
            conditions.push("amount <= ?".to_string());
            params.push(Box::new(max));
        }

        if let Some(from) = self.date_from {
            conditions.push("date >= ?".to_string());
            params.push(Box::new(start_of_day(from).timestamp()));
        }

        // date_to covers its whole day
        if let Some(to) = self.date_to.and_then(|d| d.succ_opt()) {
            conditions.push("date < ?".to_string());
            params.push(Box::new(start_of_day(to).timestamp()));
        }

        let column = match self.sort.field {
            SortField::Date => "date",
            SortField::Amount => "amount",
        };
        let direction = match self.sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };

        FilterResult {
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            order_clause: format!("ORDER BY {} {}, id {}", column, direction, direction),
            params,
        }
    }
}

impl FilterResult {
    /// Build the SELECT query
    pub fn build_select_query(&self) -> String {
        format!(
            "SELECT {} FROM expenses {} {}",
            EXPENSE_COLUMNS, self.where_clause, self.order_clause
        )
    }

    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM expenses {}", self.where_clause)
    }

    /// Parameters as the slice rusqlite expects
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}
