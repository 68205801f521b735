//! Category rule management
//!
//! Creating or editing a rule changes which expenses it owns. The
//! [`Categorizer`] applies those side effects and keeps the shared
//! [`MatcherCache`] coherent: every mutation invalidates the user's snapshot
//! so the next lookup compiles the current rule list.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::matcher::{CategoryMatcher, MatcherCache};
use crate::models::Expense;
use crate::storage::Storage;

/// Outcome of creating or updating a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryChange {
    pub category_id: i64,
    /// Expenses whose category changed as a result
    pub recategorized: usize,
}

/// Uncategorized charges sharing one description
#[derive(Debug, Clone, Serialize)]
pub struct UncategorizedGroup {
    pub description: String,
    pub count: usize,
    /// Signed sum in cents
    pub total: i64,
    pub expenses: Vec<Expense>,
}

pub struct Categorizer<S> {
    storage: Arc<S>,
    matchers: Arc<MatcherCache>,
}

impl<S> Clone for Categorizer<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            matchers: Arc::clone(&self.matchers),
        }
    }
}

impl<S: Storage> Categorizer<S> {
    pub fn new(storage: Arc<S>, matchers: Arc<MatcherCache>) -> Self {
        Self { storage, matchers }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Current rule snapshot for a user
    pub fn matcher(&self, user_id: i64) -> Result<Arc<CategoryMatcher>> {
        self.matchers.get(self.storage.as_ref(), user_id)
    }

    /// Create a rule and assign it to the uncategorized charges it matches
    pub fn create_category(&self, user_id: i64, name: &str, pattern: &str) -> Result<CategoryChange> {
        let category_id = self.storage.create_category(user_id, name, pattern)?;
        self.matchers.invalidate(user_id);

        let re = Regex::new(pattern)?;
        let updated: Vec<Expense> = self
            .storage
            .get_expenses_without_category(user_id)?
            .into_iter()
            .filter(|e| re.is_match(&e.description.to_lowercase()))
            .map(|mut e| {
                e.category_id = Some(category_id);
                e
            })
            .collect();

        let recategorized = self.persist(user_id, &updated)?;
        info!(user_id, category_id, recategorized, "Categorized expenses for new category");
        Ok(CategoryChange {
            category_id,
            recategorized,
        })
    }

    /// Change a rule, then move expenses to whichever rule now matches them
    ///
    /// Expenses of this category that no longer match anything become
    /// uncategorized. Uncategorized charges that now match get assigned.
    pub fn update_category(
        &self,
        user_id: i64,
        category_id: i64,
        name: &str,
        pattern: &str,
    ) -> Result<CategoryChange> {
        self.storage
            .update_category(user_id, category_id, name, pattern)?;
        self.matchers.invalidate(user_id);
        let matcher = self.matcher(user_id)?;

        let mut candidates = self.storage.get_expenses_by_category(user_id, category_id)?;
        candidates.extend(self.storage.get_expenses_without_category(user_id)?);

        let updated: Vec<Expense> = candidates
            .into_iter()
            .filter_map(|mut e| {
                let found = matcher.category_id(&e.description.to_lowercase());
                let next = match e.category_id {
                    // Still ours, or moved to an earlier rule, or dropped
                    Some(current) if current == category_id => found,
                    // Uncategorized rows only gain a category
                    _ => found.or(e.category_id),
                };
                if next == e.category_id {
                    return None;
                }
                e.category_id = next;
                Some(e)
            })
            .collect();

        let recategorized = self.persist(user_id, &updated)?;
        info!(user_id, category_id, recategorized, "Updated category");
        Ok(CategoryChange {
            category_id,
            recategorized,
        })
    }

    /// Delete a rule; its expenses become uncategorized
    pub fn delete_category(&self, user_id: i64, category_id: i64) -> Result<()> {
        self.storage.delete_category(user_id, category_id)?;
        self.matchers.invalidate(user_id);
        Ok(())
    }

    /// Delete every rule except the exclude category
    pub fn reset_categories(&self, user_id: i64) -> Result<usize> {
        let removed = self.storage.delete_categories(user_id)?;
        self.matchers.invalidate(user_id);
        Ok(removed)
    }

    /// Match every uncategorized charge against the current rules
    pub fn recategorize(&self, user_id: i64) -> Result<usize> {
        let matcher = self.matcher(user_id)?;

        let updated: Vec<Expense> = self
            .storage
            .get_expenses_without_category(user_id)?
            .into_iter()
            .filter_map(|mut e| {
                let id = matcher.category_id(&e.description.to_lowercase())?;
                e.category_id = Some(id);
                Some(e)
            })
            .collect();

        let recategorized = self.persist(user_id, &updated)?;
        info!(user_id, recategorized, "Recategorized expenses");
        Ok(recategorized)
    }

    /// Uncategorized charges grouped by description, most frequent first
    pub fn inspect_uncategorized(&self, user_id: i64) -> Result<Vec<UncategorizedGroup>> {
        let mut groups: HashMap<String, UncategorizedGroup> = HashMap::new();

        for expense in self.storage.get_expenses_without_category(user_id)? {
            let group = groups
                .entry(expense.description.clone())
                .or_insert_with(|| UncategorizedGroup {
                    description: expense.description.clone(),
                    count: 0,
                    total: 0,
                    expenses: Vec::new(),
                });
            group.count += 1;
            group.total += expense.amount;
            group.expenses.push(expense);
        }

        let mut groups: Vec<_> = groups.into_values().collect();
        groups.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.description.cmp(&b.description))
        });
        Ok(groups)
    }

    fn persist(&self, user_id: i64, expenses: &[Expense]) -> Result<usize> {
        if expenses.is_empty() {
            return Ok(0);
        }
        debug!(user_id, rows = expenses.len(), "Persisting category changes");
        self.storage.update_expenses(user_id, expenses)
    }
}

/// Append a literal description to a rule pattern
pub fn extend_pattern(pattern: &str, description: &str) -> Result<String> {
    let description = description.trim();
    if description.is_empty() {
        return Err(Error::Validation("description is required".to_string()));
    }

    let escaped = regex::escape(&description.to_lowercase());
    if pattern.is_empty() {
        Ok(escaped)
    } else {
        Ok(format!("{}|{}", pattern, escaped))
    }
}
