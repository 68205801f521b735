//! Category matching
//!
//! A [`CategoryMatcher`] is an immutable, ordered list of compiled category
//! rules for one user. The first rule whose pattern matches wins. Descriptions
//! are expected to be lowercased by the caller.
//!
//! [`MatcherCache`] holds one shared snapshot per user. Category mutations
//! invalidate the entry and the next reader builds a fresh snapshot, so a
//! reader never observes a half-rebuilt rule list.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::error::Result;
use crate::models::Category;
use crate::storage::CategoryStore;

struct Rule {
    re: Regex,
    category_id: i64,
    name: String,
}

/// Result of a successful match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryMatch<'a> {
    pub category_id: i64,
    pub name: &'a str,
}

pub struct CategoryMatcher {
    rules: Vec<Rule>,
    categories: Vec<Category>,
}

impl CategoryMatcher {
    /// Compile every pattern once, keeping the given order
    pub fn new(categories: Vec<Category>) -> Result<Self> {
        let rules = categories
            .iter()
            .map(|c| {
                Ok(Rule {
                    re: Regex::new(&c.pattern)?,
                    category_id: c.id,
                    name: c.name.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules, categories })
    }

    /// First category whose pattern matches the description
    pub fn find(&self, description: &str) -> Option<CategoryMatch<'_>> {
        self.rules
            .iter()
            .find(|rule| rule.re.is_match(description))
            .map(|rule| CategoryMatch {
                category_id: rule.category_id,
                name: &rule.name,
            })
    }

    /// Category id of the first match, if any
    pub fn category_id(&self, description: &str) -> Option<i64> {
        self.find(description).map(|m| m.category_id)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for CategoryMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryMatcher")
            .field("rules", &self.rules.len())
            .finish()
    }
}

#[derive(Debug, Default)]
struct Snapshots {
    matchers: HashMap<i64, Arc<CategoryMatcher>>,
    /// Bumped by every invalidation; a load only lands if it saw the latest
    generations: HashMap<i64, u64>,
}

impl Snapshots {
    fn generation(&self, user_id: i64) -> u64 {
        self.generations.get(&user_id).copied().unwrap_or(0)
    }
}

/// Per-user matcher snapshots shared across requests
#[derive(Debug, Default)]
pub struct MatcherCache {
    snapshots: RwLock<Snapshots>,
}

impl MatcherCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current matcher for a user, loading and compiling it when stale
    ///
    /// A snapshot built while an invalidation raced the load is returned to
    /// this caller but never cached.
    pub fn get<S: CategoryStore + ?Sized>(
        &self,
        storage: &S,
        user_id: i64,
    ) -> Result<Arc<CategoryMatcher>> {
        let generation = {
            let snapshots = self.snapshots.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(matcher) = snapshots.matchers.get(&user_id) {
                return Ok(Arc::clone(matcher));
            }
            snapshots.generation(user_id)
        };

        let matcher = Arc::new(CategoryMatcher::new(storage.get_categories(user_id)?)?);

        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        if snapshots.generation(user_id) == generation {
            debug!(user_id, rules = matcher.len(), "Built category matcher");
            snapshots.matchers.insert(user_id, Arc::clone(&matcher));
        } else {
            debug!(user_id, "Discarded category matcher built before invalidation");
        }
        Ok(matcher)
    }

    /// Mark a user's matcher stale; the next `get` rebuilds it
    pub fn invalidate(&self, user_id: i64) {
        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        snapshots.matchers.remove(&user_id);
        let generation = snapshots.generations.entry(user_id).or_insert(0);
        *generation = generation.wrapping_add(1);
    }
}
