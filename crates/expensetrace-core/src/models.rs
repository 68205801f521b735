//! Domain models for expensetrace

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the per-user category whose expenses never reach a report
pub const EXCLUDE_CATEGORY_NAME: &str = "🚫 Exclude";

/// Pattern of the exclude category. `$a` can never match, so nothing is
/// auto-assigned to it; users move expenses there by hand.
pub const EXCLUDE_CATEGORY_PATTERN: &str = "$a";

/// Username of the account that owns data imported before users existed
pub const LEGACY_USERNAME: &str = "admin";

/// An account holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A signed-in session, keyed by an opaque 32-hex identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A user-owned categorization rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub pattern: String,
}

impl Category {
    pub fn is_exclude(&self) -> bool {
        self.name == EXCLUDE_CATEGORY_NAME
    }
}

/// Transaction kind, derived from the amount sign on ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseType {
    #[default]
    Charge,
    Income,
}

impl ExpenseType {
    /// Negative amounts are charges, everything else is income
    pub fn from_amount(amount: i64) -> Self {
        if amount < 0 {
            Self::Charge
        } else {
            Self::Income
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Charge => 0,
            Self::Income => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Charge),
            1 => Some(Self::Income),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Charge => "charge",
            Self::Income => "income",
        }
    }
}

impl std::str::FromStr for ExpenseType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "charge" => Ok(Self::Charge),
            "income" => Ok(Self::Income),
            _ => Err(format!("Unknown expense type: {}", s)),
        }
    }
}

impl std::fmt::Display for ExpenseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored expense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub source: String,
    pub date: DateTime<Utc>,
    pub description: String,
    /// Signed minor units (cents)
    pub amount: i64,
    pub expense_type: ExpenseType,
    pub currency: String,
    /// None means uncategorized
    pub category_id: Option<i64>,
}

/// An expense that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub source: String,
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: i64,
    pub expense_type: ExpenseType,
    pub currency: String,
    pub category_id: Option<i64>,
}

impl NewExpense {
    /// Build a record whose type follows the amount sign
    pub fn new(
        source: impl Into<String>,
        date: DateTime<Utc>,
        description: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            date,
            description: description.into(),
            amount,
            expense_type: ExpenseType::from_amount(amount),
            currency: currency.into(),
            category_id: None,
        }
    }

    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }
}
