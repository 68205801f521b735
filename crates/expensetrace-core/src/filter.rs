//! Expense filter parsing
//!
//! Turns a flat key/value collection (the shape of a URL query) into an
//! [`ExpenseFilter`] and [`SortOptions`]. Unknown keys are ignored, empty
//! values count as unset, and the first occurrence of a repeated key wins.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Optional predicates for `get_expenses_filtered`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseFilter {
    /// Substring of the description
    pub description: Option<String>,
    /// Substring of the source
    pub source: Option<String>,
    /// Inclusive lower bound in cents
    pub amount_min: Option<i64>,
    /// Inclusive upper bound in cents
    pub amount_max: Option<i64>,
    /// First day included
    pub date_from: Option<NaiveDate>,
    /// Last day included
    pub date_to: Option<NaiveDate>,
}

impl ExpenseFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Date,
    Amount,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Amount => "amount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Ordering for filtered queries; defaults to `date:desc`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortOptions {
    pub field: SortField,
    pub direction: SortDirection,
}

impl std::fmt::Display for SortOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.field.as_str(), self.direction.as_str())
    }
}

impl std::str::FromStr for SortOptions {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (field, direction) = s
            .split_once(':')
            .filter(|(_, d)| !d.contains(':'))
            .ok_or_else(|| "invalid sort format, expected field:direction".to_string())?;

        let field = match field {
            "date" => SortField::Date,
            "amount" => SortField::Amount,
            other => {
                return Err(format!(
                    "invalid sort field: {} (must be date or amount)",
                    other
                ))
            }
        };
        let direction = match direction {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => {
                return Err(format!(
                    "invalid sort direction: {} (must be asc or desc)",
                    other
                ))
            }
        };

        Ok(Self { field, direction })
    }
}

/// Parse key/value pairs into a filter and sort order
pub fn parse_expense_filters<I, K, V>(params: I) -> Result<(ExpenseFilter, SortOptions)>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut filter = ExpenseFilter::default();
    let mut sort = SortOptions::default();
    let mut seen: Vec<String> = Vec::new();

    for (key, value) in params {
        let key = key.as_ref();
        let value = value.as_ref();
        if value.is_empty() || seen.iter().any(|k| k == key) {
            continue;
        }

        match key {
            "description" => filter.description = Some(value.to_string()),
            "source" => filter.source = Some(value.to_string()),
            "amount_min" => filter.amount_min = Some(parse_key(key, value, parse_cents)?),
            "amount_max" => filter.amount_max = Some(parse_key(key, value, parse_cents)?),
            "date_from" => filter.date_from = Some(parse_key(key, value, parse_date)?),
            "date_to" => filter.date_to = Some(parse_key(key, value, parse_date)?),
            "sort" => sort = parse_key(key, value, |v| v.parse())?,
            _ => continue,
        }
        seen.push(key.to_string());
    }

    Ok((filter, sort))
}

fn parse_key<T>(
    key: &str,
    value: &str,
    parse: impl FnOnce(&str) -> std::result::Result<T, String>,
) -> Result<T> {
    parse(value).map_err(|e| Error::Validation(format!("invalid {}: {}", key, e)))
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| e.to_string())
}

/// Decimal dollars to cents, truncating past the second fractional digit
pub(crate) fn parse_cents(value: &str) -> std::result::Result<i64, String> {
    let invalid = || format!("invalid amount format: {:?}", value);

    let trimmed = value.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let mut fraction: String = fraction.chars().take(2).collect();
    while fraction.len() < 2 {
        fraction.push('0');
    }
    let fraction: i64 = fraction.parse().map_err(|_| invalid())?;

    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(invalid)?;
    Ok(if negative { -cents } else { cents })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let (filter, sort) = parse_expense_filters(Vec::<(&str, &str)>::new()).unwrap();
        assert!(filter.is_empty());
        assert_eq!(sort.field, SortField::Date);
        assert_eq!(sort.direction, SortDirection::Desc);
        assert_eq!(sort.to_string(), "date:desc");
    }

    #[test]
    fn test_full_query() {
        let (filter, sort) = parse_expense_filters([
            ("description", "coffee"),
            ("source", "bank"),
            ("amount_min", "10.50"),
            ("amount_max", "100"),
            ("date_from", "2024-02-01"),
            ("date_to", "2024-02-28"),
            ("sort", "amount:asc"),
        ])
        .unwrap();

        assert_eq!(filter.description.as_deref(), Some("coffee"));
        assert_eq!(filter.source.as_deref(), Some("bank"));
        assert_eq!(filter.amount_min, Some(1050));
        assert_eq!(filter.amount_max, Some(10000));
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(filter.date_to, NaiveDate::from_ymd_opt(2024, 2, 28));
        assert_eq!(sort.field, SortField::Amount);
        assert_eq!(sort.direction, SortDirection::Asc);
    }

    #[test]
    fn test_unknown_and_empty_keys_ignored() {
        let (filter, sort) =
            parse_expense_filters([("page", "3"), ("description", ""), ("sort", "")]).unwrap();
        assert!(filter.is_empty());
        assert_eq!(sort, SortOptions::default());
    }

    #[test]
    fn test_first_value_wins() {
        let (filter, _) =
            parse_expense_filters([("source", "first"), ("source", "second")]).unwrap();
        assert_eq!(filter.source.as_deref(), Some("first"));
    }

    #[test]
    fn test_parse_cents_truncates() {
        assert_eq!(parse_cents("10.999"), Ok(1099));
        assert_eq!(parse_cents("5"), Ok(500));
        assert_eq!(parse_cents("0.29"), Ok(29));
        assert_eq!(parse_cents("-5.5"), Ok(-550));
        assert_eq!(parse_cents(".75"), Ok(75));
        assert!(parse_cents("abc").is_err());
        assert!(parse_cents("1e3").is_err());
        assert!(parse_cents(".").is_err());
    }

    #[test]
    fn test_errors_name_the_key() {
        let err = parse_expense_filters([("amount_min", "ten")]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("invalid amount_min"));

        let err = parse_expense_filters([("date_to", "02/28/2024")]).unwrap_err();
        assert!(err.to_string().contains("invalid date_to"));

        let err = parse_expense_filters([("sort", "name:asc")]).unwrap_err();
        assert!(err.to_string().contains("invalid sort"));
        assert!(err.to_string().contains("must be date or amount"));

        let err = parse_expense_filters([("sort", "date:up")]).unwrap_err();
        assert!(err.to_string().contains("must be asc or desc"));

        let err = parse_expense_filters([("sort", "date")]).unwrap_err();
        assert!(err.to_string().contains("expected field:direction"));
    }
}
