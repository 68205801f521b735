//! Field mapping
//!
//! Applies a user-chosen column mapping to [`ParsedData`], producing typed
//! expenses. Rows that fail to parse are collected as [`RowError`]s and never
//! abort the rest of the file.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::parser::{FileFormat, ParsedData};
use crate::error::{Error, Result};
use crate::matcher::CategoryMatcher;
use crate::models::NewExpense;
use crate::period::start_of_day;

const AMOUNT_PATTERN: &str = r"(?P<charge>-)?(?P<amount>\d+)\.?(?P<decimal>\d*)";

/// Date layouts tried in order, with a human label for previews
const DATE_FORMATS: &[(&str, &str)] = &[
    ("%d/%m/%Y", "DD/MM/YYYY"),
    ("%Y-%m-%d", "YYYY-MM-DD"),
    ("%m/%d/%Y", "MM/DD/YYYY"),
];
const DATETIME_FORMAT: (&str, &str) = ("%Y-%m-%dT%H:%M:%SZ", "ISO 8601");

/// How the amount column is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountFormat {
    /// Major units with an optional fraction, e.g. `-1,234.56`
    #[default]
    Decimal,
    /// Integer minor units, e.g. `-123456`
    Cents,
}

/// Which column holds each expense field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Institution name entered by the user
    pub source: String,
    pub date_column: usize,
    pub description_column: usize,
    pub amount_column: usize,
    pub currency_column: usize,
    /// Per-row source; a non-empty cell overrides `source`
    #[serde(default)]
    pub source_column: Option<usize>,
    #[serde(default)]
    pub amount_format: AmountFormat,
}

impl FieldMapping {
    pub fn new(
        source: impl Into<String>,
        date_column: usize,
        description_column: usize,
        amount_column: usize,
        currency_column: usize,
    ) -> Self {
        Self {
            source: source.into(),
            date_column,
            description_column,
            amount_column,
            currency_column,
            source_column: None,
            amount_format: AmountFormat::Decimal,
        }
    }

    /// Check the mapping against the number of headers in the file
    pub fn validate(&self, header_count: usize) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(Error::Validation("source is required".into()));
        }

        let columns = [
            ("date", Some(self.date_column)),
            ("description", Some(self.description_column)),
            ("amount", Some(self.amount_column)),
            ("currency", Some(self.currency_column)),
            ("source", self.source_column),
        ];
        for (name, index) in columns {
            if let Some(index) = index {
                if index >= header_count {
                    return Err(Error::Validation(format!(
                        "invalid {} column index: {}",
                        name, index
                    )));
                }
            }
        }
        Ok(())
    }

    /// Mapping used by single-shot imports
    ///
    /// Columns are found by header name. CSV files whose headers don't name
    /// the fields fall back to the `source,date,description,amount,currency`
    /// layout. JSON amounts are integer cents.
    pub fn default_for(data: &ParsedData, fallback_source: &str) -> Result<Self> {
        let by_name = (
            data.column_index("date"),
            data.column_index("description"),
            data.column_index("amount"),
            data.column_index("currency"),
        );

        let mut mapping = match (by_name, data.format) {
            ((Some(date), Some(description), Some(amount), Some(currency)), _) => {
                let mut mapping =
                    Self::new(fallback_source, date, description, amount, currency);
                mapping.source_column = data.column_index("source");
                mapping
            }
            (_, FileFormat::Csv) if data.headers.len() >= 5 => {
                let mut mapping = Self::new(fallback_source, 1, 2, 3, 4);
                mapping.source_column = Some(0);
                mapping
            }
            _ => {
                return Err(Error::Validation(format!(
                    "cannot infer a column mapping from headers: {}",
                    data.headers.join(", ")
                )))
            }
        };

        if data.format == FileFormat::Json {
            mapping.amount_format = AmountFormat::Cents;
        }
        Ok(mapping)
    }
}

/// An expense produced from one input row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedExpense {
    pub expense: NewExpense,
    pub row_index: usize,
    /// Name of the matched category
    pub category: Option<String>,
}

/// A row that could not be mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_index: usize,
    pub error: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.row_index, self.error)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingResult {
    pub expenses: Vec<MappedExpense>,
    pub row_errors: Vec<RowError>,
}

impl MappingResult {
    pub fn new_expenses(&self) -> Vec<NewExpense> {
        self.expenses.iter().map(|m| m.expense.clone()).collect()
    }
}

/// Apply a mapping to every row, matching categories along the way
pub fn apply_mapping(
    data: &ParsedData,
    mapping: &FieldMapping,
    matcher: &CategoryMatcher,
) -> Result<MappingResult> {
    apply_mapping_to_rows(&data.rows, data.headers.len(), mapping, matcher)
}

pub(crate) fn apply_mapping_to_rows(
    rows: &[Vec<String>],
    header_count: usize,
    mapping: &FieldMapping,
    matcher: &CategoryMatcher,
) -> Result<MappingResult> {
    mapping.validate(header_count)?;
    let amounts = AmountParser::new()?;

    let mut result = MappingResult::default();
    for (row_index, row) in rows.iter().enumerate() {
        match map_row(row, mapping, matcher, &amounts) {
            Ok((expense, category)) => result.expenses.push(MappedExpense {
                expense,
                row_index,
                category,
            }),
            Err(error) => result.row_errors.push(RowError { row_index, error }),
        }
    }
    Ok(result)
}

fn map_row(
    row: &[String],
    mapping: &FieldMapping,
    matcher: &CategoryMatcher,
    amounts: &AmountParser,
) -> std::result::Result<(NewExpense, Option<String>), String> {
    let cell = |index: usize| {
        row.get(index)
            .map(String::as_str)
            .ok_or_else(|| format!("missing column {}", index))
    };

    let date_str = cell(mapping.date_column)?;
    let description = cell(mapping.description_column)?.to_lowercase();
    let amount_str = cell(mapping.amount_column)?;
    let currency = cell(mapping.currency_column)?;
    let source = match mapping.source_column.map(&cell).transpose()? {
        Some(s) if !s.trim().is_empty() => s,
        _ => mapping.source.as_str(),
    };

    let date = parse_date(date_str).map_err(|e| format!("invalid date {:?}: {}", date_str, e))?;
    let amount = amounts
        .parse(amount_str, mapping.amount_format)
        .map_err(|e| format!("invalid amount {:?}: {}", amount_str, e))?;

    let matched = matcher.find(&description);
    let category_id = matched.map(|m| m.category_id);
    let category = matched.map(|m| m.name.to_string());

    let expense =
        NewExpense::new(source, date, description, amount, currency).with_category(category_id);
    Ok((expense, category))
}

/// Parse a date in any supported layout into midnight (or the given time) UTC
pub fn parse_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    let value = value.trim();

    for (format, _) in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(start_of_day(date));
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, DATETIME_FORMAT.0) {
        return Ok(dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err("unable to parse date".to_string())
}

/// Label of the first layout that parses `sample`
pub fn detect_date_format(sample: &str) -> Option<&'static str> {
    let sample = sample.trim();
    DATE_FORMATS
        .iter()
        .find(|(format, _)| NaiveDate::parse_from_str(sample, format).is_ok())
        .map(|(_, label)| *label)
        .or_else(|| {
            NaiveDateTime::parse_from_str(sample, DATETIME_FORMAT.0)
                .is_ok()
                .then_some(DATETIME_FORMAT.1)
        })
}

/// Parse an amount string in the given format into cents
pub fn parse_amount(value: &str, format: AmountFormat) -> Result<i64> {
    AmountParser::new()?
        .parse(value, format)
        .map_err(Error::Validation)
}

struct AmountParser {
    re: Regex,
}

impl AmountParser {
    fn new() -> Result<Self> {
        Ok(Self {
            re: Regex::new(AMOUNT_PATTERN)?,
        })
    }

    fn parse(&self, value: &str, format: AmountFormat) -> std::result::Result<i64, String> {
        let cleaned: String = value
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();

        let caps = self
            .re
            .captures(&cleaned)
            .ok_or_else(|| "amount does not match expected pattern".to_string())?;

        let negative = caps.name("charge").is_some();
        let whole = caps.name("amount").map_or("", |m| m.as_str());
        let decimal = caps.name("decimal").map_or("", |m| m.as_str());
        let overflow = || "amount out of range".to_string();

        let whole: i64 = whole.parse().map_err(|_| overflow())?;
        let cents = match format {
            AmountFormat::Cents => {
                if !decimal.is_empty() {
                    return Err("expected integer cents".to_string());
                }
                whole
            }
            AmountFormat::Decimal => {
                // Fractions are read as hundredths; digits past the second are dropped
                let mut fraction: String = decimal.chars().take(2).collect();
                while fraction.len() < 2 {
                    fraction.push('0');
                }
                let fraction: i64 = fraction.parse().map_err(|_| overflow())?;
                whole
                    .checked_mul(100)
                    .and_then(|c| c.checked_add(fraction))
                    .ok_or_else(overflow)?
            }
        };

        Ok(if negative { -cents } else { cents })
    }
}
