//! Integer-cent money formatting
//!
//! Amounts are always signed minor units. Nothing here goes through floating
//! point, so a value formatted with [`format_decimal`] parses back to the
//! exact same number of cents.

/// Format cents with custom separators, e.g. `-1.234,56` for
/// `format_money(-123456, ".", ",")`.
pub fn format_money(cents: i64, thousand_sep: &str, decimal_sep: &str) -> String {
    let negative = cents < 0;
    let abs = cents.unsigned_abs();

    let mut whole = abs / 100;
    let mut groups = Vec::new();
    while whole >= 1000 {
        groups.push(format!("{:03}", whole % 1000));
        whole /= 1000;
    }
    groups.push(whole.to_string());
    groups.reverse();

    format!(
        "{}{}{}{:02}",
        if negative { "-" } else { "" },
        groups.join(thousand_sep),
        decimal_sep,
        abs % 100
    )
}

/// Fixed-point rendering with two fractional digits, e.g. `-50.00`
pub fn format_decimal(cents: i64) -> String {
    format_money(cents, "", ".")
}
