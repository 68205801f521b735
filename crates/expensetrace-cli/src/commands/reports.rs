//! Report command implementations

use anyhow::Result;
use chrono::{Datelike, Utc};
use expensetrace_core::{
    report::{generate_for_month, generate_for_year},
    Database, Report, ReportKind,
};

use super::{money, truncate};

/// Monthly report when a month is given, yearly otherwise
pub fn cmd_report(
    db: &Database,
    user_id: i64,
    month: Option<u32>,
    year: Option<i32>,
    verbose: bool,
) -> Result<()> {
    let report = build_report(db, user_id, month, year)?;
    print_report(&report, verbose);
    Ok(())
}

pub fn build_report(
    db: &Database,
    user_id: i64,
    month: Option<u32>,
    year: Option<i32>,
) -> Result<Report> {
    let year = year.unwrap_or_else(|| Utc::now().year());
    let report = match month {
        Some(month) => generate_for_month(db, user_id, month, year)?,
        None => generate_for_year(db, user_id, year)?,
    };
    Ok(report)
}

fn print_report(report: &Report, verbose: bool) {
    let heading = match report.kind {
        ReportKind::Monthly => "Monthly Report",
        ReportKind::Yearly => "Yearly Report",
    };

    println!();
    println!("📊 {}: {}", heading, report.title);
    println!(
        "   Period: {} to {}",
        report.start.format("%Y-%m-%d"),
        report.end.format("%Y-%m-%d")
    );
    println!("   ─────────────────────────────────────────────────────────────");

    if report.categories.is_empty() {
        println!("   No expenses found in this period.");
        return;
    }

    println!("   Income:   {:>14}", money(report.income));
    println!("   Spending: {:>14}", money(report.spending));
    println!(
        "   Savings:  {:>14}  ({:.2}%)",
        money(report.savings),
        report.savings_percentage
    );
    println!("   Earnings per day: {}", money(report.earnings_per_day));
    println!("   Spending per day: {}", money(report.average_spending_per_day));
    println!();
    println!(
        "   {:25} │ {:>14} │ {:>6} │ {:>5}",
        "Category", "Amount", "%", "Count"
    );
    println!("   ──────────────────────────┼────────────────┼────────┼───────");

    for bucket in &report.categories {
        println!(
            "   {:25} │ {:>14} │ {:>5.1}% │ {:>5}",
            truncate(&bucket.name, 25),
            money(bucket.amount),
            bucket.percentage_of_total,
            bucket.expenses.len()
        );

        if verbose {
            for expense in &bucket.expenses {
                println!(
                    "     {} {:40} {:>14}",
                    expense.date.format("%Y-%m-%d"),
                    truncate(&expense.description, 40),
                    money(expense.amount)
                );
            }
        }
    }

    if !report.duplicates.is_empty() {
        println!();
        println!(
            "   ⚠️  {} repeated descriptions (possible duplicates):",
            report.duplicates.len()
        );
        for description in &report.duplicates {
            println!("      {}", truncate(description, 60));
        }
    }
}
