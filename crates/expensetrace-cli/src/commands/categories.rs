//! Category rule command implementations

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use expensetrace_core::{
    extend_pattern, Categorizer, CategoryStore, Database, ExpenseStore, MatcherCache,
};

use super::{confirm, money, truncate};

pub fn categorizer(db: Arc<Database>) -> Categorizer<Database> {
    Categorizer::new(db, Arc::new(MatcherCache::new()))
}

pub fn cmd_category_list(categorizer: &Categorizer<Database>, user_id: i64) -> Result<()> {
    let db = categorizer.storage();
    let categories = db.get_categories(user_id)?;

    println!();
    println!("🏷️  Categories");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {:>4} │ {:20} │ {:30} │ {:>5}", "ID", "Name", "Pattern", "Count");
    println!("   ─────┼──────────────────────┼────────────────────────────────┼──────");

    for category in &categories {
        let count = db.get_expenses_by_category(user_id, category.id)?.len();
        println!(
            "   {:>4} │ {:20} │ {:30} │ {:>5}",
            category.id,
            truncate(&category.name, 20),
            truncate(&category.pattern, 30),
            count
        );
    }

    let uncategorized = db.count_expenses_without_category(user_id)?;
    if uncategorized > 0 {
        println!();
        println!("   {} uncategorized charges", uncategorized);
    }

    Ok(())
}

pub fn cmd_category_add(
    categorizer: &Categorizer<Database>,
    user_id: i64,
    name: &str,
    pattern: &str,
) -> Result<()> {
    let change = categorizer
        .create_category(user_id, name, pattern)
        .with_context(|| format!("Failed to create category '{}'", name))?;

    println!("✅ Created category '{}' (id: {})", name, change.category_id);
    if change.recategorized > 0 {
        println!("   Categorized {} existing expenses", change.recategorized);
    }

    Ok(())
}

pub fn cmd_category_update(
    categorizer: &Categorizer<Database>,
    user_id: i64,
    id: i64,
    name: Option<&str>,
    pattern: Option<&str>,
) -> Result<()> {
    if name.is_none() && pattern.is_none() {
        anyhow::bail!("Nothing to update. Pass --name and/or --pattern.");
    }

    let current = categorizer.storage().get_category(user_id, id)?;
    if current.is_exclude() {
        anyhow::bail!("The exclude category cannot be changed");
    }

    let name = name.unwrap_or(current.name.as_str());
    let pattern = pattern.unwrap_or(current.pattern.as_str());
    let change = categorizer.update_category(user_id, id, name, pattern)?;

    println!("✅ Updated category '{}'", name);
    if change.recategorized > 0 {
        println!("   {} expenses changed category", change.recategorized);
    }

    Ok(())
}

pub fn cmd_category_extend(
    categorizer: &Categorizer<Database>,
    user_id: i64,
    id: i64,
    description: &str,
) -> Result<()> {
    let current = categorizer.storage().get_category(user_id, id)?;
    if current.is_exclude() {
        anyhow::bail!("The exclude category cannot be changed");
    }
    let pattern = extend_pattern(&current.pattern, description)?;
    let change = categorizer.update_category(user_id, id, &current.name, &pattern)?;

    println!("✅ '{}' now matches: {}", current.name, pattern);
    if change.recategorized > 0 {
        println!("   {} expenses changed category", change.recategorized);
    }

    Ok(())
}

pub fn cmd_category_delete(
    categorizer: &Categorizer<Database>,
    user_id: i64,
    id: i64,
) -> Result<()> {
    let category = categorizer.storage().get_category(user_id, id)?;
    categorizer.delete_category(user_id, id)?;
    println!("✅ Deleted category '{}'", category.name);

    Ok(())
}

pub fn cmd_category_reset(
    categorizer: &Categorizer<Database>,
    user_id: i64,
    yes: bool,
) -> Result<()> {
    if !yes && !confirm("⚠️  This will delete every category except the exclude one.")? {
        println!("Cancelled.");
        return Ok(());
    }

    let removed = categorizer.reset_categories(user_id)?;
    println!("✅ Deleted {} categories", removed);

    Ok(())
}

pub fn cmd_category_recategorize(categorizer: &Categorizer<Database>, user_id: i64) -> Result<()> {
    let updated = categorizer.recategorize(user_id)?;
    let remaining = categorizer
        .storage()
        .count_expenses_without_category(user_id)?;

    println!("✅ Categorized {} expenses", updated);
    println!("   {} still uncategorized", remaining);

    Ok(())
}

pub fn cmd_category_inspect(
    categorizer: &Categorizer<Database>,
    user_id: i64,
    output: Option<&Path>,
) -> Result<()> {
    let groups = categorizer.inspect_uncategorized(user_id)?;

    if let Some(path) = output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        serde_json::to_writer_pretty(file, &groups)?;
        println!("✅ Wrote {} groups to {}", groups.len(), path.display());
        return Ok(());
    }

    if groups.is_empty() {
        println!("✅ Every charge has a category.");
        return Ok(());
    }

    println!();
    println!("🔍 Uncategorized charges");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {:40} │ {:>5} │ {:>12}", "Description", "Count", "Total");
    println!("   ─────────────────────────────────────────┼───────┼─────────────");
    for group in &groups {
        println!(
            "   {:40} │ {:>5} │ {:>12}",
            truncate(&group.description, 40),
            group.count,
            money(group.total)
        );
    }
    println!();
    println!("   💡 Add one to a rule with: expensetrace category extend <id> \"<description>\"");

    Ok(())
}
