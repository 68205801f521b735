//! Import and export command implementations

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use expensetrace_core::{
    export::export_filtered, parse_expense_filters, Database, ImportInfo, ImportService,
    ImportSessionStore, MatcherCache,
};

pub async fn cmd_import(
    db: Arc<Database>,
    user_id: i64,
    file: &Path,
    source: Option<&str>,
) -> Result<()> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", file.display()))?;
    let reader =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;

    println!("📥 Importing {}...", file.display());

    let service = ImportService::new(
        db,
        Arc::new(MatcherCache::new()),
        Arc::new(ImportSessionStore::default()),
    );
    let info = ImportInfo::from_result(
        service
            .import_file(user_id, filename, reader, source)
            .await,
    );

    print_import_info(&info);
    match info.error {
        Some(error) => anyhow::bail!("Import failed: {}", error),
        None => Ok(()),
    }
}

pub fn print_import_info(info: &ImportInfo) {
    println!();
    println!("📊 Import Results");
    println!("   ─────────────────────────────");
    println!("   Imported: {}", info.total_imports);
    println!("   Categorized: {}", info.with_category);
    println!("   Uncategorized: {}", info.without_category);

    if !info.row_errors.is_empty() {
        println!();
        println!("   ⚠️  {} rows skipped:", info.row_errors.len());
        for row_error in &info.row_errors {
            println!("      {}", row_error);
        }
    }

    if info.without_category > 0 {
        println!();
        println!("   💡 Run 'expensetrace category inspect' to see what is still uncategorized");
    }
}

pub fn cmd_export(
    db: &Database,
    user_id: i64,
    output: Option<&Path>,
    filters: &[(String, String)],
) -> Result<()> {
    let (filter, sort) = parse_expense_filters(filters.iter().map(|(k, v)| (k, v)))?;

    let written = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.display()))?;
            let written = export_filtered(db, user_id, &filter, &sort, BufWriter::new(file))?;
            eprintln!("✅ Exported {} expenses to {}", written, path.display());
            written
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            let written = export_filtered(db, user_id, &filter, &sort, &mut lock)?;
            lock.flush()?;
            written
        }
    };

    tracing::debug!(written, "Export finished");
    Ok(())
}
