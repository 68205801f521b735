//! Statement import pipeline
//!
//! Two-step flow for interactive callers:
//! 1. [`ImportService::begin`] parses the upload and parks it in an import
//!    session, returning a preview.
//! 2. [`ImportService::commit`] maps the rows with a [`FieldMapping`],
//!    categorizes them and inserts them.
//!
//! [`ImportService::map`] previews a mapping in between, and
//! [`ImportService::import_file`] does everything in one shot with the
//! default mapping.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::matcher::MatcherCache;
use crate::models::NewExpense;
use crate::storage::Storage;

pub mod mapper;
pub mod parser;
pub mod session;

pub use mapper::{
    apply_mapping, detect_date_format, parse_amount, parse_date, AmountFormat, FieldMapping,
    MappedExpense, MappingResult, RowError,
};
pub use parser::{parse_csv, parse_file, parse_json, FileFormat, ParsedData};
pub use session::{ImportSession, ImportSessionStore, DEFAULT_SESSION_TTL, DEFAULT_SWEEP_PERIOD};

/// Largest accepted upload
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 32 << 20;

/// Rows shown by previews
pub const PREVIEW_ROWS: usize = 5;

/// Summary of a finished import
///
/// `error` is set when the import failed as a whole; `total_imports` is then 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Rows inserted; duplicates of stored rows are not counted
    pub total_imports: usize,
    pub with_category: usize,
    pub without_category: usize,
    pub row_errors: Vec<RowError>,
    pub error: Option<String>,
}

impl ImportInfo {
    pub fn failed(err: &Error) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::default()
        }
    }

    /// Collapse a fallible import into a summary for display
    pub fn from_result(result: Result<ImportInfo>) -> Self {
        result.unwrap_or_else(|e| Self::failed(&e))
    }
}

/// Returned by the parse phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPreview {
    pub session_id: String,
    pub filename: String,
    pub headers: Vec<String>,
    /// First rows of the file
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub format: FileFormat,
}

/// Mapping applied to the preview rows only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPreview {
    pub expenses: Vec<MappedExpense>,
    pub row_errors: Vec<RowError>,
}

pub struct ImportService<S> {
    storage: Arc<S>,
    matchers: Arc<MatcherCache>,
    sessions: Arc<ImportSessionStore>,
    max_upload_bytes: u64,
}

impl<S> Clone for ImportService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            matchers: Arc::clone(&self.matchers),
            sessions: Arc::clone(&self.sessions),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

impl<S> ImportService<S>
where
    S: Storage + Send + Sync + 'static,
{
    pub fn new(
        storage: Arc<S>,
        matchers: Arc<MatcherCache>,
        sessions: Arc<ImportSessionStore>,
    ) -> Self {
        Self {
            storage,
            matchers,
            sessions,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn sessions(&self) -> &Arc<ImportSessionStore> {
        &self.sessions
    }

    /// Parse phase: read and parse the upload, then open a session for it
    pub async fn begin<R: Read>(&self, filename: &str, reader: R) -> Result<ImportPreview> {
        let data = self.parse_upload(filename, reader)?;

        let headers = data.headers.clone();
        let rows = data.preview_rows(PREVIEW_ROWS).to_vec();
        let total_rows = data.total_rows();
        let format = data.format;

        let session_id = self.sessions.create(filename, data).await;
        info!(session_id = %session_id, filename, total_rows, "Started import");

        Ok(ImportPreview {
            session_id,
            filename: filename.to_string(),
            headers,
            rows,
            total_rows,
            format,
        })
    }

    /// Validate a mapping against a session and preview its effect
    ///
    /// The mapping is stored on the session so `commit` can reuse it.
    pub async fn map(
        &self,
        user_id: i64,
        session_id: &str,
        mapping: FieldMapping,
    ) -> Result<MappingPreview> {
        let session = self.session(session_id).await?;
        let matcher = self.blocking(move |storage, matchers| matchers.get(storage, user_id)).await?;

        let result = mapper::apply_mapping_to_rows(
            session.data.preview_rows(PREVIEW_ROWS),
            session.data.headers.len(),
            &mapping,
            &matcher,
        )?;

        if !self.sessions.update_mapping(session_id, mapping).await {
            return Err(expired(session_id));
        }

        Ok(MappingPreview {
            expenses: result.expenses,
            row_errors: result.row_errors,
        })
    }

    /// Commit phase: map every row and insert the expenses
    ///
    /// Uses `mapping` when given, else the one stored by `map`. The session
    /// is closed once the rows are stored.
    pub async fn commit(
        &self,
        user_id: i64,
        session_id: &str,
        mapping: Option<FieldMapping>,
    ) -> Result<ImportInfo> {
        let session = self.session(session_id).await?;
        let mapping = mapping
            .or(session.mapping)
            .ok_or_else(|| Error::Validation("a field mapping is required".to_string()))?;

        let info = self.store(user_id, session.data, mapping).await?;
        self.sessions.delete(session_id).await;

        info!(
            session_id,
            user_id,
            total = info.total_imports,
            row_errors = info.row_errors.len(),
            "Import committed"
        );
        Ok(info)
    }

    /// Single-shot import with the default mapping for the file
    ///
    /// The source defaults to the file stem when rows carry none.
    pub async fn import_file<R: Read>(
        &self,
        user_id: i64,
        filename: &str,
        reader: R,
        source: Option<&str>,
    ) -> Result<ImportInfo> {
        let data = self.parse_upload(filename, reader)?;

        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        let mapping = FieldMapping::default_for(&data, source.unwrap_or(stem))?;

        let info = self.store(user_id, Arc::new(data), mapping).await?;
        info!(
            filename,
            user_id,
            total = info.total_imports,
            row_errors = info.row_errors.len(),
            "Imported file"
        );
        Ok(info)
    }

    fn parse_upload<R: Read>(&self, filename: &str, reader: R) -> Result<ParsedData> {
        // Format errors come before reading anything
        FileFormat::from_filename(filename)?;

        let mut bytes = Vec::new();
        reader
            .take(self.max_upload_bytes.saturating_add(1))
            .read_to_end(&mut bytes)?;
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(Error::FileTooLarge {
                limit: self.max_upload_bytes,
            });
        }

        parse_file(filename, bytes.as_slice())
    }

    async fn session(&self, session_id: &str) -> Result<ImportSession> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| expired(session_id))
    }

    async fn store(
        &self,
        user_id: i64,
        data: Arc<ParsedData>,
        mapping: FieldMapping,
    ) -> Result<ImportInfo> {
        self.blocking(move |storage, matchers| {
            let matcher = matchers.get(storage, user_id)?;
            let result = apply_mapping(&data, &mapping, &matcher)?;
            for row_error in &result.row_errors {
                warn!(user_id, "Skipped import {}", row_error);
            }

            let expenses = result.new_expenses();
            let inserted = storage.insert_expenses_each(user_id, &expenses)?;
            let (with_category, without_category) = count_inserted(&expenses, &inserted);

            Ok(ImportInfo {
                total_imports: with_category + without_category,
                with_category,
                without_category,
                row_errors: result.row_errors,
                error: None,
            })
        })
        .await
    }

    /// Run storage work off the async executor
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S, &MatcherCache) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let matchers = Arc::clone(&self.matchers);
        tokio::task::spawn_blocking(move || f(storage.as_ref(), matchers.as_ref())).await?
    }
}

/// Inserted rows split into (categorized, uncategorized)
fn count_inserted(expenses: &[NewExpense], inserted: &[bool]) -> (usize, usize) {
    expenses
        .iter()
        .zip(inserted)
        .filter(|(_, inserted)| **inserted)
        .fold((0, 0), |(with, without), (e, _)| match e.category_id {
            Some(_) => (with + 1, without),
            None => (with, without + 1),
        })
}

fn expired(session_id: &str) -> Error {
    Error::NotFound(format!("import session {} (expired or unknown)", session_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::storage::{CategoryStore, ExpenseStore, UserStore};
    use std::time::Duration;

    const CSV: &str = "source,date,description,amount,currency
TestBank,01/01/2024,Restaurant bill,-1234.56,USD
TestBank,02/01/2024,Uber ride,-50.00,USD
TestBank,03/01/2024,Salary,5000.00,USD
TestBank,not-a-date,Broken,-1.00,USD
";

    fn service() -> (ImportService<Database>, i64) {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("alice", "hash").unwrap();
        db.create_category(user.id, "Food", "restaurant|food").unwrap();
        db.create_category(user.id, "Transport", "uber|taxi").unwrap();
        (
            ImportService::new(
                Arc::new(db),
                Arc::new(MatcherCache::new()),
                Arc::new(ImportSessionStore::default()),
            ),
            user.id,
        )
    }

    #[tokio::test]
    async fn test_two_step_import() {
        let (service, user) = service();

        let preview = service.begin("statement.csv", CSV.as_bytes()).await.unwrap();
        assert_eq!(preview.headers.len(), 5);
        assert_eq!(preview.total_rows, 4);
        assert_eq!(preview.rows.len(), 4);
        assert_eq!(preview.format, FileFormat::Csv);

        let mapping = FieldMapping::new("TestBank", 1, 2, 3, 4);
        let mapped = service
            .map(user, &preview.session_id, mapping)
            .await
            .unwrap();
        assert_eq!(mapped.expenses.len(), 3);
        assert_eq!(mapped.row_errors.len(), 1);
        assert_eq!(mapped.expenses[0].category.as_deref(), Some("Food"));

        // Reuses the stored mapping
        let info = service.commit(user, &preview.session_id, None).await.unwrap();
        assert_eq!(info.total_imports, 3);
        assert_eq!(info.with_category, 2);
        assert_eq!(info.without_category, 1);
        assert_eq!(info.row_errors[0].row_index, 3);
        assert!(info.error.is_none());

        // The session is closed
        assert!(service
            .commit(user, &preview.session_id, None)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_commit_requires_mapping() {
        let (service, user) = service();
        let preview = service.begin("statement.csv", CSV.as_bytes()).await.unwrap();

        let err = service
            .commit(user, &preview.session_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_invalid_mapping_is_rejected() {
        let (service, user) = service();
        let preview = service.begin("statement.csv", CSV.as_bytes()).await.unwrap();

        let err = service
            .map(user, &preview.session_id, FieldMapping::new("Bank", 1, 2, 3, 9))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(service
            .sessions()
            .get(&preview.session_id)
            .await
            .unwrap()
            .mapping
            .is_none());
    }

    #[tokio::test]
    async fn test_expired_session() {
        let db = Database::in_memory().unwrap();
        let service = ImportService::new(
            Arc::new(db),
            Arc::new(MatcherCache::new()),
            Arc::new(ImportSessionStore::new(Duration::ZERO)),
        );
        let preview = service.begin("statement.csv", CSV.as_bytes()).await.unwrap();

        let err = service
            .commit(1, &preview.session_id, Some(FieldMapping::new("Bank", 1, 2, 3, 4)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_single_shot_reimport_is_idempotent() {
        let (service, user) = service();

        let first = service
            .import_file(user, "statement.csv", CSV.as_bytes(), None)
            .await
            .unwrap();
        assert_eq!(first.total_imports, 3);

        let second = service
            .import_file(user, "statement.csv", CSV.as_bytes(), None)
            .await
            .unwrap();
        assert_eq!(second.total_imports, 0);
        assert_eq!(second.with_category, 0);
    }

    #[tokio::test]
    async fn test_single_shot_json_uses_cents() {
        let (service, user) = service();
        let json = r#"[
            {"source": "Card", "date": "2024-01-05T10:00:00Z", "description": "Taxi", "amount": -1250, "currency": "EUR"},
            {"date": "2024-01-06", "description": "Refund", "amount": 300, "currency": "EUR"}
        ]"#;

        let info = service
            .import_file(user, "card.json", json.as_bytes(), None)
            .await
            .unwrap();
        assert_eq!(info.total_imports, 2);
        assert_eq!(info.with_category, 1);

        let rows = service.storage.get_all_expenses(user).unwrap();
        let taxi = rows.iter().find(|e| e.description == "taxi").unwrap();
        assert_eq!(taxi.amount, -1250);
        assert_eq!(taxi.source, "Card");
        let refund = rows.iter().find(|e| e.description == "refund").unwrap();
        assert_eq!(refund.amount, 300);
        // First object's keys define the columns, so the second row has an empty source
        assert_eq!(refund.source, "card");
    }

    #[tokio::test]
    async fn test_upload_limit_and_format() {
        let (service, user) = service();
        let service = service.with_max_upload_bytes(16);

        assert!(matches!(
            service.begin("statement.csv", CSV.as_bytes()).await,
            Err(Error::FileTooLarge { limit: 16 })
        ));
        assert!(matches!(
            service.import_file(user, "statement.xlsx", CSV.as_bytes(), None).await,
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            service.begin("empty.csv", "".as_bytes()).await,
            Err(Error::EmptyFile) | Err(Error::NoDataRows)
        ));
    }

    #[tokio::test]
    async fn test_reimport_counts_only_new_rows() {
        let (service, user) = service();
        let mapping = FieldMapping::new("TestBank", 1, 2, 3, 4);

        let preview = service.begin("statement.csv", CSV.as_bytes()).await.unwrap();
        service
            .commit(user, &preview.session_id, Some(mapping.clone()))
            .await
            .unwrap();

        let grown = format!("{}TestBank,04/01/2024,Bookshop,-20.00,USD\n", CSV);
        let preview = service.begin("statement.csv", grown.as_bytes()).await.unwrap();
        let info = service
            .commit(user, &preview.session_id, Some(mapping))
            .await
            .unwrap();

        assert_eq!(info.total_imports, 1);
        assert_eq!(info.with_category, 0);
        assert_eq!(info.without_category, 1);
    }

    #[test]
    fn test_count_inserted_skips_duplicates() {
        let date = chrono::Utc::now();
        let expenses = vec![
            NewExpense::new("Bank", date, "a", -1, "USD").with_category(Some(1)),
            NewExpense::new("Bank", date, "b", -2, "USD").with_category(Some(1)),
            NewExpense::new("Bank", date, "c", -3, "USD"),
            NewExpense::new("Bank", date, "d", -4, "USD"),
        ];

        assert_eq!(count_inserted(&expenses, &[true, false, false, true]), (1, 1));
        assert_eq!(count_inserted(&expenses, &[false; 4]), (0, 0));
    }

    #[test]
    fn test_failed_info() {
        let info = ImportInfo::from_result(Err(Error::NoRecords));
        assert_eq!(info.total_imports, 0);
        assert_eq!(info.error.as_deref(), Some("JSON file contains no records"));
    }
}
