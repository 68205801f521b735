//! In-memory import sessions
//!
//! Parsed upload data waits here between the preview step and the commit
//! step. Entries live for a fixed TTL; `get` hides expired entries and a
//! background sweeper removes them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use super::mapper::FieldMapping;
use super::parser::ParsedData;
use crate::ids::random_id;

/// How long an import session stays valid
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(10 * 60);

/// How often the sweeper runs
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ImportSession {
    pub id: String,
    pub filename: String,
    pub data: Arc<ParsedData>,
    pub mapping: Option<FieldMapping>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ImportSession {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[derive(Debug)]
pub struct ImportSessionStore {
    sessions: RwLock<HashMap<String, ImportSession>>,
    ttl: chrono::Duration,
}

impl Default for ImportSessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl ImportSessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            // Out-of-range TTLs are capped rather than overflowing later
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52)),
        }
    }

    /// Store parsed data under a fresh random identifier
    pub async fn create(&self, filename: &str, data: ParsedData) -> String {
        let id = random_id();
        let created_at = Utc::now();
        let expires_at = created_at + self.ttl;

        let session = ImportSession {
            id: id.clone(),
            filename: filename.to_string(),
            data: Arc::new(data),
            mapping: None,
            created_at,
            expires_at,
        };

        self.sessions.write().await.insert(id.clone(), session);
        debug!(session_id = %id, filename, "Created import session");
        id
    }

    /// Session by id; expired entries are treated as absent
    pub async fn get(&self, id: &str) -> Option<ImportSession> {
        let sessions = self.sessions.read().await;
        sessions.get(id).filter(|s| !s.is_expired()).cloned()
    }

    /// Attach a mapping to a live session; false when missing or expired
    pub async fn update_mapping(&self, id: &str, mapping: FieldMapping) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id).filter(|s| !s.is_expired()) {
            Some(session) => {
                session.mapping = Some(mapping);
                true
            }
            None => false,
        }
    }

    pub async fn delete(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        before - sessions.len()
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Start the background sweeper
    ///
    /// The task runs until the returned handle is aborted or the runtime
    /// shuts down.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        info!("Starting import session sweeper: every {:?}", period);
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(period);

            // Skip the first immediate tick
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = store.sweep().await;
                if removed > 0 {
                    debug!(removed, "Swept expired import sessions");
                }
            }
        })
    }
}
