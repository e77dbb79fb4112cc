//! Per-sign-in routing of local mutations to the sync engine.
//!
//! While a user is signed in the app holds one [`SyncSession`]; every local
//! record mutation goes through [`SyncSession::record_changed`]. On sign-out
//! the session is dropped, so local-only mutations never touch the network.
//! There is no shared mutable callback slot to clear.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;

use crate::sync::{SyncEngine, SyncStatus};

pub struct SyncSession {
    engine: Arc<SyncEngine>,
    user_id: String,
}

impl SyncSession {
    #[must_use]
    pub fn new(engine: Arc<SyncEngine>, user_id: impl Into<String>) -> Self {
        Self {
            engine,
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Push one changed record to the cloud, reporting status either way.
    /// The push itself throws on transport failure so callers can offer a
    /// retry; the status observer has already been told by then.
    pub async fn record_changed(&self, tag: &str, payload: Value) -> Result<()> {
        self.engine.notify(&SyncStatus::Syncing);
        match self.engine.sync_to_cloud(&self.user_id, tag, payload).await {
            Ok(()) => {
                self.engine.notify(&SyncStatus::Success {
                    at: Utc::now().to_rfc3339(),
                });
                Ok(())
            }
            Err(e) => {
                self.engine.notify(&SyncStatus::Error {
                    message: format!("{e:#}"),
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DocPath, RecordType};
    use crate::remote::{MemoryRemoteStore, RemoteStore};
    use crate::store::SqliteStore;
    use crate::sync::SyncObserver;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<&'static str>>);

    impl SyncObserver for Recorder {
        fn status_changed(&self, status: &SyncStatus) {
            self.0.lock().unwrap().push(match status {
                SyncStatus::Syncing => "syncing",
                SyncStatus::Success { .. } => "success",
                SyncStatus::Error { .. } => "error",
            });
        }
    }

    #[tokio::test]
    async fn record_changed_pushes_and_reports_success() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let observer = Arc::new(Recorder(Mutex::new(Vec::new())));
        let engine = Arc::new(
            SyncEngine::new(Some(remote.clone()), store.clone(), store)
                .with_observer(observer.clone()),
        );
        let session = SyncSession::new(engine, "u1");

        session
            .record_changed("favorites", json!([{ "name": "Apple", "calories": 95.0 }]))
            .await
            .unwrap();

        assert_eq!(*observer.0.lock().unwrap(), vec!["syncing", "success"]);
        let doc = remote
            .get_doc(&DocPath::record("u1", RecordType::Favorites))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["items"][0]["name"], "Apple");
    }

    #[tokio::test]
    async fn record_changed_without_remote_is_quiet() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = Arc::new(SyncEngine::new(None, store.clone(), store));
        let session = SyncSession::new(engine, "u1");
        // Disabled engine: still succeeds, still no network
        session
            .record_changed("favorites", json!([]))
            .await
            .unwrap();
        assert_eq!(session.user_id(), "u1");
    }
}
