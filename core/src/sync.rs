//! The sync reconciliation engine.
//!
//! Local slots are the source of truth; the cloud document store is an
//! eventually consistent mirror, touched only here. One document per
//! [`RecordType`] at `users/{userId}/data/{recordType}`; every write replaces
//! the whole document and stamps `updatedAt`.
//!
//! Error contract (who sees failures):
//! - bulk upload and single-record push propagate transport errors so the
//!   caller can surface a retry,
//! - bulk download and account erasure absorb them (logged, never thrown),
//! - the recipe/template step inside upload is best-effort and only logged.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{DocPath, DocShape, PROFILE_SLOTS, RecordType, Slot};
use crate::models::{MealTemplate, Recipe};
use crate::remote::RemoteStore;
use crate::store::{CollectionStore, LocalStore};

/// Outcome of the sign-in reconciliation decision. Exactly one per sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInOutcome {
    /// No remote store configured; offline-only mode.
    Disabled,
    /// A cloud profile existed: cloud state overwrote local slots.
    Downloaded,
    /// No cloud profile but non-trivial local data: local state was migrated.
    Uploaded,
    /// Neither side had data; nothing to do.
    FreshAccount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Syncing,
    Success { at: String },
    Error { message: String },
}

/// Receives engine outcomes for display ("syncing…", "last synced 3m ago").
pub trait SyncObserver: Send + Sync {
    fn status_changed(&self, status: &SyncStatus);
}

/// Default observer: outcomes go to the log and nowhere else.
pub struct LogObserver;

impl SyncObserver for LogObserver {
    fn status_changed(&self, status: &SyncStatus) {
        match status {
            SyncStatus::Syncing => debug!("sync started"),
            SyncStatus::Success { at } => debug!(at = %at, "sync finished"),
            SyncStatus::Error { message } => warn!(message = %message, "sync failed"),
        }
    }
}

pub struct SyncEngine {
    remote: Option<Arc<dyn RemoteStore>>,
    local: Arc<dyn LocalStore>,
    collections: Arc<dyn CollectionStore>,
    observer: Arc<dyn SyncObserver>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        remote: Option<Arc<dyn RemoteStore>>,
        local: Arc<dyn LocalStore>,
        collections: Arc<dyn CollectionStore>,
    ) -> Self {
        Self {
            remote,
            local,
            collections,
            observer: Arc::new(LogObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Whether a remote store is configured at all. When false every
    /// operation is a silent no-op; that is a supported mode, not an error.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub(crate) fn notify(&self, status: &SyncStatus) {
        self.observer.status_changed(status);
    }

    // --- Sign-in reconciliation ---

    /// Decide upload vs. download for a fresh sign-in. The cloud `profile`
    /// document is the existence probe: if it is there, cloud wins and local
    /// slots are overwritten; if not, non-trivial local data is migrated up.
    /// Two devices racing on a brand-new account can both pass the probe and
    /// both upload; the second batch wins. Known, accepted gap.
    pub async fn sync_on_sign_in(&self, user_id: &str) -> Result<SignInOutcome> {
        let Some(remote) = &self.remote else {
            return Ok(SignInOutcome::Disabled);
        };

        let probe = DocPath::record(user_id, RecordType::Profile);
        let cloud_profile = remote
            .get_doc(&probe)
            .await
            .context("could not check for an existing cloud profile")?;

        if cloud_profile.is_some() {
            info!(user = user_id, "cloud profile found, downloading");
            self.download_cloud_to_local(user_id).await;
            return Ok(SignInOutcome::Downloaded);
        }

        if self.has_local_data() {
            info!(user = user_id, "no cloud profile, migrating local data");
            self.upload_local_to_cloud(user_id).await?;
            return Ok(SignInOutcome::Uploaded);
        }

        debug!(user = user_id, "fresh account, nothing to reconcile");
        Ok(SignInOutcome::FreshAccount)
    }

    fn has_local_data(&self) -> bool {
        if !self.local.get(Slot::UserProfile).is_null() {
            return true;
        }
        let log = self.local.get(Slot::TodayLog);
        let non_empty = |field: &str| {
            log.get(field)
                .and_then(Value::as_array)
                .is_some_and(|a| !a.is_empty())
        };
        non_empty("entries") || non_empty("exercise")
    }

    // --- Bulk upload ---

    /// Push every flat record type in one atomic batch. On success the
    /// last-synced timestamp is stamped and observers notified before the
    /// best-effort recipe/template step runs, so a late failure there cannot
    /// take the success back. Batch failure propagates for manual retry.
    pub async fn upload_local_to_cloud(&self, user_id: &str) -> Result<()> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };
        self.notify(&SyncStatus::Syncing);

        let writes: Vec<(DocPath, Value)> = RecordType::BATCHED
            .iter()
            .map(|&ty| (DocPath::record(user_id, ty), self.build_flat_document(ty)))
            .collect();

        if let Err(e) = remote.commit_batch(writes).await {
            self.notify(&SyncStatus::Error {
                message: format!("{e:#}"),
            });
            return Err(e).context("cloud upload failed");
        }

        let at = self.mark_synced();
        self.notify(&SyncStatus::Success { at });

        if let Err(e) = self.sync_recipes_to_cloud(user_id).await {
            warn!(error = %format!("{e:#}"), "recipe sync failed, will retry on next upload");
        }
        if let Err(e) = self.sync_templates_to_cloud(user_id).await {
            warn!(error = %format!("{e:#}"), "template sync failed, will retry on next upload");
        }
        Ok(())
    }

    /// Build the cloud document for one flat record type from local slots.
    /// Recipes/templates never come through here; their best-effort path
    /// reads the collections directly.
    fn build_flat_document(&self, ty: RecordType) -> Value {
        let doc = match ty {
            RecordType::Profile => self.profile_payload(),
            RecordType::FoodLog => {
                let log = self.local.get(Slot::TodayLog);
                let mut map = Map::new();
                if let Some(date) = log.get("date").and_then(Value::as_str) {
                    map.insert(date.to_string(), day_fields(&log));
                }
                Value::Object(map)
            }
            RecordType::History | RecordType::FoodHistory | RecordType::StreakData => {
                let slot = ty.slot().map_or(Value::Null, |s| self.local.get(s));
                if slot.is_object() {
                    slot
                } else {
                    Value::Object(Map::new())
                }
            }
            _ => {
                let slot = ty.slot().map_or(Value::Null, |s| self.local.get(s));
                let items = if slot.is_array() { slot } else { json!([]) };
                json!({ "items": items })
            }
        };
        stamp(doc)
    }

    /// The composite cloud `profile` document body (without `updatedAt`):
    /// five slots merged plus the onboarding flag.
    #[must_use]
    pub fn profile_payload(&self) -> Value {
        let mut doc = Map::new();
        for slot in PROFILE_SLOTS {
            let value = self.local.get(slot);
            if !value.is_null() {
                doc.insert(slot.key().to_string(), value);
            }
        }
        let onboarded = self
            .local
            .get(Slot::OnboardingComplete)
            .as_bool()
            .unwrap_or(false);
        doc.insert("onboardingComplete".to_string(), Value::Bool(onboarded));
        Value::Object(doc)
    }

    // --- Bulk download ---

    /// Pull every record type and overwrite local state. Absorbs all
    /// failures: this runs inside the sign-in flow, where an incomplete sync
    /// beats a failed sign-in. The first fetch error aborts the rest.
    pub async fn download_cloud_to_local(&self, user_id: &str) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        self.notify(&SyncStatus::Syncing);
        match self.download_inner(&remote, user_id).await {
            Ok(()) => {
                let at = self.mark_synced();
                self.notify(&SyncStatus::Success { at });
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "cloud download failed");
                self.notify(&SyncStatus::Error {
                    message: format!("{e:#}"),
                });
            }
        }
    }

    async fn download_inner(&self, remote: &Arc<dyn RemoteStore>, user_id: &str) -> Result<()> {
        for &ty in &RecordType::BATCHED {
            let path = DocPath::record(user_id, ty);
            let doc = remote
                .get_doc(&path)
                .await
                .with_context(|| format!("could not fetch {ty}"))?;
            if let Some(doc) = doc {
                self.apply_document(ty, doc);
            }
        }
        self.load_recipes_from_cloud(user_id).await?;
        self.load_templates_from_cloud(user_id).await?;
        Ok(())
    }

    fn apply_document(&self, ty: RecordType, doc: Value) {
        match ty {
            RecordType::Profile => {
                for slot in PROFILE_SLOTS {
                    if let Some(value) = doc.get(slot.key()) {
                        if !value.is_null() {
                            self.local.set(slot, value);
                        }
                    }
                }
                // Onboarding can only ever be marked complete, never undone.
                if doc.get("onboardingComplete").and_then(Value::as_bool) == Some(true) {
                    self.local.set(Slot::OnboardingComplete, &Value::Bool(true));
                }
            }
            RecordType::FoodLog => {
                let today = today_string();
                if let Some(day) = doc.get(&today) {
                    let mut log = day_fields(day);
                    if let Some(obj) = log.as_object_mut() {
                        obj.insert("date".to_string(), Value::String(today));
                    }
                    self.local.set(Slot::TodayLog, &log);
                }
            }
            RecordType::History | RecordType::FoodHistory | RecordType::StreakData => {
                let mut doc = doc;
                if let Some(obj) = doc.as_object_mut() {
                    obj.remove("updatedAt");
                }
                if let Some(slot) = ty.slot() {
                    self.local.set(slot, &doc);
                }
            }
            _ => {
                let items = doc.get("items").cloned().unwrap_or_else(|| json!([]));
                if let Some(slot) = ty.slot() {
                    self.local.set(slot, &items);
                }
            }
        }
    }

    // --- Single-record push ---

    /// Write one record type's document, shaped per the catalog. The
    /// date-keyed food log is read-modify-write so other days survive.
    /// Tags outside the catalog are ignored: new local state that has not
    /// been wired into the sync map must not break the app. Transport
    /// failure propagates so the caller can show an error status.
    pub async fn sync_to_cloud(&self, user_id: &str, tag: &str, payload: Value) -> Result<()> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };
        let Some(ty) = RecordType::from_tag(tag) else {
            debug!(tag, "record type not in the sync catalog, skipping");
            return Ok(());
        };

        let path = DocPath::record(user_id, ty);
        let doc = match ty.shape() {
            DocShape::DateKeyed => {
                let existing = remote
                    .get_doc(&path)
                    .await
                    .with_context(|| format!("could not fetch {ty} for merge"))?;
                let mut map = match existing {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                let date = payload
                    .get("date")
                    .and_then(Value::as_str)
                    .map_or_else(today_string, str::to_string);
                map.insert(date, day_fields(&payload));
                stamp(Value::Object(map))
            }
            DocShape::List => {
                let items = if payload.is_array() { payload } else { json!([]) };
                stamp(json!({ "items": items }))
            }
            DocShape::Scalar => {
                let base = if payload.is_object() { payload } else { json!({}) };
                stamp(base)
            }
        };

        remote
            .set_doc(&path, doc)
            .await
            .with_context(|| format!("could not sync {ty} to cloud"))
    }

    // --- Account erasure ---

    /// Delete every record type's document. Attempts are independent and all
    /// of them run regardless of earlier failures; nothing is reported per
    /// document. Pairs with the auth provider's own account deletion.
    pub async fn delete_user_cloud_data(&self, user_id: &str) {
        let Some(remote) = &self.remote else {
            return;
        };
        let mut failures = 0usize;
        for &ty in &RecordType::ALL {
            if let Err(e) = remote.delete_doc(&DocPath::record(user_id, ty)).await {
                failures += 1;
                warn!(record = ty.tag(), error = %format!("{e:#}"), "cloud delete failed");
            }
        }
        if failures == 0 {
            info!(user = user_id, "cloud data deleted");
        } else {
            warn!(user = user_id, failures, "cloud data deletion incomplete");
        }
    }

    // --- Recipe / template collections (best-effort path) ---

    pub async fn sync_recipes_to_cloud(&self, user_id: &str) -> Result<()> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };
        let recipes = self.collections.list_recipes().await?;
        let doc = stamp(json!({ "items": recipes }));
        remote
            .set_doc(&DocPath::record(user_id, RecordType::Recipes), doc)
            .await
    }

    pub async fn sync_templates_to_cloud(&self, user_id: &str) -> Result<()> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };
        let templates = self.collections.list_templates().await?;
        let doc = stamp(json!({ "items": templates }));
        remote
            .set_doc(&DocPath::record(user_id, RecordType::Templates), doc)
            .await
    }

    /// Merge cloud recipes into the local collection: upsert by id, never a
    /// wholesale replace, so recipes created before sign-in survive.
    pub async fn load_recipes_from_cloud(&self, user_id: &str) -> Result<()> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };
        let path = DocPath::record(user_id, RecordType::Recipes);
        let Some(doc) = remote.get_doc(&path).await? else {
            return Ok(());
        };
        let Some(items) = doc.get("items").and_then(Value::as_array) else {
            return Ok(());
        };
        for item in items {
            let item = with_id(item.clone());
            match serde_json::from_value::<Recipe>(item) {
                Ok(recipe) => self.collections.upsert_recipe(&recipe).await?,
                Err(e) => warn!(error = %e, "skipping malformed cloud recipe"),
            }
        }
        Ok(())
    }

    pub async fn load_templates_from_cloud(&self, user_id: &str) -> Result<()> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };
        let path = DocPath::record(user_id, RecordType::Templates);
        let Some(doc) = remote.get_doc(&path).await? else {
            return Ok(());
        };
        let Some(items) = doc.get("items").and_then(Value::as_array) else {
            return Ok(());
        };
        for item in items {
            let item = with_id(item.clone());
            match serde_json::from_value::<MealTemplate>(item) {
                Ok(template) => self.collections.upsert_template(&template).await?,
                Err(e) => warn!(error = %e, "skipping malformed cloud template"),
            }
        }
        Ok(())
    }

    fn mark_synced(&self) -> String {
        let at = Utc::now().to_rfc3339();
        self.local.set(Slot::LastSyncedAt, &Value::String(at.clone()));
        at
    }
}

fn today_string() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// The `{ entries, exercise, water }` triple for one day, with defaults for
/// whatever the source value is missing.
fn day_fields(day: &Value) -> Value {
    json!({
        "entries": day.get("entries").cloned().unwrap_or_else(|| json!([])),
        "exercise": day.get("exercise").cloned().unwrap_or_else(|| json!([])),
        "water": day.get("water").cloned().unwrap_or_else(|| json!(0)),
    })
}

/// Stamp `updatedAt` with the write's wall-clock time.
fn stamp(mut doc: Value) -> Value {
    if let Some(obj) = doc.as_object_mut() {
        obj.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }
    doc
}

/// Items arriving from the cloud without an id get one; upsert needs a key.
fn with_id(mut item: Value) -> Value {
    if let Some(obj) = item.as_object_mut() {
        let missing = obj
            .get("id")
            .and_then(Value::as_str)
            .is_none_or(str::is_empty);
        if missing {
            obj.insert(
                "id".to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
    }
    item
}
