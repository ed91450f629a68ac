//! Store - a persisted, schema-versioned reactive value.
//!
//! A [`Store`] owns one in-memory value, mirrors it to a single storage entry
//! and keeps both valid against the active schema of its history.
//!
//! # Lifecycle
//!
//! `Uninitialized -> Loading -> Ready`. Building a store inside a tokio runtime
//! starts the first load in the background. The first completed load takes
//! exactly one path:
//!
//! 1. **Direct hit**: the stored value passes the active schema and is adopted
//! 2. **Empty storage**: the default is persisted and adopted
//! 3. **Migration**: the stored value is lifted with [`stow_engine::resolve`],
//!    persisted and adopted; if that fails, path 2 is taken instead
//!
//! Later loads return the current value without touching storage.
//!
//! # Writes
//!
//! `set`, `update`, `reset` and the persisting part of `load` wait their turn
//! in a per-store FIFO queue. A new value becomes visible (and subscribers are
//! notified) only after its storage write has resolved, and overlapping calls
//! finish in call order.

use crate::config::StoreConfig;
use crate::diagnostics::{Diagnostics, StoreEvent, TracingDiagnostics};
use crate::error::{Result, StorageError, StoreError};
use crate::storage::Storage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use stow_engine::{resolve, Error, SchemaHistory, Validator, Version};
use tokio::sync::{watch, Mutex};

/// Values a store can hold.
pub trait Persisted: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Persisted for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Build the storage key for `key` at `version`: `{prefix}-{version}-{key}`.
pub fn storage_key(prefix: &str, version: &Version, key: &str) -> String {
    format!("{}-{}-{}", prefix, version, key)
}

/// Where a store is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Uninitialized,
    Loading,
    Ready,
}

const UNINITIALIZED: u8 = 0;
const LOADING: u8 = 1;
const READY: u8 = 2;

struct Inner<T> {
    key: String,
    active_version: Version,
    storage_key: String,
    /// Keys older history versions would have used, newest first
    legacy_keys: Vec<String>,
    legacy_lookup: bool,
    history: SchemaHistory,
    default: T,
    default_raw: Value,
    storage: Arc<dyn Storage>,
    diagnostics: Arc<dyn Diagnostics>,
    value: watch::Sender<T>,
    status: AtomicU8,
    writes: Mutex<()>,
}

/// A persisted value, validated against an evolving schema.
///
/// Cloning a store yields another handle to the same instance.
pub struct Store<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("storage_key", &self.inner.storage_key)
            .field("status", &self.inner.status.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<T: Persisted> Store<T> {
    /// Start building a store for `key` over `history`.
    pub fn builder(key: impl Into<String>, history: SchemaHistory) -> StoreBuilder<T> {
        StoreBuilder::new(key, history)
    }

    /// The caller-supplied key.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The key the value is stored under.
    pub fn storage_key(&self) -> &str {
        &self.inner.storage_key
    }

    /// Version embedded in the storage key.
    pub fn active_version(&self) -> &Version {
        &self.inner.active_version
    }

    pub fn history(&self) -> &SchemaHistory {
        &self.inner.history
    }

    /// The last adopted value. Before the first load resolves this is the
    /// default.
    pub fn value(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Watch the value. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.inner.value.subscribe()
    }

    pub fn status(&self) -> StoreStatus {
        match self.inner.status.load(Ordering::Acquire) {
            READY => StoreStatus::Ready,
            LOADING => StoreStatus::Loading,
            _ => StoreStatus::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == StoreStatus::Ready
    }

    /// Load the stored value, migrating or falling back to the default as
    /// needed. Returns immediately once the store is ready.
    pub async fn load(&self) -> Result<T> {
        if self.is_ready() {
            return Ok(self.value());
        }

        let _turn = self.inner.writes.lock().await;
        // Another load may have completed while this one waited
        if self.is_ready() {
            return Ok(self.value());
        }

        self.inner.status.store(LOADING, Ordering::Release);
        match self.load_stored().await {
            Ok(value) => {
                self.inner.status.store(READY, Ordering::Release);
                tracing::debug!(key = %self.inner.storage_key, "store ready");
                Ok(value)
            }
            Err(err) => {
                self.inner.status.store(UNINITIALIZED, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Validate `value`, persist it and adopt it.
    ///
    /// A rejected value is reported and returned as
    /// [`StoreError::Validation`]; nothing is written or notified.
    pub async fn set(&self, value: T) -> Result<()> {
        let (raw, value) = self.check(&value, false).map_err(|err| self.rejected(err))?;

        let _turn = self.inner.writes.lock().await;
        self.write(&self.inner.storage_key, raw).await?;
        self.adopt(value);
        Ok(())
    }

    /// Compute a new value from the current one, then persist and adopt it
    /// like [`Store::set`].
    ///
    /// The updater runs when this call's turn in the write queue comes, so it
    /// sees every earlier write.
    pub async fn update<F>(&self, updater: F) -> Result<T>
    where
        F: FnOnce(&T) -> T,
    {
        let _turn = self.inner.writes.lock().await;
        let current = self.value();
        let (raw, next) = self
            .check(&updater(&current), true)
            .map_err(|err| self.rejected(err))?;

        self.write(&self.inner.storage_key, raw).await?;
        self.adopt(next.clone());
        Ok(next)
    }

    /// Remove the stored entry (and any legacy entries), then persist and
    /// adopt the default.
    pub async fn reset(&self) -> Result<T> {
        let _turn = self.inner.writes.lock().await;
        for legacy_key in &self.inner.legacy_keys {
            self.delete(legacy_key).await?;
        }
        self.delete(&self.inner.storage_key).await?;

        let value = self.adopt_default().await?;
        self.inner.status.store(READY, Ordering::Release);
        Ok(value)
    }

    /// Wait until every write queued so far has resolved.
    pub async fn settled(&self) {
        let _turn = self.inner.writes.lock().await;
    }

    async fn load_stored(&self) -> Result<T> {
        if let Some(raw) = self.read(&self.inner.storage_key).await? {
            return self.adopt_stored(raw, None).await;
        }

        if self.inner.legacy_lookup {
            for legacy_key in &self.inner.legacy_keys {
                if let Some(raw) = self.read(legacy_key).await? {
                    tracing::info!(
                        key = %self.inner.storage_key,
                        legacy_key = %legacy_key,
                        "found value under legacy key"
                    );
                    return self.adopt_stored(raw, Some(legacy_key.as_str())).await;
                }
            }
        }

        tracing::debug!(key = %self.inner.storage_key, "nothing stored, persisting default");
        self.adopt_default().await
    }

    async fn adopt_stored(&self, raw: Value, legacy_key: Option<&str>) -> Result<T> {
        let key = &self.inner.storage_key;

        if let Ok((parsed, value)) = self.check_raw(&raw, false) {
            if let Some(legacy_key) = legacy_key {
                self.write(key, parsed).await?;
                self.retire(legacy_key).await;
            }
            self.adopt(value.clone());
            return Ok(value);
        }

        let migration = match resolve(&self.inner.history, &raw) {
            Ok(migration) => migration,
            Err(err) => return self.fall_back(err, legacy_key).await,
        };
        let value: T = match serde_json::from_value(migration.value.clone()) {
            Ok(value) => value,
            Err(err) => {
                let err = Error::InvalidPayload(err.to_string());
                return self.fall_back(err, legacy_key).await;
            }
        };

        self.write(key, migration.value).await?;
        if let Some(legacy_key) = legacy_key {
            self.retire(legacy_key).await;
        }
        tracing::info!(
            key = %key,
            from = %migration.from,
            to = %migration.to,
            "migrated stored value"
        );
        self.adopt(value.clone());
        Ok(value)
    }

    async fn fall_back(&self, error: Error, legacy_key: Option<&str>) -> Result<T> {
        let key = self.inner.storage_key.clone();
        self.inner.diagnostics.warn(&StoreEvent::MigrationFailed {
            key: key.clone(),
            error,
        });
        self.inner
            .diagnostics
            .warn(&StoreEvent::FellBackToDefault { key });

        let value = self.adopt_default().await?;
        if let Some(legacy_key) = legacy_key {
            self.retire(legacy_key).await;
        }
        Ok(value)
    }

    async fn adopt_default(&self) -> Result<T> {
        self.write(&self.inner.storage_key, self.inner.default_raw.clone())
            .await?;
        let value = self.inner.default.clone();
        self.adopt(value.clone());
        Ok(value)
    }

    /// Drop a legacy entry once its value lives under the active key.
    async fn retire(&self, legacy_key: &str) {
        // Failures are already reported; the active entry holds the value.
        if self.delete(legacy_key).await.is_ok() {
            tracing::debug!(legacy_key = %legacy_key, "removed legacy entry");
        }
    }

    fn adopt(&self, value: T) {
        self.inner.value.send_replace(value);
    }

    /// Validate a typed value, returning what to persist and what to adopt.
    fn check(&self, value: &T, strict: bool) -> std::result::Result<(Value, T), Error> {
        let raw =
            serde_json::to_value(value).map_err(|err| Error::InvalidPayload(err.to_string()))?;
        self.check_raw(&raw, strict)
    }

    fn check_raw(&self, raw: &Value, strict: bool) -> std::result::Result<(Value, T), Error> {
        let schema = self.inner.history.latest().validator();
        let parsed = if strict {
            schema.parse(raw)?
        } else {
            schema.safe_parse(raw)?
        };
        let value = serde_json::from_value(parsed.clone())
            .map_err(|err| Error::InvalidPayload(err.to_string()))?;
        Ok((parsed, value))
    }

    fn rejected(&self, error: Error) -> StoreError {
        self.inner.diagnostics.warn(&StoreEvent::ValidationRejected {
            key: self.inner.storage_key.clone(),
            error: error.clone(),
        });
        StoreError::Validation(error)
    }

    fn storage_failed(&self, key: &str, err: StorageError) -> StoreError {
        self.inner.diagnostics.error(&StoreEvent::StorageFailed {
            key: key.to_string(),
            message: err.to_string(),
        });
        StoreError::Storage(err)
    }

    async fn read(&self, key: &str) -> Result<Option<Value>> {
        self.inner
            .storage
            .get(key)
            .await
            .map_err(|err| self.storage_failed(key, err))
    }

    async fn write(&self, key: &str, raw: Value) -> Result<()> {
        self.inner
            .storage
            .set(key, raw)
            .await
            .map_err(|err| self.storage_failed(key, err))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner
            .storage
            .remove(key)
            .await
            .map_err(|err| self.storage_failed(key, err))
    }
}

/// Builder for [`Store`].
pub struct StoreBuilder<T> {
    key: String,
    history: SchemaHistory,
    default: Option<T>,
    active_version: Option<String>,
    config: StoreConfig,
    prefix: Option<String>,
    storage: Option<Arc<dyn Storage>>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
}

impl<T: Persisted> StoreBuilder<T> {
    fn new(key: impl Into<String>, history: SchemaHistory) -> Self {
        Self {
            key: key.into(),
            history,
            default: None,
            active_version: None,
            config: StoreConfig::default(),
            prefix: None,
            storage: None,
            diagnostics: None,
        }
    }

    /// Value adopted when nothing usable is stored. Defaults to the active
    /// schema's default value.
    pub fn default_value(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    /// Version written into the storage key. Defaults to the latest version
    /// of the history; validation and migration always use the latest schema.
    pub fn active_version(mut self, version: impl Into<String>) -> Self {
        self.active_version = Some(version.into());
        self
    }

    /// Take prefix, storage backend and legacy lookup from `config`.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Build the store and, inside a tokio runtime, start its first load.
    ///
    /// Fails if the active version is not a valid version, or if the default
    /// value is missing or rejected by the latest schema.
    pub fn build(self) -> Result<Store<T>> {
        let StoreBuilder {
            key,
            history,
            default,
            active_version,
            config,
            prefix,
            storage,
            diagnostics,
        } = self;

        let active_version = match active_version {
            Some(version) => Version::parse(&version)?,
            None => history.latest_version().clone(),
        };

        let schema = history.latest().validator();
        let default_raw = match default {
            Some(value) => serde_json::to_value(&value)?,
            None => schema.default_value().ok_or(Error::NoDefault)?,
        };
        let default_raw = schema
            .safe_parse(&default_raw)
            .map_err(StoreError::Validation)?;
        let default: T = serde_json::from_value(default_raw.clone())?;

        let prefix = prefix.unwrap_or_else(|| config.prefix.clone());
        let active_key = storage_key(&prefix, &active_version, &key);
        let legacy_keys = history
            .versions_descending()
            .filter(|version| **version < active_version)
            .map(|version| storage_key(&prefix, version, &key))
            .collect();

        let storage = storage.unwrap_or_else(|| config.storage());
        let diagnostics =
            diagnostics.unwrap_or_else(|| Arc::new(TracingDiagnostics) as Arc<dyn Diagnostics>);
        let (value, _) = watch::channel(default.clone());

        let store = Store {
            inner: Arc::new(Inner {
                key,
                active_version,
                storage_key: active_key,
                legacy_keys,
                legacy_lookup: config.legacy_lookup,
                history,
                default,
                default_raw,
                storage,
                diagnostics,
                value,
                status: AtomicU8::new(UNINITIALIZED),
                writes: Mutex::new(()),
            }),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                store.inner.status.store(LOADING, Ordering::Release);
                let background = store.clone();
                handle.spawn(async move {
                    if let Err(err) = background.load().await {
                        tracing::warn!(
                            key = %background.storage_key(),
                            error = %err,
                            "initial load failed"
                        );
                    }
                });
            }
            Err(_) => {
                tracing::debug!(
                    key = %store.inner.storage_key,
                    "no runtime, initial load deferred"
                );
            }
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{RecordingDiagnostics, Severity};
    use crate::storage::MemoryStorage;
    use serde::Deserialize;
    use serde_json::json;
    use stow_engine::{FieldDef, FieldType, ObjectSchema, SchemaHistoryEntry};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: i64,
    }

    fn counter_history() -> SchemaHistory {
        SchemaHistory::builder()
            .version(
                "1.0.0",
                SchemaHistoryEntry::new(ObjectSchema::new(vec![
                    FieldDef::required("count", FieldType::Int).with_default(0),
                ])),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn storage_key_format() {
        let version = Version::parse("0.0.2").unwrap();
        assert_eq!(storage_key("stow", &version, "prefs"), "stow-0.0.2-prefs");
    }

    #[test]
    fn build_outside_runtime_defers_load() {
        let store: Store<Counter> = Store::builder("counter", counter_history())
            .storage(Arc::new(MemoryStorage::new()))
            .build()
            .unwrap();

        assert_eq!(store.status(), StoreStatus::Uninitialized);
        assert_eq!(store.value(), Counter { count: 0 });
        assert_eq!(store.storage_key(), "stow-1.0.0-counter");
        assert_eq!(store.key(), "counter");
        assert_eq!(store.active_version().as_str(), "1.0.0");
    }

    #[test]
    fn build_rejects_invalid_default() {
        let result = Store::builder("counter", counter_history())
            .default_value(json!({"count": "many"}))
            .storage(Arc::new(MemoryStorage::new()))
            .build();
        assert!(matches!(
            result,
            Err(StoreError::Validation(Error::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn build_requires_a_default() {
        let history = SchemaHistory::builder()
            .version(
                "1.0.0",
                SchemaHistoryEntry::new(ObjectSchema::new(vec![FieldDef::required(
                    "count",
                    FieldType::Int,
                )])),
            )
            .build()
            .unwrap();

        let result = Store::<Counter>::builder("counter", history)
            .storage(Arc::new(MemoryStorage::new()))
            .build();
        assert!(matches!(result, Err(StoreError::Engine(Error::NoDefault))));
    }

    #[test]
    fn active_version_only_changes_the_key() {
        let store: Store<Counter> = Store::builder("counter", counter_history())
            .active_version("2.0.0")
            .storage(Arc::new(MemoryStorage::new()))
            .build()
            .unwrap();
        assert_eq!(store.storage_key(), "stow-2.0.0-counter");
        assert_eq!(store.active_version().as_str(), "2.0.0");
        assert_eq!(store.history().latest_version().as_str(), "1.0.0");
        assert_eq!(store.value(), Counter { count: 0 });
    }

    #[test]
    fn build_rejects_malformed_active_version() {
        let result = Store::<Counter>::builder("counter", counter_history())
            .active_version("latest")
            .storage(Arc::new(MemoryStorage::new()))
            .build();
        assert!(matches!(
            result,
            Err(StoreError::Engine(Error::InvalidVersion { .. }))
        ));
    }

    #[tokio::test]
    async fn typed_set_and_update() {
        let storage = MemoryStorage::new();
        let store: Store<Counter> = Store::builder("counter", counter_history())
            .storage(Arc::new(storage.clone()))
            .build()
            .unwrap();

        assert_eq!(store.load().await.unwrap(), Counter { count: 0 });
        store.set(Counter { count: 5 }).await.unwrap();
        let next = store
            .update(|c| Counter {
                count: c.count + 1,
            })
            .await
            .unwrap();

        assert_eq!(next, Counter { count: 6 });
        assert_eq!(store.value(), Counter { count: 6 });
        assert_eq!(storage.peek("stow-1.0.0-counter"), Some(json!({"count": 6})));
    }

    #[tokio::test]
    async fn implicit_load_runs_in_background() {
        let storage = MemoryStorage::new().with_entry("stow-1.0.0-counter", json!({"count": 9}));
        let store: Store<Counter> = Store::builder("counter", counter_history())
            .storage(Arc::new(storage))
            .build()
            .unwrap();

        assert_eq!(store.status(), StoreStatus::Loading);
        let mut rx = store.subscribe();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Counter { count: 9 });

        store.settled().await;
        assert!(store.is_ready());
    }

    #[tokio::test]
    async fn rejected_update_is_reported() {
        let recorder = Arc::new(RecordingDiagnostics::new());
        let store: Store<Value> = Store::builder("counter", counter_history())
            .storage(Arc::new(MemoryStorage::new()))
            .diagnostics(recorder.clone())
            .build()
            .unwrap();
        store.load().await.unwrap();

        let result = store.update(|_| json!({"count": "nope"})).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.value(), json!({"count": 0}));

        let warnings = recorder.with_severity(Severity::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            StoreEvent::ValidationRejected { key, .. } if key == "stow-1.0.0-counter"
        ));
    }
}
