//! # Stow
//!
//! Persisted, schema-versioned reactive values.
//!
//! A [`Store`] keeps one value in memory, mirrors it to an asynchronous
//! key-value [`Storage`] and validates everything it adopts against the active
//! schema of a [`SchemaHistory`]. When the stored value was written by an
//! older version of the application, the store upgrades it through
//! [`stow_engine::migrate`] before anyone gets to see it.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use stow::{MemoryStorage, Store};
//! use stow_engine::{FieldDef, FieldType, ObjectSchema, SchemaHistory, SchemaHistoryEntry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> stow::Result<()> {
//! let history = SchemaHistory::builder()
//!     .version(
//!         "0.0.1",
//!         SchemaHistoryEntry::new(ObjectSchema::new(vec![
//!             FieldDef::required("foo", FieldType::String).with_default("bar"),
//!         ]))
//!         .with_upgrade(|_| json!({"foo": 0})),
//!     )
//!     .version(
//!         "0.0.2",
//!         SchemaHistoryEntry::new(ObjectSchema::new(vec![
//!             FieldDef::required("foo", FieldType::Float).with_default(0),
//!         ])),
//!     )
//!     .build()?;
//!
//! // Data written by an older release
//! let storage = MemoryStorage::new().with_entry("stow-0.0.2-prefs", json!({"foo": "bar"}));
//!
//! let store: Store<serde_json::Value> = Store::builder("prefs", history)
//!     .storage(Arc::new(storage.clone()))
//!     .build()?;
//!
//! assert_eq!(store.load().await?, json!({"foo": 0}));
//! assert_eq!(storage.peek("stow-0.0.2-prefs"), Some(json!({"foo": 0})));
//!
//! store.set(json!({"foo": 42})).await?;
//! assert!(store.set(json!({"foo": "nope"})).await.is_err());
//! assert_eq!(store.value(), json!({"foo": 42}));
//! # Ok(())
//! # }
//! ```
//!
//! ## Capabilities
//!
//! Everything a store talks to is injected:
//! - [`Storage`] - where values live ([`MemoryStorage`], [`FileStorage`])
//! - [`stow_engine::Validator`] - what a valid value looks like
//! - [`Diagnostics`] - where recoverable failures are reported
//!   ([`TracingDiagnostics`] by default)
//!
//! ## Configuration
//!
//! [`StoreConfig::from_env`] reads `STOW_PREFIX`, `STOW_DATA_DIR` and
//! `STOW_LEGACY_LOOKUP`; pass the result to [`StoreBuilder::config`].

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod storage;
pub mod store;

pub use config::{ConfigError, StoreConfig, DEFAULT_PREFIX};
pub use diagnostics::{Diagnostics, RecordingDiagnostics, Severity, StoreEvent, TracingDiagnostics};
pub use error::{Result, StorageError, StoreError};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{storage_key, Persisted, Store, StoreBuilder, StoreStatus};
