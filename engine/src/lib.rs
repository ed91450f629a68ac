//! # Stow Engine
//!
//! Schema history and migration resolver for persisted values.
//!
//! A value kept in durable storage outlives the code that wrote it. This crate
//! records every shape the value has had, keyed by semantic version, and lifts
//! an old stored value to the latest shape in a single upgrade step.
//!
//! ## Design Principles
//!
//! - **No IO**: The engine never touches storage; the `stow` crate does
//! - **Deterministic**: Same history and input always produce the same output
//! - **Capability based**: Validation goes through the [`Validator`] trait, so
//!   any schema library can be plugged in
//!
//! ## Core Concepts
//!
//! ### Versions
//!
//! [`Version`] is a strict semantic version. Its ordering follows semver
//! precedence and is the only ordering the engine uses; insertion order of a
//! history never matters. [`compare`] and [`latest_of`] work on strings and
//! sets of versions.
//!
//! ### Schema History
//!
//! A [`SchemaHistory`] maps versions to [`SchemaHistoryEntry`] values: a
//! validator plus an optional upgrade. The greatest version is the latest
//! schema. Upgrades always target the latest schema, never an intermediate one.
//!
//! ### Migration
//!
//! [`migrate`] finds the newest version whose validator accepts a raw value,
//! applies that version's upgrade and validates the result against the latest
//! schema. See [`migrate::resolve`] for the source/target details.
//!
//! ## Quick Start
//!
//! ```rust
//! use stow_engine::{
//!     migrate, FieldDef, FieldType, ObjectSchema, SchemaHistory, SchemaHistoryEntry,
//! };
//! use serde_json::json;
//!
//! // 1. Describe every version of the stored value
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
//!     .build()
//!     .unwrap();
//!
//! // 2. Lift a value written by 0.0.1
//! let upgraded = migrate(&history, &json!({"foo": "bar"})).unwrap();
//! assert_eq!(upgraded, json!({"foo": 0}));
//! ```

pub mod error;
pub mod history;
pub mod migrate;
pub mod schema;
pub mod version;

// Re-export main types at crate root
pub use error::Error;
pub use history::{SchemaHistory, SchemaHistoryBuilder, SchemaHistoryEntry, Upgrade};
pub use migrate::{migrate, resolve, Migration};
pub use schema::{FieldDef, FieldType, FnValidator, ObjectSchema, Validator};
pub use version::{compare, latest_of, latest_of_str, Version};
