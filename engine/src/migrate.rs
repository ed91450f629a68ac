//! Migration of stored values to the latest schema.
//!
//! This is the core of schema evolution. Given a schema history and a raw
//! value that failed direct validation, it finds the schema the value was
//! written with and lifts it to the latest schema in a single step.
//!
//! # Algorithm
//!
//! 1. Walk the history from the latest version down
//! 2. The first version whose validator accepts the value is the source
//! 3. Apply the source's upgrade (a missing upgrade is an error, even for the
//!    latest version)
//! 4. Validate the result against the latest version's validator
//!
//! Migration is a pure function of its inputs: no IO, no mutation.

use crate::version::Version;
use crate::{error::Result, Error, SchemaHistory};
use serde::Serialize;
use serde_json::Value;

/// A value lifted from an older schema version to the latest one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    /// Version whose validator accepted the raw value
    pub from: Version,
    /// Latest version of the history
    pub to: Version,
    /// Upgraded value, as parsed by the latest validator
    pub value: Value,
}

/// Resolve and apply the upgrade path for `raw`.
pub fn resolve(history: &SchemaHistory, raw: &Value) -> Result<Migration> {
    let (source, entry) = history
        .entries_descending()
        .find(|(_, entry)| entry.validator().accepts(raw))
        .ok_or(Error::NoMatchingSchema)?;

    let candidate = entry
        .upgrade(raw)
        .ok_or_else(|| Error::NoUpgradeAvailable(source.to_string()))?;

    let target = history.latest_version();
    let value = history
        .latest()
        .validator()
        .safe_parse(&candidate)
        .map_err(|err| Error::UpgradeRejected {
            from: source.to_string(),
            to: target.to_string(),
            reason: err.to_string(),
        })?;

    Ok(Migration {
        from: source.clone(),
        to: target.clone(),
        value,
    })
}

/// Lift `raw` to the latest schema of `history`.
///
/// Meant to be called after direct validation against the latest schema has
/// failed; a value that matches the latest version without an upgrade is
/// reported as [`Error::NoUpgradeAvailable`], never passed through.
pub fn migrate(history: &SchemaHistory, raw: &Value) -> Result<Value> {
    resolve(history, raw).map(|migration| migration.value)
}
