//! Schema history: every shape a persisted value has had, keyed by version.
//!
//! The greatest version is the *latest* entry; its validator is the one all
//! freshly written values are checked against. Older entries may carry an
//! upgrade that turns a value they accept into one the latest entry accepts.

use crate::version::{latest_of, Version};
use crate::{error::Result, Error, Validator};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Transforms a value accepted by one schema version into a value intended
/// for the latest version.
pub type Upgrade = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// One version of a schema history.
#[derive(Clone)]
pub struct SchemaHistoryEntry {
    validator: Arc<dyn Validator>,
    upgrade: Option<Upgrade>,
}

impl SchemaHistoryEntry {
    /// Create an entry with no upgrade step.
    pub fn new(validator: impl Validator + 'static) -> Self {
        Self::from_arc(Arc::new(validator))
    }

    /// Create an entry from a shared validator.
    pub fn from_arc(validator: Arc<dyn Validator>) -> Self {
        Self {
            validator,
            upgrade: None,
        }
    }

    /// Attach the upgrade that lifts values of this version to the latest one.
    pub fn with_upgrade<F>(mut self, upgrade: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.upgrade = Some(Arc::new(upgrade));
        self
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    pub fn has_upgrade(&self) -> bool {
        self.upgrade.is_some()
    }

    /// Run the upgrade on `value`, if this entry has one.
    pub fn upgrade(&self, value: &Value) -> Option<Value> {
        self.upgrade.as_ref().map(|upgrade| upgrade(value))
    }
}

impl fmt::Debug for SchemaHistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaHistoryEntry")
            .field("has_upgrade", &self.has_upgrade())
            .finish_non_exhaustive()
    }
}

/// Mapping from [`Version`] to [`SchemaHistoryEntry`].
///
/// Always non-empty, with unique versions. Immutable once built.
#[derive(Debug, Clone)]
pub struct SchemaHistory {
    latest_version: Version,
    latest: SchemaHistoryEntry,
    /// Entries below the latest version, ascending
    older: BTreeMap<Version, SchemaHistoryEntry>,
}

impl SchemaHistory {
    /// Start building a history.
    pub fn builder() -> SchemaHistoryBuilder {
        SchemaHistoryBuilder::default()
    }

    /// Build a history from `(version, entry)` pairs in any order.
    pub fn from_entries<K, I>(entries: I) -> Result<Self>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, SchemaHistoryEntry)>,
    {
        let mut map: BTreeMap<Version, SchemaHistoryEntry> = BTreeMap::new();
        for (key, entry) in entries {
            let version = Version::parse(key.as_ref())?;
            if let Some((existing, _)) = map.get_key_value(&version) {
                return Err(Error::DuplicateVersion {
                    first: existing.to_string(),
                    second: version.to_string(),
                });
            }
            map.insert(version, entry);
        }

        if map.is_empty() {
            return Err(Error::EmptyHistory);
        }
        let latest_version = latest_of(map.keys());
        let latest = map.remove(&latest_version).ok_or(Error::EmptyHistory)?;

        Ok(Self {
            latest_version,
            latest,
            older: map,
        })
    }

    /// The greatest version in the history.
    pub fn latest_version(&self) -> &Version {
        &self.latest_version
    }

    /// The entry of the greatest version.
    pub fn latest(&self) -> &SchemaHistoryEntry {
        &self.latest
    }

    /// Look up the entry for `version`.
    pub fn get(&self, version: &Version) -> Option<&SchemaHistoryEntry> {
        if *version == self.latest_version {
            Some(&self.latest)
        } else {
            self.older.get(version)
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.get(version).is_some()
    }

    /// Number of versions in the history.
    pub fn len(&self) -> usize {
        self.older.len() + 1
    }

    /// Entries from the latest version down to the oldest.
    pub fn entries_descending(&self) -> impl Iterator<Item = (&Version, &SchemaHistoryEntry)> {
        std::iter::once((&self.latest_version, &self.latest)).chain(self.older.iter().rev())
    }

    /// Versions from the latest down to the oldest.
    pub fn versions_descending(&self) -> impl Iterator<Item = &Version> {
        self.entries_descending().map(|(version, _)| version)
    }

    /// The greatest version whose validator accepts `raw`.
    pub fn match_version(&self, raw: &Value) -> Option<&Version> {
        self.entries_descending()
            .find(|(_, entry)| entry.validator().accepts(raw))
            .map(|(version, _)| version)
    }
}

/// Builder for [`SchemaHistory`]; errors surface in [`SchemaHistoryBuilder::build`].
#[derive(Debug, Default)]
pub struct SchemaHistoryBuilder {
    entries: Vec<(String, SchemaHistoryEntry)>,
}

impl SchemaHistoryBuilder {
    /// Add a version.
    pub fn version(mut self, version: impl Into<String>, entry: SchemaHistoryEntry) -> Self {
        self.entries.push((version.into(), entry));
        self
    }

    pub fn build(self) -> Result<SchemaHistory> {
        SchemaHistory::from_entries(self.entries)
    }
}
