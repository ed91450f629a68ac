//! Observability sink for recoverable store failures.
//!
//! Stores never raise recoverable failures as panics and never swallow them
//! silently: every one is reported to a [`Diagnostics`] sink injected at
//! construction. The default sink forwards to `tracing`.

use std::fmt;
use std::sync::Mutex;
use stow_engine::Error;

/// Something worth reporting that happened inside a store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A stored value matched no schema, or could not be upgraded
    MigrationFailed { key: String, error: Error },
    /// The store adopted its default value after a failed load path
    FellBackToDefault { key: String },
    /// A value passed to `set` or `update` was rejected by the active schema
    ValidationRejected { key: String, error: Error },
    /// A storage read, write or removal failed
    StorageFailed { key: String, message: String },
}

impl StoreEvent {
    /// Storage key the event relates to.
    pub fn key(&self) -> &str {
        match self {
            StoreEvent::MigrationFailed { key, .. }
            | StoreEvent::FellBackToDefault { key }
            | StoreEvent::ValidationRejected { key, .. }
            | StoreEvent::StorageFailed { key, .. } => key,
        }
    }
}

impl fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreEvent::MigrationFailed { key, error } => {
                write!(f, "migration failed for '{}': {}", key, error)
            }
            StoreEvent::FellBackToDefault { key } => {
                write!(f, "'{}' fell back to its default value", key)
            }
            StoreEvent::ValidationRejected { key, error } => {
                write!(f, "value for '{}' rejected: {}", key, error)
            }
            StoreEvent::StorageFailed { key, message } => {
                write!(f, "storage failed for '{}': {}", key, message)
            }
        }
    }
}

/// Receives store events.
pub trait Diagnostics: Send + Sync {
    fn warn(&self, event: &StoreEvent);
    fn error(&self, event: &StoreEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warn(&self, event: &StoreEvent) {
        tracing::warn!(key = %event.key(), "{}", event);
    }

    fn error(&self, event: &StoreEvent) {
        tracing::error!(key = %event.key(), "{}", event);
    }
}

/// Severity an event was reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warn,
    Error,
}

/// Keeps every reported event in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<(Severity, StoreEvent)>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events reported so far, oldest first.
    pub fn events(&self) -> Vec<(Severity, StoreEvent)> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Events reported with the given severity.
    pub fn with_severity(&self, severity: Severity) -> Vec<StoreEvent> {
        self.events()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, event)| event)
            .collect()
    }

    fn push(&self, severity: Severity, event: &StoreEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((severity, event.clone()));
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn warn(&self, event: &StoreEvent) {
        self.push(Severity::Warn, event);
    }

    fn error(&self, event: &StoreEvent) {
        self.push(Severity::Error, event);
    }
}
