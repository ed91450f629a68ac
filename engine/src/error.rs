//! Error types for the Stow engine.

use thiserror::Error;

/// All possible errors from the Stow engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Version errors
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    // History errors
    #[error("schema history must contain at least one version")]
    EmptyHistory,

    #[error("duplicate schema version: '{first}' and '{second}' have equal precedence")]
    DuplicateVersion { first: String, second: String },

    // Validation errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("schema has no default value")]
    NoDefault,

    // Migration errors
    #[error("no schema in history matches the stored value")]
    NoMatchingSchema,

    #[error("schema version {0} matched but has no upgrade")]
    NoUpgradeAvailable(String),

    #[error("upgrade from {from} produced a value rejected by {to}: {reason}")]
    UpgradeRejected {
        from: String,
        to: String,
        reason: String,
    },
}

impl Error {
    /// Whether a store recovers from this error by falling back to its default.
    pub fn is_migration_failure(&self) -> bool {
        matches!(
            self,
            Error::NoMatchingSchema | Error::NoUpgradeAvailable(_) | Error::UpgradeRejected { .. }
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
