//! Storage capability consumed by stores.
//!
//! A store never knows where its bytes live. It talks to a [`Storage`]
//! implementation through three async calls keyed by strings, exchanging raw
//! JSON values. Whatever comes back from `get` is untrusted and is validated
//! before use.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;

/// Asynchronous key-value storage.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
