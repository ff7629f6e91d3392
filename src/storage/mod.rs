//! Durable client-side storage.
//!
//! Mirrors a browser's origin-wide key/value storage: every client process
//! pointed at the same backing store sees the same values, with no locking
//! and last-writer-wins semantics.

pub mod memory_storage;
pub mod sqlite_storage;

pub use memory_storage::MemoryStorage;
pub use sqlite_storage::SqliteStorage;

use std::future::Future;
use std::pin::Pin;

use crate::core::errors::StorageResult;

/// Key holding the bearer credential.
pub const AUTH_TOKEN_KEY: &str = "auth_token";
/// Key holding the serialized `{username, id}` of the signed-in user.
pub const USER_KEY: &str = "user";

/// Boxed future type for storage operations.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Key/value storage that outlives the process.
pub trait DurableStorage: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, key: &str) -> StorageFuture<'_, StorageResult<Option<String>>>;

    /// Insert or overwrite a value.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn set(&self, key: &str, value: &str) -> StorageFuture<'_, StorageResult<()>>;

    /// Remove a value; removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn remove(&self, key: &str) -> StorageFuture<'_, StorageResult<()>>;
}
