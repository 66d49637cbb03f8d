//! Key/value string storage for persisted annotations.
//!
//! Backends mirror the browser's `localStorage` contract: synchronous
//! `get`/`set`/`remove` of string values under string keys.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for key/value storage backends.
///
/// Implementations can store values in memory, in files, or in the
/// browser's `localStorage` (see the app crate). Writes may fail, e.g.
/// when a quota is exceeded; callers decide whether that is fatal.
pub trait KeyValueStorage {
    /// Value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if a value exists under `key`.
    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

macro_rules! forward_storage {
    ($($ptr:ty),*) => {$(
        impl<S: KeyValueStorage + ?Sized> KeyValueStorage for $ptr {
            fn get(&self, key: &str) -> StorageResult<Option<String>> {
                (**self).get(key)
            }

            fn set(&self, key: &str, value: &str) -> StorageResult<()> {
                (**self).set(key, value)
            }

            fn remove(&self, key: &str) -> StorageResult<()> {
                (**self).remove(key)
            }
        }
    )*};
}

forward_storage!(&S, Box<S>, std::rc::Rc<S>, std::sync::Arc<S>);
