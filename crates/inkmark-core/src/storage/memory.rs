//! In-memory storage implementation.

use super::{KeyValueStorage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
    read_only: bool,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose writes always fail, like a full quota.
    pub fn read_only() -> Self {
        Self {
            values: RwLock::default(),
            read_only: true,
        }
    }

    /// Seed a value directly, bypassing the read-only flag.
    pub fn with_value(self, key: &str, value: &str) -> Self {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.read().map(|values| values.len()).unwrap_or(0)
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::Unavailable("quota exceeded".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_writable()?;
        let mut values = self
            .values
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_writable()?;
        let mut values = self
            .values
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        values.remove(key);
        Ok(())
    }
}
