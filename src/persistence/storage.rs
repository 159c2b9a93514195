//! Key/value storage backends for drafts
//!
//! LocalStorage on web, an in-memory map everywhere else.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend could not be reached (disabled, private mode, no window)
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// Backend refused the write (quota exceeded, etc.)
    #[error("storage write rejected: {0}")]
    Rejected(String),
}

/// String key/value store with LocalStorage semantics
pub trait Storage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory storage for native builds and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_overwrites() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.get_item("q1").unwrap(), None);
        storage.set_item("q1", "a").unwrap();
        storage.set_item("q1", "b").unwrap();
        assert_eq!(storage.get_item("q1").unwrap().as_deref(), Some("b"));
        assert_eq!(storage.len(), 1);
    }
}
