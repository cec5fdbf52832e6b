//! In-memory storage backend, used by tests and by hosts that hand over
//! their own byte cache.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::traits::{Storage, StorageError, StorageResult};

#[derive(Clone, Default)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|_| StorageError::ConfigError("memory storage lock poisoned".to_string()))
    }

    /// Number of stored files
    pub fn len(&self) -> usize {
        self.lock().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.lock()?
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<()> {
        self.lock()?.insert(storage_key.to_string(), data);
        Ok(())
    }
}
