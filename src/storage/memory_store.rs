use crate::error::{LedgerError, Result};
use crate::storage::OrderedStore;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// BTreeMap-backed store for ephemeral data and tests
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.inner
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire store lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.inner
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire store lock: {e}")))
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .read()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn replace_all(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        let mut inner = self.write()?;
        *inner = entries.iter().cloned().collect();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }
}
