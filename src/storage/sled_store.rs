use crate::error::{LedgerError, Result};
use crate::storage::OrderedStore;
use sled::{Db, Tree};

/// One sled tree; sled keeps keys in lexicographic order
pub struct SledStore {
    tree: Tree,
}

impl SledStore {
    pub fn open(db: &Db, name: &str) -> Result<SledStore> {
        let tree = db
            .open_tree(name)
            .map_err(|e| LedgerError::Storage(format!("Failed to open {name} tree: {e}")))?;
        Ok(SledStore { tree })
    }

    fn flush(&self) -> Result<()> {
        self.tree
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush tree: {e}")))?;
        Ok(())
    }
}

impl OrderedStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .tree
            .get(key)
            .map_err(|e| LedgerError::Storage(format!("Failed to read key: {e}")))?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.tree
            .insert(key, value)
            .map_err(|e| LedgerError::Storage(format!("Failed to write key: {e}")))?;
        self.flush()
    }

    fn remove(&self, key: &[u8]) -> Result<bool> {
        let old = self
            .tree
            .remove(key)
            .map_err(|e| LedgerError::Storage(format!("Failed to remove key: {e}")))?;
        self.flush()?;
        Ok(old.is_some())
    }

    fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = Vec::new();
        for item in self.tree.iter() {
            let (key, value) =
                item.map_err(|e| LedgerError::Storage(format!("Failed to iterate tree: {e}")))?;
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    fn replace_all(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        let old_keys: Vec<Vec<u8>> = self
            .entries()?
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        self.tree
            .transaction(|tx_db| {
                for key in &old_keys {
                    tx_db.remove(key.as_slice())?;
                }
                for (key, value) in entries {
                    tx_db.insert(key.as_slice(), value.as_slice())?;
                }
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError| {
                LedgerError::Storage(format!("Failed to replace tree content: {e}"))
            })?;

        self.flush()
    }

    fn clear(&self) -> Result<()> {
        self.tree
            .clear()
            .map_err(|e| LedgerError::Storage(format!("Failed to clear tree: {e}")))?;
        self.flush()
    }
}
