//! Data storage and persistence
//!
//! The ledger, the peer list and the consensus cache all sit behind the
//! [`OrderedStore`] interface. On disk that is a sled tree per concern;
//! tests and the per-round consensus cache use the in-memory store.

pub mod memory_store;
pub mod sled_store;

pub use memory_store::MemoryStore;
pub use sled_store::SledStore;

use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

const LEDGER_TREE: &str = "ledger";
const PEERS_TREE: &str = "peers";

/// Key-value store iterated in ascending key order
pub trait OrderedStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<()>;
    /// Returns whether the key was present
    fn remove(&self, key: &[u8]) -> Result<bool>;
    fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
    /// Atomically swap the whole content for `entries`
    fn replace_all(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// The three stores a node runs on
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn OrderedStore>,
    pub peers: Arc<dyn OrderedStore>,
    pub consensus: Arc<dyn OrderedStore>,
}

impl Stores {
    /// Ledger and peers persist in one sled database; the consensus cache is
    /// rebuilt every round and stays in memory.
    pub fn open(path: &Path) -> Result<Stores> {
        let db = sled::open(path)?;
        Ok(Stores {
            ledger: Arc::new(SledStore::open(&db, LEDGER_TREE)?),
            peers: Arc::new(SledStore::open(&db, PEERS_TREE)?),
            consensus: Arc::new(MemoryStore::new()),
        })
    }

    pub fn in_memory() -> Stores {
        Stores {
            ledger: Arc::new(MemoryStore::new()),
            peers: Arc::new(MemoryStore::new()),
            consensus: Arc::new(MemoryStore::new()),
        }
    }
}
