use crate::error::{LedgerError, Result};
use crate::network::PeerAddress;
use crate::storage::OrderedStore;
use log::{info, warn};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const PRESENT: &[u8] = &[1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyKnown,
}

/// The set of sibling nodes this node knows about.
///
/// Every address lives in the peer store; the cache in front of it is what
/// gossip iterates, in address order.
pub struct PeerDirectory {
    store: Arc<dyn OrderedStore>,
    peers: RwLock<BTreeSet<PeerAddress>>,
}

impl PeerDirectory {
    pub fn open(store: Arc<dyn OrderedStore>) -> Result<PeerDirectory> {
        let directory = PeerDirectory {
            store,
            peers: RwLock::new(BTreeSet::new()),
        };
        directory.refresh()?;
        Ok(directory)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeSet<PeerAddress>>> {
        self.peers
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire peer lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeSet<PeerAddress>>> {
        self.peers
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire peer lock: {e}")))
    }

    /// Reload the cache from the peer store. Keys that no longer parse are
    /// skipped.
    pub fn refresh(&self) -> Result<()> {
        let mut loaded = BTreeSet::new();
        for (key, _) in self.store.entries()? {
            let text = String::from_utf8_lossy(&key);
            match PeerAddress::parse(&text) {
                Ok(peer) => {
                    loaded.insert(peer);
                }
                Err(e) => warn!("Skipping stored peer: {e}"),
            }
        }
        *self.write()? = loaded;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<PeerAddress>> {
        Ok(self.read()?.iter().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    pub fn contains(&self, peer: &PeerAddress) -> Result<bool> {
        Ok(self.read()?.contains(peer))
    }

    /// Remember `address`. Adding a known peer is a no-op.
    pub fn add(&self, address: &str) -> Result<AddOutcome> {
        let peer = PeerAddress::parse(address)?;
        self.add_peer(&peer)
    }

    pub fn add_peer(&self, peer: &PeerAddress) -> Result<AddOutcome> {
        let mut peers = self.write()?;
        let key = peer.key();
        if peers.contains(peer) || self.store.get(&key)?.is_some() {
            peers.insert(peer.clone());
            return Ok(AddOutcome::AlreadyKnown);
        }

        self.store.insert(&key, PRESENT)?;
        peers.insert(peer.clone());
        info!("Added peer {peer}");
        Ok(AddOutcome::Added)
    }

    /// Forget `address`; returns whether it was known
    pub fn remove(&self, address: &str) -> Result<bool> {
        let peer = PeerAddress::parse(address)?;
        let mut peers = self.write()?;
        let stored = self.store.remove(&peer.key())?;
        let cached = peers.remove(&peer);
        if stored || cached {
            info!("Removed peer {peer}");
        }
        Ok(stored || cached)
    }
}
