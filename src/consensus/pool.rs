use crate::core::Block;
use crate::error::{LedgerError, Result};
use crate::network::PeerAddress;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// The `(peer, chain)` pairs collected during one consensus round
#[derive(Default)]
pub struct CandidatePool {
    candidates: Mutex<BTreeMap<PeerAddress, Vec<Block>>>,
}

impl CandidatePool {
    pub fn new() -> CandidatePool {
        CandidatePool::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<PeerAddress, Vec<Block>>>> {
        self.candidates
            .lock()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire pool lock: {e}")))
    }

    /// A second chain from the same peer replaces the first
    pub fn insert(&self, peer: PeerAddress, chain: Vec<Block>) -> Result<()> {
        self.lock()?.insert(peer, chain);
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Drain the pool in consensus order
    pub fn ranked(&self) -> Result<Vec<(PeerAddress, Vec<Block>)>> {
        let mut candidates: Vec<_> = std::mem::take(&mut *self.lock()?).into_iter().collect();
        rank(&mut candidates);
        Ok(candidates)
    }
}

/// Longest chain first; equal lengths by ascending peer address
pub fn rank(candidates: &mut [(PeerAddress, Vec<Block>)]) {
    candidates.sort_by(|(peer_a, chain_a), (peer_b, chain_b)| {
        (Reverse(chain_a.len()), peer_a).cmp(&(Reverse(chain_b.len()), peer_b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::build_chain;

    fn peer(port: u16) -> PeerAddress {
        PeerAddress::new("127.0.0.1", port).unwrap()
    }

    #[test]
    fn test_ranking_is_length_then_address() {
        let pool = CandidatePool::new();
        pool.insert(peer(3003), build_chain(2)).unwrap();
        pool.insert(peer(3002), build_chain(4)).unwrap();
        pool.insert(peer(3001), build_chain(2)).unwrap();
        pool.insert(peer(3004), build_chain(4)).unwrap();

        let order: Vec<u16> = pool.ranked().unwrap().iter().map(|(p, _)| p.port()).collect();
        assert_eq!(order, vec![3002, 3004, 3001, 3003]);
        assert!(pool.is_empty().unwrap());
    }

    #[test]
    fn test_concurrent_inserts() {
        let pool = std::sync::Arc::new(CandidatePool::new());
        let handles: Vec<_> = (1..=8u16)
            .map(|i| {
                let pool = std::sync::Arc::clone(&pool);
                std::thread::spawn(move || pool.insert(peer(4000 + i), Vec::new()).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.len().unwrap(), 8);
    }
}
