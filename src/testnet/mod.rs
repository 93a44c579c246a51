//! Test helpers
//!
//! Chain builders that mine at a trivial difficulty, a JSON-level block
//! tamperer, and an in-memory [`PeerTransport`] with scripted peers.

use crate::core::{Block, Difficulty, ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::{PeerAddress, PeerRequest, PeerTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Two zeros: fast enough to mine in tests, still rejects most nonces
pub fn test_difficulty() -> Difficulty {
    Difficulty::zeros(2).unwrap()
}

/// Mine `transaction` on top of `prev` at the test difficulty
pub fn mine_on(prev: &Block, transaction: Transaction) -> Block {
    let candidate = Block::new_block(prev, transaction, None).unwrap();
    ProofOfWork::new(test_difficulty()).mine(candidate).unwrap()
}

/// Valid chain of `len` blocks: genesis plus mined transfers
pub fn build_chain(len: usize) -> Vec<Block> {
    let mut chain = vec![Block::generate_genesis_block().unwrap()];
    for i in 1..len {
        let prev = chain.last().unwrap();
        let block = mine_on(prev, Transaction::transfer("A", "B", i as u64));
        chain.push(block);
    }
    chain.truncate(len);
    chain
}

/// Copy of `block` with one wire field overwritten, bypassing every
/// constructor check
pub fn tamper(block: &Block, field: &str, value: Value) -> Block {
    let mut json = serde_json::to_value(block).unwrap();
    json[field] = value;
    serde_json::from_value(json).unwrap()
}

/// Scripted behaviour of one fake peer
#[derive(Debug, Clone)]
pub enum FakePeer {
    Answer(Value),
    Slow(Duration),
    Fail,
}

/// Requests seen by a [`FakeTransport`]
#[derive(Clone, Default)]
pub struct TransportLog(Arc<Mutex<Vec<(PeerAddress, PeerRequest)>>>);

impl TransportLog {
    pub fn requests(&self) -> Vec<(PeerAddress, PeerRequest)> {
        self.0.lock().unwrap().clone()
    }

    pub fn contacted(&self) -> Vec<PeerAddress> {
        self.requests().into_iter().map(|(peer, _)| peer).collect()
    }
}

/// Transport answering from a script; peers not in it are unreachable
#[derive(Default)]
pub struct FakeTransport {
    peers: BTreeMap<PeerAddress, FakePeer>,
    log: TransportLog,
}

impl FakeTransport {
    pub fn new() -> FakeTransport {
        FakeTransport::default()
    }

    pub fn with(mut self, address: &str, behaviour: FakePeer) -> FakeTransport {
        self.peers
            .insert(PeerAddress::parse(address).unwrap(), behaviour);
        self
    }

    pub fn log(&self) -> TransportLog {
        self.log.clone()
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn send(&self, peer: &PeerAddress, request: &PeerRequest) -> Result<Value> {
        self.log
            .0
            .lock()
            .unwrap()
            .push((peer.clone(), request.clone()));

        match self.peers.get(peer) {
            Some(FakePeer::Answer(body)) => Ok(body.clone()),
            Some(FakePeer::Slow(delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(Value::Null)
            }
            Some(FakePeer::Fail) | None => Err(LedgerError::PeerUnreachable {
                peer: peer.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChainValidator;

    #[test]
    fn test_build_chain_is_valid() {
        let chain = build_chain(4);
        assert_eq!(chain.len(), 4);
        assert!(ChainValidator::with_ecdsa(test_difficulty()).is_valid_chain(&chain));
        assert_eq!(build_chain(0).len(), 0);
    }
}
