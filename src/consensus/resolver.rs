// A consensus round asks every peer for its ledger, keeps whatever parses,
// and walks the candidates longest first until one validates. I keep the
// selection step as a plain function so it can be tested without a network.

use crate::consensus::{rank, CandidatePool};
use crate::core::{balance_of, Block, ChainValidator, Ledger};
use crate::error::{LedgerError, Result};
use crate::network::{routes, Gossip, PeerAddress, PeerRequest};
use crate::storage::OrderedStore;
use log::{info, warn};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

pub struct ConsensusResolver {
    gossip: Arc<Gossip>,
    validator: ChainValidator,
    ledger: Arc<Ledger>,
    // Mirror of the current round's pool, keyed by peer address
    cache: Arc<dyn OrderedStore>,
    last_resolved: RwLock<Option<Vec<Block>>>,
    // Held for a whole round so concurrent rounds never share the cache
    round: Mutex<()>,
}

/// First candidate, in consensus order, whose chain validates
pub fn select_chain(
    validator: &ChainValidator,
    mut candidates: Vec<(PeerAddress, Vec<Block>)>,
) -> Result<(PeerAddress, Vec<Block>)> {
    rank(&mut candidates);
    for (peer, chain) in candidates {
        match validator.check_chain(&chain) {
            Ok(()) => return Ok((peer, chain)),
            Err(e) => warn!("Rejecting chain of {} blocks from {peer}: {e}", chain.len()),
        }
    }
    Err(LedgerError::ConsensusUnreachable)
}

impl ConsensusResolver {
    pub fn new(
        gossip: Arc<Gossip>,
        validator: ChainValidator,
        ledger: Arc<Ledger>,
        cache: Arc<dyn OrderedStore>,
    ) -> ConsensusResolver {
        ConsensusResolver {
            gossip,
            validator,
            ledger,
            cache,
            last_resolved: RwLock::new(None),
            round: Mutex::new(()),
        }
    }

    /// Fetch every peer's ledger into a fresh candidate pool
    pub async fn collect_candidates(&self) -> Result<CandidatePool> {
        let _round = self.round.lock().await;
        self.gather().await
    }

    async fn gather(&self) -> Result<CandidatePool> {
        self.cache.clear()?;
        let responses = self.gossip.broadcast(&PeerRequest::get(routes::LEDGER)).await?;

        let pool = CandidatePool::new();
        for (peer, body) in responses {
            let chain = match serde_json::from_value::<Vec<Block>>(body) {
                Ok(chain) if !chain.is_empty() => chain,
                Ok(_) => {
                    warn!("{peer} sent an empty ledger");
                    continue;
                }
                Err(e) => {
                    warn!("{peer} sent a malformed ledger: {e}");
                    continue;
                }
            };
            self.cache.insert(&peer.key(), &serde_json::to_vec(&chain)?)?;
            pool.insert(peer, chain)?;
        }
        Ok(pool)
    }

    /// Run one round and remember the winning chain
    pub async fn form_consensus(&self) -> Result<Vec<Block>> {
        let _round = self.round.lock().await;
        self.resolve().await
    }

    async fn resolve(&self) -> Result<Vec<Block>> {
        let pool = self.gather().await?;
        info!("Forming consensus over {} candidate chains", pool.len()?);

        let (peer, chain) = select_chain(&self.validator, pool.ranked()?)?;
        info!("Consensus reached on {} blocks from {peer}", chain.len());

        *self
            .last_resolved
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire consensus lock: {e}")))? =
            Some(chain.clone());
        Ok(chain)
    }

    /// Run a round and adopt its winner as the local ledger, wholesale.
    /// Local blocks the winner lacks are dropped. Returns whether the ledger
    /// changed.
    pub async fn synchronize(&self) -> Result<bool> {
        let _round = self.round.lock().await;
        let chain = self.resolve().await?;
        if self.ledger.blocks()? == chain {
            return Ok(false);
        }

        self.ledger.replace(chain)?;
        Ok(true)
    }

    pub fn last_consensus(&self) -> Result<Option<Vec<Block>>> {
        Ok(self
            .last_resolved
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire consensus lock: {e}")))?
            .clone())
    }

    /// Chains cached during the current or last round
    pub fn cached_candidates(&self) -> Result<Vec<(String, Vec<Block>)>> {
        let mut cached = Vec::new();
        for (key, value) in self.cache.entries()? {
            cached.push((
                String::from_utf8_lossy(&key).into_owned(),
                serde_json::from_slice(&value)?,
            ));
        }
        Ok(cached)
    }

    /// Balance of `user` over the agreed chain, or over the local ledger if
    /// no round has succeeded yet
    pub fn wallet_amount(&self, user: &str) -> Result<i64> {
        let chain = match self.last_consensus()? {
            Some(chain) => chain,
            None => self.ledger.blocks()?,
        };
        Ok(balance_of(&chain, user))
    }
}
