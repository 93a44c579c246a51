use crate::core::block::{compute_proof_hash, proof_hash};
use crate::core::{Block, Difficulty};
use crate::error::{LedgerError, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: Difficulty,
}

impl ProofOfWork {
    pub fn new(difficulty: Difficulty) -> ProofOfWork {
        ProofOfWork { difficulty }
    }

    pub fn difficulty(&self) -> &Difficulty {
        &self.difficulty
    }

    /// Validate proof-of-work for a block
    pub fn validate(&self, block: &Block) -> bool {
        self.difficulty.is_satisfied_by(&compute_proof_hash(block))
    }

    /// Brute-force the nonce, starting at 0, until the proof hash ends with
    /// the difficulty suffix. Returns `None` if `cancel` is raised first or
    /// the nonce space runs out.
    pub fn run(&self, block: &Block, cancel: &AtomicBool) -> Option<u64> {
        let block_hash = block.get_hash();
        let mut nonce: u64 = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                debug!("Mining of block {} cancelled at nonce {nonce}", block.get_id());
                return None;
            }
            if self.difficulty.is_satisfied_by(&proof_hash(block_hash, nonce)) {
                return Some(nonce);
            }
            nonce = nonce.checked_add(1)?;
        }
    }

    /// Mine `candidate` to completion on the current thread
    pub fn mine(&self, candidate: Block) -> Option<Block> {
        let never = AtomicBool::new(false);
        self.run(&candidate, &never)
            .map(|nonce| candidate.with_nonce(nonce))
    }
}

/// Raises the cancel flag of a running [`MiningTask`]
#[derive(Debug, Clone)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Proof-of-work search running on its own OS thread so it never occupies
/// the async workers that answer peers.
pub struct MiningTask {
    id: u64,
    cancel: Canceller,
    result: oneshot::Receiver<Option<Block>>,
}

impl MiningTask {
    pub fn spawn(candidate: Block, difficulty: Difficulty) -> Result<MiningTask> {
        let id = candidate.get_id();
        let cancel = Canceller(Arc::new(AtomicBool::new(false)));
        let flag = Arc::clone(&cancel.0);
        let (tx, rx) = oneshot::channel();

        thread::Builder::new()
            .name(format!("miner-{id}"))
            .spawn(move || {
                let pow = ProofOfWork::new(difficulty);
                info!("Mining block {id} with difficulty {}", pow.difficulty());
                let mined = pow
                    .run(&candidate, &flag)
                    .map(|nonce| candidate.with_nonce(nonce));
                if let Some(block) = &mined {
                    info!(
                        "Proof-of-work completed for block {id}: nonce {}",
                        block.get_nonce()
                    );
                }
                // Receiver may be gone if the task was abandoned
                let _ = tx.send(mined);
            })
            .map_err(|e| LedgerError::Mining(format!("Failed to spawn miner thread: {e}")))?;

        Ok(MiningTask {
            id,
            cancel,
            result: rx,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn canceller(&self) -> Canceller {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Mined block, or `None` when the task was cancelled
    pub async fn wait(&mut self) -> Result<Option<Block>> {
        (&mut self.result)
            .await
            .map_err(|_| LedgerError::Mining(format!("Miner for block {} died", self.id)))
    }
}

impl Drop for MiningTask {
    fn drop(&mut self) {
        // An unobserved search is wasted work
        self.cancel.cancel();
    }
}

/// Mine `candidate` against `difficulty` off the async runtime
pub async fn mine(candidate: Block, difficulty: &Difficulty) -> Result<Block> {
    let id = candidate.get_id();
    let mut task = MiningTask::spawn(candidate, difficulty.clone())?;
    task.wait()
        .await?
        .ok_or_else(|| LedgerError::Mining(format!("Nonce space exhausted for block {id}")))
}
