use crate::core::{
    Block, ChainValidator, Ledger, MiningTask, Transaction, TransactionSignature,
};
use crate::error::{LedgerError, Result};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;

/// Turns submitted transactions into appended blocks:
/// build a candidate on the tip, mine it off-runtime, validate and append.
pub struct Miner {
    ledger: Arc<Ledger>,
    validator: ChainValidator,
    max_attempts: u32,
}

impl Miner {
    pub fn new(ledger: Arc<Ledger>, validator: ChainValidator, max_attempts: u32) -> Miner {
        Miner {
            ledger,
            validator,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Mine `transaction` into the next block of the local ledger.
    ///
    /// If the tip moves while mining (another block for the same id was
    /// appended, or consensus replaced the chain) the search is abandoned
    /// and restarted on the new tip.
    pub async fn mine_transaction(
        &self,
        transaction: Transaction,
        signature: Option<TransactionSignature>,
    ) -> Result<Block> {
        for attempt in 1..=self.max_attempts {
            // Subscribe before reading the tip so no change slips in between
            let mut tip_rx = self.ledger.subscribe_tip();
            let tip = self.ledger.last_block()?;
            let candidate = Block::new_block(&tip, transaction.clone(), signature.clone())?;

            // Bad signatures are rejected before any work is spent
            self.validator.check_signature(&candidate)?;

            let mut task = MiningTask::spawn(candidate, self.validator.difficulty().clone())?;
            let canceller = task.canceller();
            let mined = tokio::select! {
                mined = task.wait() => mined?,
                _ = tip_moved(&mut tip_rx, tip.get_hash()) => {
                    canceller.cancel();
                    None
                }
            };

            let Some(block) = mined else {
                info!(
                    "Abandoned mining block {} on attempt {attempt}: tip moved",
                    tip.get_id() + 1
                );
                continue;
            };

            match self.ledger.try_append(block.clone(), &self.validator) {
                Ok(()) => {
                    info!("New block {} is mined!", block.get_hash());
                    return Ok(block);
                }
                Err(e @ LedgerError::NonSequentialBlock { .. }) => {
                    warn!("Mined block {} lost the race: {e}", block.get_id());
                }
                Err(e) => return Err(e),
            }
        }

        Err(LedgerError::Mining(format!(
            "Gave up after {} attempts, the tip kept moving",
            self.max_attempts
        )))
    }
}

/// Resolves once the watched tip hash differs from `parent`
async fn tip_moved(rx: &mut watch::Receiver<String>, parent: &str) {
    loop {
        if rx.borrow_and_update().as_str() != parent {
            return;
        }
        if rx.changed().await.is_err() {
            // Ledger dropped; nothing will ever move the tip again
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testnet::{build_chain, test_difficulty};
    use crate::utils::{EcdsaSigner, Signer};

    fn miner() -> (Miner, Arc<Ledger>) {
        let ledger = Arc::new(Ledger::open(Arc::new(MemoryStore::new())).unwrap());
        let validator = ChainValidator::with_ecdsa(test_difficulty());
        (Miner::new(Arc::clone(&ledger), validator, 3), ledger)
    }

    #[tokio::test]
    async fn test_mines_and_appends() {
        let (miner, ledger) = miner();
        let block = miner
            .mine_transaction(Transaction::transfer("A", "B", 10), None)
            .await
            .unwrap();

        assert_eq!(block.get_id(), 1);
        assert_eq!(ledger.last_block().unwrap(), block);
    }

    #[tokio::test]
    async fn test_signed_transaction_is_accepted() {
        let (miner, ledger) = miner();
        let signer = EcdsaSigner::generate().unwrap();
        let tx = Transaction::transfer("A", "B", 10);
        let signature = tx.sign(&signer).unwrap();

        let block = miner.mine_transaction(tx, Some(signature)).await.unwrap();
        assert_eq!(block.get_signer_public_key(), Some(signer.public_key().as_str()));
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bad_signature_rejected_before_mining() {
        let (miner, ledger) = miner();
        let signer = EcdsaSigner::generate().unwrap();
        let signature = Transaction::transfer("A", "B", 99).sign(&signer).unwrap();

        let result = miner
            .mine_transaction(Transaction::transfer("A", "B", 10), Some(signature))
            .await;
        assert_eq!(result, Err(LedgerError::InvalidSignature { id: 1 }));
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tip_change_is_detected() {
        let (_, ledger) = miner();
        let mut rx = ledger.subscribe_tip();
        let parent = ledger.last_block().unwrap().get_hash().to_string();

        ledger.replace(build_chain(3)).unwrap();
        tip_moved(&mut rx, &parent).await;
    }
}
