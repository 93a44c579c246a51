use crate::core::block::{compute_block_hash, GENESIS_PREV_HASH};
use crate::core::{Block, Difficulty, ProofOfWork};
use crate::error::{LedgerError, Result};
use crate::utils::{EcdsaVerifier, SignatureVerifier};
use std::sync::Arc;

/// Single source of truth for block and chain validity.
///
/// Used both when this node appends its own blocks and when it judges
/// chains supplied by peers. Pure: it never touches storage.
#[derive(Clone)]
pub struct ChainValidator {
    pow: ProofOfWork,
    verifier: Arc<dyn SignatureVerifier>,
}

impl ChainValidator {
    pub fn new(difficulty: Difficulty, verifier: Arc<dyn SignatureVerifier>) -> ChainValidator {
        ChainValidator {
            pow: ProofOfWork::new(difficulty),
            verifier,
        }
    }

    pub fn with_ecdsa(difficulty: Difficulty) -> ChainValidator {
        Self::new(difficulty, Arc::new(EcdsaVerifier))
    }

    pub fn difficulty(&self) -> &Difficulty {
        self.pow.difficulty()
    }

    pub fn check_hash(&self, block: &Block) -> Result<()> {
        if compute_block_hash(block)? != block.get_hash() {
            return Err(LedgerError::InvalidBlockHash {
                id: block.get_id(),
            });
        }
        Ok(())
    }

    /// Key and signature travel together; a lone half is as bad as a
    /// signature that does not verify.
    pub fn check_signature(&self, block: &Block) -> Result<()> {
        let id = block.get_id();
        match (block.get_signer_public_key(), block.get_signature()) {
            (None, None) => Ok(()),
            (Some(public_key), Some(signature)) => {
                let message = block.get_transaction().canonical_bytes()?;
                if self.verifier.verify(public_key, signature, &message) {
                    Ok(())
                } else {
                    Err(LedgerError::InvalidSignature { id })
                }
            }
            _ => Err(LedgerError::InvalidSignature { id }),
        }
    }

    pub fn check_proof_of_work(&self, block: &Block) -> Result<()> {
        if !self.pow.validate(block) {
            return Err(LedgerError::InvalidProofOfWork {
                id: block.get_id(),
            });
        }
        Ok(())
    }

    pub fn check_block(&self, block: &Block) -> Result<()> {
        self.check_hash(block)?;
        self.check_signature(block)?;
        self.check_proof_of_work(block)
    }

    pub fn is_valid_block(&self, block: &Block) -> bool {
        self.check_block(block).is_ok()
    }

    /// `block` must sit directly on top of `prev`
    pub fn check_link(prev: &Block, block: &Block) -> Result<()> {
        let sequential = prev.get_id().checked_add(1) == Some(block.get_id());
        if !sequential || block.get_prev_hash() != prev.get_hash() {
            return Err(LedgerError::NonSequentialBlock {
                id: block.get_id(),
                tip_id: prev.get_id(),
            });
        }
        Ok(())
    }

    pub fn check_chain(&self, chain: &[Block]) -> Result<()> {
        if chain.len() <= 1 {
            return Ok(());
        }

        // Genesis is never mined and has nothing to link to, but it must carry
        // the empty prevHash sentinel and its contents must match its hash.
        let genesis = &chain[0];
        if !genesis.is_genesis() || genesis.get_prev_hash() != GENESIS_PREV_HASH {
            return Err(LedgerError::NonSequentialBlock {
                id: genesis.get_id(),
                tip_id: 0,
            });
        }
        self.check_hash(genesis)?;
        self.check_signature(genesis)?;

        for pair in chain.windows(2) {
            let (prev, block) = (&pair[0], &pair[1]);
            Self::check_link(prev, block)?;
            self.check_block(block)?;
        }
        Ok(())
    }

    pub fn is_valid_chain(&self, chain: &[Block]) -> bool {
        self.check_chain(chain).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::testnet::{build_chain, mine_on, tamper, test_difficulty};
    use crate::utils::{EcdsaSigner, Signer};
    use serde_json::json;

    fn validator() -> ChainValidator {
        ChainValidator::with_ecdsa(test_difficulty())
    }

    #[test]
    fn test_short_chains_are_trivially_valid() {
        let v = validator();
        assert!(v.is_valid_chain(&[]));
        assert!(v.is_valid_chain(&[Block::generate_genesis_block().unwrap()]));
    }

    #[test]
    fn test_built_chain_is_valid() {
        let chain = build_chain(5);
        assert!(validator().is_valid_chain(&chain));
    }

    #[test]
    fn test_every_single_field_mutation_breaks_the_chain() {
        let v = validator();
        let chain = build_chain(4);

        for index in 1..chain.len() {
            let original = &chain[index];
            let bad_nonce = (original.get_nonce() + 1..)
                .find(|n| !v.is_valid_block(&original.clone().with_nonce(*n)))
                .unwrap();

            let mutations = [
                ("id", json!(original.get_id() + 10)),
                ("prevHash", json!("ffff")),
                (
                    "transaction",
                    json!({"kind": "transfer", "sender": "X", "receiver": "Y", "amount": 1}),
                ),
                ("nonce", json!(bad_nonce)),
                ("timestamp", json!("2000-01-01T00:00:00.000Z")),
            ];

            for (field, value) in mutations {
                let mut mutated = chain.clone();
                mutated[index] = tamper(original, field, value);
                assert!(
                    !v.is_valid_chain(&mutated),
                    "mutating {field} of block {index} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn test_tampered_transaction_reports_hash_mismatch() {
        let chain = build_chain(2);
        let bad = tamper(&chain[1], "transaction", json!({"kind": "data", "payload": {}}));
        assert_eq!(
            validator().check_block(&bad),
            Err(LedgerError::InvalidBlockHash { id: 1 })
        );
    }

    #[test]
    fn test_wrong_genesis_is_rejected() {
        let mut chain = build_chain(3);
        chain.remove(0);
        assert!(!validator().is_valid_chain(&chain));
    }

    #[test]
    fn test_rehashed_genesis_with_prev_hash_is_rejected() {
        let genesis = Block::generate_genesis_block().unwrap();
        let forged = tamper(&genesis, "prevHash", json!("not-empty"));
        let forged_hash = compute_block_hash(&forged).unwrap();
        let forged = tamper(&forged, "blockHash", json!(forged_hash));
        let chain = vec![forged.clone(), mine_on(&forged, Transaction::transfer("A", "B", 1))];

        let v = validator();
        assert!(v.check_hash(&chain[0]).is_ok());
        assert_eq!(
            v.check_chain(&chain),
            Err(LedgerError::NonSequentialBlock { id: 0, tip_id: 0 })
        );
    }

    #[test]
    fn test_signature_checks() {
        let v = validator();
        let genesis = Block::generate_genesis_block().unwrap();
        let signer = EcdsaSigner::generate().unwrap();
        let tx = Transaction::transfer("A", "B", 10);

        let signed = tx.sign(&signer).unwrap();
        let good = Block::new_block(&genesis, tx.clone(), Some(signed.clone())).unwrap();
        assert!(v.check_signature(&good).is_ok());

        // Signature made for a different transaction
        let other = Transaction::transfer("A", "B", 11).sign(&signer).unwrap();
        let forged = Block::new_block(&genesis, tx.clone(), Some(other)).unwrap();
        assert_eq!(
            v.check_signature(&forged),
            Err(LedgerError::InvalidSignature { id: 1 })
        );

        // Key without signature
        let half = tamper(&good, "signature", json!(null));
        assert_eq!(
            v.check_signature(&half),
            Err(LedgerError::InvalidSignature { id: 1 })
        );

        // Someone else's key
        let stranger = EcdsaSigner::generate().unwrap();
        let wrong_key = tamper(&good, "signerPublicKey", json!(stranger.public_key()));
        assert!(v.check_signature(&wrong_key).is_err());
    }

    #[test]
    fn test_link_rules() {
        let chain = build_chain(3);
        assert!(ChainValidator::check_link(&chain[0], &chain[1]).is_ok());
        assert_eq!(
            ChainValidator::check_link(&chain[0], &chain[2]),
            Err(LedgerError::NonSequentialBlock { id: 2, tip_id: 0 })
        );
        assert!(ChainValidator::check_link(&chain[1], &chain[1]).is_err());
    }
}
