use crate::core::{Transaction, TransactionSignature};
use crate::error::Result;
use crate::utils::{current_timestamp, deserialize, serialize, sha256_hex};
use serde::{Deserialize, Serialize};

/// Every node derives the exact same genesis block from these constants
pub const GENESIS_ID: u64 = 0;
pub const GENESIS_PREV_HASH: &str = "";
pub const GENESIS_TIMESTAMP: &str = "1970-01-01T00:00:00.000Z";
const GENESIS_MESSAGE: &str = "genesis";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    id: u64,
    timestamp: String,
    prev_hash: String,
    transaction: Transaction,
    nonce: u64,
    #[serde(default)]
    signer_public_key: Option<String>,
    #[serde(default)]
    signature: Option<Vec<u8>>,
    block_hash: String,
}

impl Block {
    /// Candidate block on top of `prev`, not yet mined (nonce 0)
    pub fn new_block(
        prev: &Block,
        transaction: Transaction,
        signature: Option<TransactionSignature>,
    ) -> Result<Block> {
        let (signer_public_key, signature) = match signature {
            Some(s) => (Some(s.public_key), Some(s.signature)),
            None => (None, None),
        };

        let mut block = Block {
            id: prev.id + 1,
            timestamp: current_timestamp(),
            prev_hash: prev.block_hash.clone(),
            transaction,
            nonce: 0,
            signer_public_key,
            signature,
            block_hash: String::new(),
        };
        block.block_hash = compute_block_hash(&block)?;
        Ok(block)
    }

    pub fn generate_genesis_block() -> Result<Block> {
        let mut block = Block {
            id: GENESIS_ID,
            timestamp: String::from(GENESIS_TIMESTAMP),
            prev_hash: String::from(GENESIS_PREV_HASH),
            transaction: Transaction::data([("message", GENESIS_MESSAGE)]),
            nonce: 0,
            signer_public_key: None,
            signature: None,
            block_hash: String::new(),
        };
        block.block_hash = compute_block_hash(&block)?;
        Ok(block)
    }

    /// Same block with a different nonce; the identity hash is unaffected
    pub fn with_nonce(mut self, nonce: u64) -> Block {
        self.nonce = nonce;
        self
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_id(&self) -> u64 {
        self.id
    }

    pub fn get_timestamp(&self) -> &str {
        self.timestamp.as_str()
    }

    pub fn get_prev_hash(&self) -> &str {
        self.prev_hash.as_str()
    }

    pub fn get_transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_signer_public_key(&self) -> Option<&str> {
        self.signer_public_key.as_deref()
    }

    pub fn get_signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn get_hash(&self) -> &str {
        self.block_hash.as_str()
    }

    pub fn is_genesis(&self) -> bool {
        self.id == GENESIS_ID
    }
}

/// Identity hash: id, timestamp, previous hash, canonical transaction and the
/// signer's public key (empty when unsigned). The nonce is never part of it.
/// Every variable-length field is prefixed with its u64 big-endian length so
/// no two distinct field splits encode to the same bytes.
pub fn compute_block_hash(block: &Block) -> Result<String> {
    let public_key = block.signer_public_key.as_deref().unwrap_or("");
    let mut data_bytes = vec![];
    data_bytes.extend(block.id.to_be_bytes());
    push_field(&mut data_bytes, block.timestamp.as_bytes());
    push_field(&mut data_bytes, block.prev_hash.as_bytes());
    push_field(&mut data_bytes, &block.transaction.canonical_bytes()?);
    push_field(&mut data_bytes, public_key.as_bytes());
    Ok(sha256_hex(&data_bytes))
}

fn push_field(data_bytes: &mut Vec<u8>, field: &[u8]) {
    data_bytes.extend((field.len() as u64).to_be_bytes());
    data_bytes.extend(field);
}

/// Proof hash over the stored block hash and the nonce
pub fn compute_proof_hash(block: &Block) -> String {
    proof_hash(&block.block_hash, block.nonce)
}

pub fn proof_hash(block_hash: &str, nonce: u64) -> String {
    let mut data_bytes = Vec::with_capacity(block_hash.len() + 8);
    data_bytes.extend(block_hash.as_bytes());
    data_bytes.extend(nonce.to_be_bytes());
    sha256_hex(&data_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_is_deterministic() {
        let a = Block::generate_genesis_block().unwrap();
        let b = Block::generate_genesis_block().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get_id(), 0);
        assert_eq!(a.get_prev_hash(), "");
        assert!(a.is_genesis());
    }

    #[test]
    fn test_new_block_links_to_parent() {
        let genesis = Block::generate_genesis_block().unwrap();
        let block =
            Block::new_block(&genesis, Transaction::transfer("A", "B", 10), None).unwrap();

        assert_eq!(block.get_id(), 1);
        assert_eq!(block.get_prev_hash(), genesis.get_hash());
        assert_eq!(block.get_nonce(), 0);
        assert_eq!(block.get_hash(), compute_block_hash(&block).unwrap());
    }

    #[test]
    fn test_nonce_changes_proof_hash_only() {
        let genesis = Block::generate_genesis_block().unwrap();
        let block =
            Block::new_block(&genesis, Transaction::transfer("A", "B", 10), None).unwrap();
        let bumped = block.clone().with_nonce(7);

        assert_eq!(compute_block_hash(&block).unwrap(), compute_block_hash(&bumped).unwrap());
        assert_ne!(compute_proof_hash(&block), compute_proof_hash(&bumped));
    }

    #[test]
    fn test_signer_key_is_part_of_identity() {
        let genesis = Block::generate_genesis_block().unwrap();
        let tx = Transaction::transfer("A", "B", 10);
        let unsigned = Block::new_block(&genesis, tx.clone(), None).unwrap();
        let mut signed = unsigned.clone();
        signed.signer_public_key = Some("abcd".to_string());

        assert_ne!(
            compute_block_hash(&unsigned).unwrap(),
            compute_block_hash(&signed).unwrap()
        );
    }

    #[test]
    fn test_field_boundaries_are_part_of_identity() {
        let genesis = Block::generate_genesis_block().unwrap();
        let block = Block::new_block(&genesis, Transaction::transfer("A", "B", 10), None).unwrap();

        // Same concatenated bytes, split differently between two fields.
        let mut left = block.clone();
        left.timestamp = "2024-01-01T00:00:00.000Zab".to_string();
        left.prev_hash = "cd".to_string();
        let mut right = block.clone();
        right.timestamp = "2024-01-01T00:00:00.000Z".to_string();
        right.prev_hash = "abcd".to_string();

        assert_ne!(compute_block_hash(&left).unwrap(), compute_block_hash(&right).unwrap());
    }

    #[test]
    fn test_storage_encoding_round_trip() {
        let genesis = Block::generate_genesis_block().unwrap();
        let bytes = genesis.serialize().unwrap();
        assert_eq!(Block::deserialize(&bytes).unwrap(), genesis);
    }

    #[test]
    fn test_wire_format_uses_camel_case() {
        let genesis = Block::generate_genesis_block().unwrap();
        let json = serde_json::to_value(&genesis).unwrap();
        assert!(json.get("prevHash").is_some());
        assert!(json.get("blockHash").is_some());
        assert!(json.get("signerPublicKey").is_some());
    }
}
