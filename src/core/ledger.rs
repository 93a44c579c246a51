// The ledger is the node's own copy of the chain. I keep the whole chain in
// memory (it is small) and mirror every change into the ledger store so a
// restart picks up where the node left off.

use crate::core::{Block, ChainValidator};
use crate::error::{LedgerError, Result};
use crate::storage::OrderedStore;
use log::info;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

pub struct Ledger {
    store: Arc<dyn OrderedStore>,
    // Appends and replacements take the write lock, so there is only ever one
    // writer; readers proceed concurrently.
    blocks: RwLock<Vec<Block>>,
    // Hash of the current tip, watched by in-flight mining tasks
    tip: watch::Sender<String>,
}

/// Store key for a block: big-endian id, so key order equals chain order
pub fn block_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

impl Ledger {
    /// Load the chain from `store`, creating and persisting the genesis
    /// block when the store is empty (first boot).
    pub fn open(store: Arc<dyn OrderedStore>) -> Result<Ledger> {
        let mut blocks = Vec::new();
        for (_, value) in store.entries()? {
            blocks.push(Block::deserialize(&value)?);
        }

        if blocks.is_empty() {
            info!("First boot, creating genesis block");
            let genesis = Block::generate_genesis_block()?;
            store.insert(&block_key(genesis.get_id()), &genesis.serialize()?)?;
            blocks.push(genesis);
        } else {
            info!("Loaded ledger with {} blocks", blocks.len());
        }

        let tip_hash = blocks
            .last()
            .map(|b| b.get_hash().to_string())
            .unwrap_or_default();
        let (tip, _) = watch::channel(tip_hash);

        Ok(Ledger {
            store,
            blocks: RwLock::new(blocks),
            tip,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Block>>> {
        self.blocks
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire ledger lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Block>>> {
        self.blocks
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire ledger lock: {e}")))
    }

    /// Snapshot of the full chain, genesis first
    pub fn blocks(&self) -> Result<Vec<Block>> {
        Ok(self.read()?.clone())
    }

    pub fn last_block(&self) -> Result<Block> {
        self.read()?
            .last()
            .cloned()
            .ok_or_else(|| LedgerError::Storage("Ledger has no blocks".to_string()))
    }

    pub fn get_block(&self, id: u64) -> Result<Option<Block>> {
        let blocks = self.read()?;
        Ok(usize::try_from(id).ok().and_then(|i| blocks.get(i)).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    pub fn subscribe_tip(&self) -> watch::Receiver<String> {
        self.tip.subscribe()
    }

    /// Structural append with no validation; callers must have validated.
    pub fn append(&self, block: Block) -> Result<()> {
        let mut blocks = self.write()?;
        self.persist_append(&mut blocks, block)
    }

    fn persist_append(&self, blocks: &mut Vec<Block>, block: Block) -> Result<()> {
        self.store
            .insert(&block_key(block.get_id()), &block.serialize()?)?;
        self.tip.send_replace(block.get_hash().to_string());
        info!("Appended block {} ({})", block.get_id(), block.get_hash());
        blocks.push(block);
        Ok(())
    }

    /// Validate `block` against the current tip and append it.
    ///
    /// The check and the append happen under one write lock, so two blocks
    /// mined for the same id can never both get in.
    pub fn try_append(&self, block: Block, validator: &ChainValidator) -> Result<()> {
        let mut blocks = self.write()?;
        let tip = blocks
            .last()
            .ok_or_else(|| LedgerError::Storage("Ledger has no blocks".to_string()))?;

        if block.get_id() <= tip.get_id() {
            return Err(LedgerError::NonSequentialBlock {
                id: block.get_id(),
                tip_id: tip.get_id(),
            });
        }
        validator.check_block(&block)?;
        ChainValidator::check_link(tip, &block)?;

        self.persist_append(&mut blocks, block)
    }

    /// Wholesale replacement with a chain agreed on by consensus. Local
    /// blocks that are not in `chain` are dropped.
    pub fn replace(&self, chain: Vec<Block>) -> Result<()> {
        if chain.is_empty() {
            return Err(LedgerError::Storage(
                "Refusing to replace the ledger with an empty chain".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(chain.len());
        for block in &chain {
            entries.push((block_key(block.get_id()).to_vec(), block.serialize()?));
        }

        let mut blocks = self.write()?;
        self.store.replace_all(&entries)?;
        if let Some(last) = chain.last() {
            self.tip.send_replace(last.get_hash().to_string());
        }
        info!(
            "Replaced ledger of {} blocks with consensus chain of {} blocks",
            blocks.len(),
            chain.len()
        );
        *blocks = chain;
        Ok(())
    }
}

/// Signed sum of transfer amounts for `user` over `chain`: what they
/// received minus what they sent.
pub fn balance_of(chain: &[Block], user: &str) -> i64 {
    chain
        .iter()
        .map(|block| block.get_transaction().net_amount_for(user))
        .fold(0i64, |acc, amount| acc.saturating_add(amount))
}
