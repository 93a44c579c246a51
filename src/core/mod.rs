//! Core ledger functionality
//!
//! This module contains the block and transaction model, hash chaining,
//! the proof-of-work engine, the chain validator, the ledger itself and the
//! mining pipeline that ties them together.

pub mod block;
pub mod difficulty;
pub mod ledger;
pub mod miner;
pub mod proof_of_work;
pub mod transaction;
pub mod validator;

pub use block::{compute_block_hash, compute_proof_hash, Block, GENESIS_ID, GENESIS_PREV_HASH};
pub use difficulty::Difficulty;
pub use ledger::{balance_of, Ledger};
pub use miner::Miner;
pub use proof_of_work::{mine, Canceller, MiningTask, ProofOfWork};
pub use transaction::{Transaction, TransactionSignature};
pub use validator::ChainValidator;
