//! # Ledger Node - a small peer-to-peer proof-of-work ledger
//!
//! Each node keeps its own copy of an append-only chain, mines a block for
//! every transaction submitted to it, and periodically asks its peers for
//! their chains so the network settles on the longest valid one.
//!
//! ## How I Organized My Code
//! - `core/`: blocks, transactions, proof-of-work, validation, the ledger and the miner
//! - `consensus/`: candidate pool and the resolver that picks the agreed chain
//! - `network/`: peer addresses, the peer directory, gossip and the HTTP routes
//! - `storage/`: the ordered key-value seam with sled and in-memory backends
//! - `config/`: TOML and environment configuration
//! - `utils/`: hashing, signing and serialization helpers
//! - `cli/`: command-line interface
//! - `node.rs`: wires everything into one running node
//!
//! ## When I Need to Understand Something
//! 1. Start with `node.rs` to see how the parts fit
//! 2. `core/validator.rs` is the only place that decides what a valid chain is
//! 3. `consensus/resolver.rs` for how chains from peers are judged
//! 4. `network/server.rs` for every route a node answers

pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod error;
pub mod network;
pub mod node;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::Config;
pub use consensus::{select_chain, CandidatePool, ConsensusResolver};
pub use crate::core::{
    balance_of, compute_block_hash, compute_proof_hash, Block, ChainValidator, Difficulty, Ledger,
    Miner, MiningTask, ProofOfWork, Transaction, TransactionSignature,
};
pub use error::{LedgerError, Result};
pub use network::{
    AddOutcome, Gossip, HttpTransport, PeerAddress, PeerDirectory, PeerRequest, PeerTransport,
};
pub use node::LedgerNode;
pub use storage::{MemoryStore, OrderedStore, SledStore, Stores};
