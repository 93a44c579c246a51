//! Consensus over competing peer chains
//!
//! Each round gathers every peer's chain into a fresh candidate pool, ranks
//! the candidates longest first and adopts the first one that validates.

pub mod pool;
pub mod resolver;

pub use pool::{rank, CandidatePool};
pub use resolver::{select_chain, ConsensusResolver};
