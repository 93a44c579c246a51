//! Error handling for the ledger node
//!
//! Every fallible operation in the crate returns [`Result`]. Validation
//! failures carry enough context to tell the caller which invariant broke.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error taxonomy for ledger, consensus and peer operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Peer address is not `ipv4|ipv6|localhost` with a valid port
    MalformedAddress(String),
    /// Signature missing, incomplete or not matching the transaction
    InvalidSignature { id: u64 },
    /// Proof hash does not end with the difficulty suffix
    InvalidProofOfWork { id: u64 },
    /// Stored block hash does not match the recomputed identity hash
    InvalidBlockHash { id: u64 },
    /// Block does not extend the current tip
    NonSequentialBlock { id: u64, tip_id: u64 },
    /// No candidate chain in the pool passed validation
    ConsensusUnreachable,
    /// Backing key-value store failure
    Storage(String),
    /// A single peer could not be reached or answered garbage
    PeerUnreachable { peer: String, reason: String },
    /// Serialization/deserialization errors
    Serialization(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// Mining task was abandoned or its worker died
    Mining(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::MalformedAddress(addr) => write!(f, "Malformed peer address: {addr}"),
            LedgerError::InvalidSignature { id } => {
                write!(f, "Invalid signature on block {id}")
            }
            LedgerError::InvalidProofOfWork { id } => {
                write!(f, "Invalid proof-of-work on block {id}")
            }
            LedgerError::InvalidBlockHash { id } => {
                write!(f, "Block hash mismatch on block {id}")
            }
            LedgerError::NonSequentialBlock { id, tip_id } => {
                write!(f, "Non-sequential block {id} (current tip is {tip_id})")
            }
            LedgerError::ConsensusUnreachable => {
                write!(f, "Network unable to come to a consensus")
            }
            LedgerError::Storage(msg) => write!(f, "Storage error: {msg}"),
            LedgerError::PeerUnreachable { peer, reason } => {
                write!(f, "Peer {peer} unreachable: {reason}")
            }
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::Mining(msg) => write!(f, "Mining error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl LedgerError {
    /// True for the errors raised when a block breaks a chain invariant
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidSignature { .. }
                | LedgerError::InvalidProofOfWork { .. }
                | LedgerError::InvalidBlockHash { .. }
                | LedgerError::NonSequentialBlock { .. }
        )
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(LedgerError::InvalidProofOfWork { id: 3 }.is_validation());
        assert!(LedgerError::NonSequentialBlock { id: 1, tip_id: 1 }.is_validation());
        assert!(!LedgerError::ConsensusUnreachable.is_validation());
        assert!(!LedgerError::Storage("disk full".to_string()).is_validation());
    }

    #[test]
    fn test_display_names_the_block() {
        let err = LedgerError::NonSequentialBlock { id: 2, tip_id: 5 };
        assert_eq!(err.to_string(), "Non-sequential block 2 (current tip is 5)");
    }
}
