use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest suffix accepted; a SHA-256 hex digest has 64 characters
const MAX_DIFFICULTY_LEN: usize = 64;

/// Suffix a proof hash must end with for a block to be accepted.
///
/// Only lowercase hex characters make sense here because proof hashes are
/// rendered as lowercase hex. Each extra character multiplies the expected
/// mining work by 16.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Difficulty(String);

impl Difficulty {
    pub fn new(suffix: &str) -> Result<Difficulty> {
        if suffix.is_empty() {
            return Err(LedgerError::Config(
                "Difficulty suffix must not be empty".to_string(),
            ));
        }
        if suffix.len() > MAX_DIFFICULTY_LEN {
            return Err(LedgerError::Config(format!(
                "Difficulty suffix longer than {MAX_DIFFICULTY_LEN} characters"
            )));
        }
        if !suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(LedgerError::Config(format!(
                "Difficulty suffix must be lowercase hex: {suffix}"
            )));
        }
        Ok(Difficulty(suffix.to_string()))
    }

    /// Zeros of the given length, the usual way to express a difficulty
    pub fn zeros(len: usize) -> Result<Difficulty> {
        Self::new(&"0".repeat(len))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_satisfied_by(&self, proof_hash: &str) -> bool {
        proof_hash.ends_with(self.0.as_str())
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty(String::from("0000"))
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Difficulty {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        Difficulty::new(&value)
    }
}

impl From<Difficulty> for String {
    fn from(d: Difficulty) -> Self {
        d.0
    }
}
