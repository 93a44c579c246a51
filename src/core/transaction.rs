use crate::error::Result;
use crate::utils::{canonical_json, Signer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payload sealed into a block.
///
/// Serialized with an explicit `kind` tag so the canonical bytes (and
/// therefore block hashes and signatures) are the same on every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transaction {
    /// Value moving from one party to another
    Transfer {
        sender: String,
        receiver: String,
        amount: u64,
    },
    /// Arbitrary structured data; keys are kept ordered
    Data { payload: BTreeMap<String, String> },
}

/// Signature over a transaction's canonical bytes plus the key that made it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignature {
    pub public_key: String,
    pub signature: Vec<u8>,
}

impl Transaction {
    pub fn transfer(sender: &str, receiver: &str, amount: u64) -> Transaction {
        Transaction::Transfer {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
        }
    }

    pub fn data<I, K, V>(entries: I) -> Transaction
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Transaction::Data {
            payload: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The bytes that get hashed into a block and signed by a wallet
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonical_json(self)
    }

    pub fn sign(&self, signer: &dyn Signer) -> Result<TransactionSignature> {
        let signature = signer.sign(&self.canonical_bytes()?)?;
        Ok(TransactionSignature {
            public_key: signer.public_key(),
            signature,
        })
    }

    /// Effect of this transaction on `user`'s balance: received minus sent
    pub fn net_amount_for(&self, user: &str) -> i64 {
        match self {
            Transaction::Transfer {
                sender,
                receiver,
                amount,
            } => {
                let amount = i64::try_from(*amount).unwrap_or(i64::MAX);
                let mut net = 0i64;
                if receiver == user {
                    net = net.saturating_add(amount);
                }
                if sender == user {
                    net = net.saturating_sub(amount);
                }
                net
            }
            Transaction::Data { .. } => 0,
        }
    }
}
