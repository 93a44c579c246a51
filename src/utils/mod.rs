//! Utility functions and helpers
//!
//! This module contains the hashing and signing adapter, timestamps,
//! and the storage encoding used throughout the node.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, new_key_pair, sha256_hex, EcdsaSigner, EcdsaVerifier, SignatureVerifier,
    Signer,
};

pub use serialization::{canonical_json, deserialize, serialize};
