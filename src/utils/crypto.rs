use chrono::{SecondsFormat, Utc};
use data_encoding::HEXLOWER;
use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING,
};

use crate::error::{LedgerError, Result};

/// Creation time of a block, RFC 3339 in UTC with millisecond precision
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// Lowercase hex SHA-256, the form every hash in a block is stored in
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&sha256_digest(data))
}

pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| LedgerError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?
        .as_ref()
        .to_vec();
    Ok(pkcs8)
}

pub fn ecdsa_p256_sha256_sign_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key =
        ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key);
    peer_public_key.verify(message, signature).is_ok()
}

/// Something that can sign transactions on behalf of a key holder.
///
/// Key generation and storage live outside the node; the node only needs the
/// public half (as lowercase hex) and a signature over the canonical bytes.
pub trait Signer: Send + Sync {
    fn public_key(&self) -> String;
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Checks a signature produced by some [`Signer`]
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, public_key: &str, signature: &[u8], message: &[u8]) -> bool;
}

/// ECDSA P-256 / SHA-256 signer backed by a PKCS#8 document
pub struct EcdsaSigner {
    key_pair: EcdsaKeyPair,
    public_key: String,
    rng: SystemRandom,
}

impl EcdsaSigner {
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<EcdsaSigner> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
            .map_err(|e| {
                LedgerError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
            })?;
        let public_key = HEXLOWER.encode(key_pair.public_key().as_ref());
        Ok(EcdsaSigner {
            key_pair,
            public_key,
            rng,
        })
    }

    /// Fresh random key, mostly useful for tests and throwaway clients
    pub fn generate() -> Result<EcdsaSigner> {
        let pkcs8 = new_key_pair()?;
        Self::from_pkcs8(&pkcs8)
    }
}

impl Signer for EcdsaSigner {
    fn public_key(&self) -> String {
        self.public_key.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .key_pair
            .sign(&self.rng, message)
            .map_err(|e| LedgerError::Crypto(format!("Failed to sign message: {e}")))?;
        Ok(signature.as_ref().to_vec())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl SignatureVerifier for EcdsaVerifier {
    fn verify(&self, public_key: &str, signature: &[u8], message: &[u8]) -> bool {
        match HEXLOWER.decode(public_key.as_bytes()) {
            Ok(raw) => ecdsa_p256_sha256_sign_verify(&raw, signature, message),
            Err(_) => false,
        }
    }
}
