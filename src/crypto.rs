//! Cryptographic primitives for the ledger core

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

pub type Hash = [u8; 32];

/// Account address: the low 20 bytes of the Keccak-256 of an uncompressed public key.
pub type Address = [u8; 20];

pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Derive the address owning an uncompressed (65-byte) public key.
pub fn address_from_public_key(public_key: &[u8]) -> Address {
    let digest = keccak256(public_key);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    address
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key.serialize_uncompressed())
    }
}

/// Sign a 32-byte digest, returning the 64-byte compact signature and the recovery id.
pub fn sign_recoverable(digest: &Hash, secret_key: &SecretKey) -> Result<([u8; 64], u8), ChainError> {
    let message = Message::from_digest_slice(digest)
        .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;
    let signature = SECP256K1_CONTEXT.sign_ecdsa_recoverable(&message, secret_key);
    let (recovery_id, compact) = signature.serialize_compact();
    Ok((compact, recovery_id.to_i32() as u8))
}

/// Recover the uncompressed public key that produced `signature` over `digest`.
pub fn recover_public_key(
    digest: &Hash,
    signature: &[u8],
    recovery_id: u8,
) -> Result<[u8; 65], ChainError> {
    if signature.len() != 64 {
        return Err(ChainError::CryptoError(format!(
            "Signature must be exactly 64 bytes (compact), got {}",
            signature.len()
        )));
    }
    let message = Message::from_digest_slice(digest)
        .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;
    let recovery_id = RecoveryId::from_i32(i32::from(recovery_id))
        .map_err(|e| ChainError::CryptoError(format!("Invalid recovery id: {}", e)))?;
    let signature = RecoverableSignature::from_compact(signature, recovery_id)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .recover_ecdsa(&message, &signature)
        .map(|key| key.serialize_uncompressed())
        .map_err(|_| ChainError::CryptoError("Public key recovery failed".to_string()))
}
