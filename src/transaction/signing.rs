/// Signing and sender recovery, kept apart from the type definition
use crate::crypto::{self, Address};
use crate::error::Result;
use crate::transaction::types::Transaction;
use secp256k1::SecretKey;

/// Offset added to the recovery id when it is stored in `v`.
pub const RECOVERY_ID_OFFSET: u8 = 27;

impl Transaction {
    fn signing_digest(&self) -> crypto::Hash {
        crypto::keccak256(&self.hash())
    }

    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<()> {
        let (signature, recovery_id) =
            crypto::sign_recoverable(&self.signing_digest(), secret_key)?;
        self.r = signature[..32].to_vec();
        self.s = signature[32..].to_vec();
        self.v = recovery_id + RECOVERY_ID_OFFSET;
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        !self.r.is_empty() && !self.s.is_empty()
    }

    /// Recover the uncompressed public key of the signer.
    pub fn public_key(&self) -> Result<[u8; 65]> {
        let mut signature = Vec::with_capacity(64);
        signature.extend_from_slice(&self.r);
        signature.extend_from_slice(&self.s);
        crypto::recover_public_key(
            &self.signing_digest(),
            &signature,
            self.v.wrapping_sub(RECOVERY_ID_OFFSET),
        )
    }

    /// Address of the signer, `None` if the signature does not recover to a full public key.
    pub fn sender(&self) -> Option<Address> {
        let public_key = self.public_key().ok()?;
        if public_key[0] != 4 {
            return None;
        }
        Some(crypto::address_from_public_key(&public_key))
    }
}
