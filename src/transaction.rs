//! Transaction module split into types and signing for better modularity

mod signing;
pub mod types;

pub use signing::RECOVERY_ID_OFFSET;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use primitive_types::U256;

    fn transfer(value: u64) -> Transaction {
        Transaction::new(vec![0xbb; 20], U256::from(value), &[]).unwrap()
    }

    #[test]
    fn test_contract_detection() {
        assert!(!transfer(1).is_contract());
        let creation = Transaction::new(Vec::new(), U256::from(1), &["STOP"]).unwrap();
        assert!(creation.is_contract());
    }

    #[test]
    fn test_data_is_compiled() {
        let tx = Transaction::new(Vec::new(), U256::from(100), &["PUSH 1", "PUSH 2"]).unwrap();
        assert_eq!(tx.data, vec!["304".to_string(), "560".to_string()]);
        assert!(Transaction::new(Vec::new(), U256::zero(), &["NOPE"]).is_err());
    }

    #[test]
    fn test_hash_ignores_signature() {
        let keypair = KeyPair::generate();
        let mut tx = transfer(5);
        let unsigned_hash = tx.hash();
        tx.sign(&keypair.secret_key).unwrap();
        assert_eq!(tx.hash(), unsigned_hash);
    }

    #[test]
    fn test_hash_covers_semantic_fields() {
        let base = transfer(5);
        assert_ne!(base.hash(), base.clone().with_nonce(1).hash());
        assert_ne!(base.hash(), transfer(6).hash());
        let mut other = base.clone();
        other.recipient = vec![0xcc; 20];
        assert_ne!(base.hash(), other.hash());
    }

    #[test]
    fn test_sign_and_recover_sender() {
        let keypair = KeyPair::generate();
        let mut tx = transfer(5).with_nonce(3);
        assert!(!tx.is_signed());
        assert_eq!(tx.sender(), None);

        tx.sign(&keypair.secret_key).unwrap();
        assert!(tx.is_signed());
        assert!(tx.v() == RECOVERY_ID_OFFSET || tx.v() == RECOVERY_ID_OFFSET + 1);
        assert_eq!(tx.r().len(), 32);
        assert_eq!(tx.s().len(), 32);
        assert_eq!(tx.public_key().unwrap()[0], 4);
        assert_eq!(tx.sender(), Some(keypair.address()));
    }

    #[test]
    fn test_tampered_transaction_changes_sender() {
        let keypair = KeyPair::generate();
        let mut tx = transfer(5);
        tx.sign(&keypair.secret_key).unwrap();
        tx.value = U256::from(5_000);
        assert_ne!(tx.sender(), Some(keypair.address()));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let keypair = KeyPair::generate();
        let mut tx = Transaction::new(Vec::new(), U256::exp10(20), &["PUSH 1", "SSTORE"])
            .unwrap()
            .with_nonce(42);
        tx.sign(&keypair.secret_key).unwrap();

        let encoded = tx.encode();
        let decoded = Transaction::decode(&encoded).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.encode(), encoded);
        assert_eq!(decoded.sender(), Some(keypair.address()));
    }

    #[test]
    fn test_decode_rejects_short_tuple() {
        let tx = transfer(1);
        let mut value = tx.to_value();
        if let crate::codec::Value::List(items) = &mut value {
            items.truncate(4);
        }
        let result = Transaction::decode(&crate::codec::encode(&value));
        assert!(matches!(
            result,
            Err(crate::error::ChainError::MalformedData(_))
        ));
    }
}
