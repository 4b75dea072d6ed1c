//! The fixed genesis block every chain starts from.

use crate::blockchain::core::block::{tx_sha, uncle_sha, BlockHeader};
use crate::codec::{self, Value};
use primitive_types::U256;

pub const GENESIS_DIFFICULTY: u64 = 1 << 26;
pub const GENESIS_TIMESTAMP: u64 = 1;

/// Genesis header. Its transaction and uncle digests come from the same SHA-256
/// helpers every other block is sealed with.
pub fn genesis_header() -> BlockHeader {
    BlockHeader {
        prev_hash: Vec::new(),
        uncle_sha: uncle_sha(&[]).to_vec(),
        coinbase: Vec::new(),
        state_root: Vec::new(),
        tx_sha: tx_sha(&[]).to_vec(),
        difficulty: U256::from(GENESIS_DIFFICULTY),
        timestamp: GENESIS_TIMESTAMP,
        nonce: U256::zero(),
        extra: Vec::new(),
    }
}

/// Canonical encoding of the genesis block: its header with empty transaction and uncle lists.
pub fn genesis_encoded() -> Vec<u8> {
    codec::encode(&Value::List(vec![
        genesis_header().to_value(),
        Value::empty_list(),
        Value::empty_list(),
    ]))
}
