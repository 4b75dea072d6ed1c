use crate::blockchain::core::block::{Block, BlockHeader};
use crate::blockchain::core::genesis::genesis_encoded;
use crate::codec::{self, Value};
use crate::error::{ChainError, Result};
use crate::persistence::{Database, SharedDatabase, LAST_KNOWN_TD_KEY};
use crate::trie::Trie;
use primitive_types::U256;
use tracing::{debug, info};

const INFO_SUFFIX: &[u8] = b"Info";

/// Key of the height index entry for the block with `hash`.
pub fn info_key(hash: &[u8]) -> Vec<u8> {
    let mut key = hash.to_vec();
    key.extend_from_slice(INFO_SUFFIX);
    key
}

/// Height index entry written once per added block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: Vec<u8>,
}

impl BlockInfo {
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(&Value::List(vec![
            Value::Uint(self.number),
            Value::from(self.hash.clone()),
        ]))
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let decoded = codec::decode(data)?;
        Ok(BlockInfo {
            number: decoded.get(0)?.as_u64()?,
            hash: decoded.get(1)?.as_bytes()?,
        })
    }

    /// Read the entry for `hash`; an unknown block yields number 0.
    pub fn load(db: &SharedDatabase, hash: &[u8]) -> Result<Self> {
        match db.get(&info_key(hash))? {
            Some(data) => Self::decode(&data),
            None => Ok(BlockInfo::default()),
        }
    }
}

pub struct BlockChain {
    db: SharedDatabase,
    genesis_block: Block,
    total_difficulty: U256,
    last_block_number: u64,
    current_block: Option<Block>,
    /// Head state plus everything applied since the head was added.
    pending_state: Option<Trie>,
    last_block_hash: Vec<u8>,
}

impl BlockChain {
    /// Build the chain view over `db`. The genesis block is not added; callers
    /// `add` it (or a restored head) before asking for the chain.
    pub fn new(db: SharedDatabase) -> Result<Self> {
        let genesis_block = Block::decode(db.clone(), &genesis_encoded())?;

        let td_bytes = db.last_known_total_difficulty()?;
        if td_bytes.len() > 32 {
            return Err(ChainError::MalformedData(format!(
                "total difficulty is {} bytes",
                td_bytes.len()
            )));
        }
        let total_difficulty = U256::from_big_endian(&td_bytes);

        Ok(BlockChain {
            db,
            genesis_block,
            total_difficulty,
            last_block_number: 0,
            current_block: None,
            pending_state: None,
            last_block_hash: Vec::new(),
        })
    }

    pub fn db(&self) -> &SharedDatabase {
        &self.db
    }

    pub fn has_block(&self, hash: &[u8]) -> Result<bool> {
        Ok(self
            .db
            .get(hash)?
            .map(|data| !data.is_empty())
            .unwrap_or(false))
    }

    /// Append `block` as the new head and restart the pending state from it.
    ///
    /// The height index entry and the block itself are two separate writes.
    /// The stored head is never mutated afterwards, so its hash stays the one
    /// indexed here.
    pub fn add(&mut self, block: Block) -> Result<()> {
        let hash = block.hash();

        self.last_block_number += 1;
        let info = BlockInfo {
            number: self.last_block_number,
            hash: hash.to_vec(),
        };
        self.db.put(&info_key(&hash), &info.encode())?;

        self.db.put(&hash, &block.encode())?;
        self.last_block_hash = hash.to_vec();
        self.pending_state = Some(block.state().clone());
        self.current_block = Some(block);

        info!(
            "Added block {} at number {}",
            hex::encode(hash),
            self.last_block_number
        );
        Ok(())
    }

    pub fn get_block(&self, hash: &[u8]) -> Result<Option<Block>> {
        self.db
            .get(hash)?
            .map(|data| Block::decode(self.db.clone(), &data))
            .transpose()
    }

    pub fn block_info_by_hash(&self, hash: &[u8]) -> Result<BlockInfo> {
        BlockInfo::load(&self.db, hash)
    }

    pub fn block_info(&self, block: &Block) -> Result<BlockInfo> {
        self.block_info_by_hash(&block.hash())
    }

    fn raw_block(&self, hash: &[u8]) -> Result<Vec<u8>> {
        self.db
            .get(hash)?
            .ok_or_else(|| ChainError::BlockNotFound(hex::encode(hash)))
    }

    fn prev_hash_of(raw: &[u8]) -> Result<Vec<u8>> {
        let decoded = codec::decode(raw)?;
        Ok(BlockHeader::from_value(decoded.get(0)?)?.prev_hash)
    }

    /// Encoded blocks walking back from the head toward `ancestor`, newest first.
    ///
    /// At most `max` entries are returned. When the head is further than `max`
    /// blocks above the ancestor, the walk first skips down to the `max` blocks
    /// sitting directly above the ancestor and returns those. An unknown
    /// ancestor is treated as height 0.
    pub fn get_chain_from_hash(&self, ancestor: &[u8], max: u64) -> Result<Vec<Vec<u8>>> {
        if self.current_block.is_none() {
            return Err(ChainError::NoChainHead);
        }

        let mut current_hash = self.last_block_hash.clone();
        let last_number = self.block_info_by_hash(&current_hash)?.number;
        let parent_number = self.block_info_by_hash(ancestor)?.number;
        let count = last_number.saturating_sub(parent_number).min(max);
        let start_number = parent_number + count;

        let mut num = last_number;
        while num > start_number {
            current_hash = Self::prev_hash_of(&self.raw_block(&current_hash)?)?;
            num -= 1;
        }

        let mut chain = Vec::new();
        while current_hash != ancestor && num > parent_number && (chain.len() as u64) < count {
            let raw = self.raw_block(&current_hash)?;
            current_hash = Self::prev_hash_of(&raw)?;
            chain.push(raw);
            num -= 1;
        }

        debug!(
            "Collected {} blocks toward {} (max {})",
            chain.len(),
            hex::encode(ancestor),
            max
        );
        Ok(chain)
    }

    pub fn genesis_block(&self) -> &Block {
        &self.genesis_block
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.current_block.as_ref()
    }

    /// Head block, or [`ChainError::NoChainHead`] before anything was added.
    pub fn head(&self) -> Result<&Block> {
        self.current_block.as_ref().ok_or(ChainError::NoChainHead)
    }

    /// State the next block is built on. Starts at the head's state root.
    pub fn pending_state(&self) -> Result<&Trie> {
        self.pending_state.as_ref().ok_or(ChainError::NoChainHead)
    }

    pub fn pending_state_mut(&mut self) -> Result<&mut Trie> {
        self.pending_state.as_mut().ok_or(ChainError::NoChainHead)
    }

    pub fn last_block_hash(&self) -> &[u8] {
        &self.last_block_hash
    }

    pub fn last_block_number(&self) -> u64 {
        self.last_block_number
    }

    pub fn total_difficulty(&self) -> U256 {
        self.total_difficulty
    }

    /// Record `td` and persist it as the last known total difficulty.
    pub fn set_total_difficulty(&mut self, td: U256) -> Result<()> {
        let mut buf = [0u8; 32];
        td.to_big_endian(&mut buf);
        let start = buf.iter().position(|b| *b != 0).unwrap_or(buf.len());
        self.db.put(LAST_KNOWN_TD_KEY, &buf[start..])?;
        self.total_difficulty = td;
        Ok(())
    }
}
