use crate::account::{self, Account, Contract};
use crate::blockchain::core::chain::BlockInfo;
use crate::codec::{self, Value};
use crate::crypto::{sha256, Hash};
use crate::error::{ChainError, Result};
use crate::persistence::SharedDatabase;
use crate::transaction::Transaction;
use crate::trie::{StateTrie, Trie};
use primitive_types::U256;
use tracing::warn;

/// Number of fields in an encoded header tuple.
pub const HEADER_FIELDS: usize = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub prev_hash: Vec<u8>,
    pub uncle_sha: Vec<u8>,
    pub coinbase: Vec<u8>,
    pub state_root: Vec<u8>,
    pub tx_sha: Vec<u8>,
    pub difficulty: U256,
    pub timestamp: u64,
    pub nonce: U256,
    pub extra: Vec<u8>,
}

impl BlockHeader {
    /// Header tuple as persisted: every field, in position order.
    pub fn to_value(&self) -> Value {
        Value::List(vec![
            Value::from(self.prev_hash.clone()),
            Value::from(self.uncle_sha.clone()),
            Value::from(self.coinbase.clone()),
            Value::from(self.state_root.clone()),
            Value::from(self.tx_sha.clone()),
            Value::BigInt(self.difficulty),
            Value::Uint(self.timestamp),
            Value::BigInt(self.nonce),
            Value::from(self.extra.clone()),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = value.as_list()?;
        if fields.len() != HEADER_FIELDS {
            return Err(ChainError::MalformedData(format!(
                "block header has {} fields, expected {}",
                fields.len(),
                HEADER_FIELDS
            )));
        }

        Ok(BlockHeader {
            prev_hash: fields[0].as_bytes()?,
            uncle_sha: fields[1].as_bytes()?,
            coinbase: fields[2].as_bytes()?,
            state_root: fields[3].as_bytes()?,
            tx_sha: fields[4].as_bytes()?,
            difficulty: fields[5].as_big_int()?,
            timestamp: fields[6].as_u64()?,
            nonce: fields[7].as_big_int()?,
            extra: fields[8].as_bytes()?,
        })
    }

    /// SHA-256 of the header tuple with the nonce left out.
    ///
    /// The nonce is persisted with the header but is not covered by the hash.
    pub fn hash(&self) -> Hash {
        let hashed = Value::List(vec![
            Value::from(self.prev_hash.clone()),
            Value::from(self.uncle_sha.clone()),
            Value::from(self.coinbase.clone()),
            Value::from(self.state_root.clone()),
            Value::from(self.tx_sha.clone()),
            Value::BigInt(self.difficulty),
            Value::Uint(self.timestamp),
            Value::from(self.extra.clone()),
        ]);
        sha256(&codec::encode(&hashed))
    }
}

pub fn tx_sha(transactions: &[Transaction]) -> Hash {
    let encoded = transactions
        .iter()
        .map(|tx| Value::Bytes(tx.encode()))
        .collect();
    sha256(&codec::encode(&Value::List(encoded)))
}

pub fn uncle_sha(uncles: &[BlockHeader]) -> Hash {
    let headers = uncles.iter().map(BlockHeader::to_value).collect();
    sha256(&codec::encode(&Value::List(headers)))
}

#[derive(Debug, Clone, Default)]
struct BlockBody {
    transactions: Vec<Transaction>,
    uncles: Vec<BlockHeader>,
}

/// A block: header, an optional body and the account state at its root.
///
/// Blocks decoded without a body stand for uncle headers; their shas are taken
/// as decoded. For blocks with a body the shas are recomputed from the live
/// lists every time the block is hashed or encoded.
#[derive(Debug, Clone)]
pub struct Block {
    header: BlockHeader,
    body: Option<BlockBody>,
    state: Trie,
}

impl Block {
    /// Assemble a block on top of the state at `root`, creating a contract for
    /// every contract-creation transaction in `transactions`.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        db: SharedDatabase,
        root: &[u8],
        prev_hash: Vec<u8>,
        coinbase: Vec<u8>,
        difficulty: U256,
        nonce: U256,
        extra: Vec<u8>,
        transactions: Vec<Transaction>,
    ) -> Result<Self> {
        let mut state = Trie::new(db.clone(), root)?;
        for tx in transactions.iter().filter(|tx| tx.is_contract()) {
            account::create_contract(&mut state, &db, tx)?;
        }

        let header = BlockHeader {
            prev_hash,
            coinbase,
            state_root: state.root(),
            difficulty,
            timestamp: chrono::Utc::now().timestamp().max(0) as u64,
            nonce,
            extra,
            ..BlockHeader::default()
        };

        Ok(Block {
            header,
            body: Some(BlockBody {
                transactions,
                uncles: Vec::new(),
            }),
            state,
        })
    }

    /// Header with shas and state root brought in line with the current contents.
    pub fn seal(&self) -> BlockHeader {
        let mut header = self.header.clone();
        header.state_root = self.state.root();
        if let Some(body) = &self.body {
            header.tx_sha = tx_sha(&body.transactions).to_vec();
            header.uncle_sha = uncle_sha(&body.uncles).to_vec();
        }
        header
    }

    pub fn hash(&self) -> Hash {
        self.seal().hash()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn to_value(&self) -> Value {
        let header = self.seal().to_value();
        match &self.body {
            Some(body) => Value::List(vec![
                header,
                Value::List(
                    body.transactions
                        .iter()
                        .map(|tx| Value::Bytes(tx.encode()))
                        .collect(),
                ),
                Value::List(body.uncles.iter().map(BlockHeader::to_value).collect()),
            ]),
            None => Value::List(vec![header]),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        codec::encode(&self.to_value())
    }

    pub fn decode(db: SharedDatabase, data: &[u8]) -> Result<Self> {
        Self::from_value(db, &codec::decode(data)?)
    }

    /// Rebuild a block from its decoded tree. Contract creation is not replayed.
    ///
    /// The state is attached at the header's root without being read, so a
    /// block whose state lives elsewhere still decodes.
    pub fn from_value(db: SharedDatabase, value: &Value) -> Result<Self> {
        let header = BlockHeader::from_value(value.get(0)?)?;

        let transactions = value
            .try_get(1)
            .map(|txs| {
                txs.as_list()?
                    .iter()
                    .map(|tx| Transaction::decode(&tx.as_bytes()?))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;
        let uncles = value
            .try_get(2)
            .map(|uncles| {
                uncles
                    .as_list()?
                    .iter()
                    .map(BlockHeader::from_value)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let body = match (transactions, uncles) {
            (None, None) => None,
            (transactions, uncles) => Some(BlockBody {
                transactions: transactions.unwrap_or_default(),
                uncles: uncles.unwrap_or_default(),
            }),
        };

        let state = Trie::new(db, &header.state_root)?;
        Ok(Block {
            header,
            body,
            state,
        })
    }

    /// Header fields as last decoded or assembled; see [`Block::seal`] for live values.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn prev_hash(&self) -> &[u8] {
        &self.header.prev_hash
    }

    pub fn coinbase(&self) -> &[u8] {
        &self.header.coinbase
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.body
            .as_ref()
            .map(|body| body.transactions.as_slice())
            .unwrap_or(&[])
    }

    pub fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.body.get_or_insert_with(BlockBody::default).transactions
    }

    pub fn uncles(&self) -> &[BlockHeader] {
        self.body
            .as_ref()
            .map(|body| body.uncles.as_slice())
            .unwrap_or(&[])
    }

    pub fn add_uncle(&mut self, uncle: BlockHeader) {
        self.body
            .get_or_insert_with(BlockBody::default)
            .uncles
            .push(uncle);
    }

    pub fn state(&self) -> &Trie {
        &self.state
    }

    pub fn get_account(&self, address: &[u8]) -> Result<Account> {
        account::get_account(&self.state, address)
    }

    pub fn update_account(&mut self, address: &[u8], record: &Account) -> Result<()> {
        account::update_account(&mut self.state, address, record)
    }

    pub fn get_contract(&self, address: &[u8]) -> Result<Option<Contract>> {
        account::get_contract(&self.state, self.state.db(), address)
    }

    pub fn update_contract(&mut self, address: &[u8], contract: &Contract) -> Result<()> {
        account::update_contract(&mut self.state, address, contract)
    }

    /// Move `fee` from the contract at `address` to the coinbase account.
    ///
    /// Returns `Ok(false)` without touching state when the contract does not
    /// exist or cannot cover the fee.
    pub fn pay_fee(&mut self, address: &[u8], fee: U256) -> Result<bool> {
        let mut contract = match self.get_contract(address)? {
            Some(contract) if contract.balance >= fee => contract,
            Some(contract) => {
                warn!(
                    "Contract {} has insufficient funds: {} < {}",
                    hex::encode(address),
                    contract.balance,
                    fee
                );
                return Ok(false);
            }
            None => {
                warn!("No contract at {} to pay fee {}", hex::encode(address), fee);
                return Ok(false);
            }
        };

        contract.balance -= fee;
        self.update_contract(address, &contract)?;

        let coinbase = self.header.coinbase.clone();
        let mut ether = self.get_account(&coinbase)?;
        ether.add_fee(fee);
        self.update_account(&coinbase, &ether)?;

        Ok(true)
    }

    pub fn block_info(&self) -> Result<BlockInfo> {
        BlockInfo::load(self.state.db(), &self.hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::persistence::MemoryDatabase;

    fn signed_transfer(value: u64, nonce: u64) -> Transaction {
        let keypair = KeyPair::generate();
        let mut tx = Transaction::new(vec![0xaa; 20], U256::from(value), &[])
            .unwrap()
            .with_nonce(nonce);
        tx.sign(&keypair.secret_key).unwrap();
        tx
    }

    fn block_with(db: SharedDatabase, transactions: Vec<Transaction>) -> Block {
        Block::create(
            db,
            &[],
            vec![1u8; 32],
            b"miner".to_vec(),
            U256::from(1u64 << 26),
            U256::from(42),
            b"extra".to_vec(),
            transactions,
        )
        .unwrap()
    }

    #[test]
    fn test_hash_is_stable() {
        let block = block_with(MemoryDatabase::shared(), vec![signed_transfer(1, 0)]);
        assert_eq!(block.hash(), block.hash());
        assert_eq!(block.encode(), block.encode());
    }

    #[test]
    fn test_hash_tracks_transaction_list() {
        let a = signed_transfer(1, 0);
        let b = signed_transfer(2, 0);
        let mut block = block_with(MemoryDatabase::shared(), vec![a.clone(), b.clone()]);
        let original = block.hash();

        block.transactions_mut().reverse();
        let reordered = block.hash();
        assert_ne!(reordered, original);

        block.transactions_mut().pop();
        assert_ne!(block.hash(), original);
        assert_ne!(block.hash(), reordered);

        *block.transactions_mut() = vec![a, b];
        assert_eq!(block.hash(), original);
    }

    #[test]
    fn test_hash_tracks_uncles() {
        let mut block = block_with(MemoryDatabase::shared(), Vec::new());
        let before = block.hash();
        block.add_uncle(block.seal());
        assert_ne!(block.hash(), before);
        assert_eq!(block.seal().uncle_sha, uncle_sha(block.uncles()).to_vec());
    }

    #[test]
    fn test_nonce_not_covered_by_hash() {
        let header = block_with(MemoryDatabase::shared(), Vec::new()).seal();
        let mut bumped = header.clone();
        bumped.nonce = header.nonce + 1;
        assert_eq!(header.hash(), bumped.hash());
        assert_ne!(header.to_value(), bumped.to_value());

        bumped.extra = b"changed".to_vec();
        assert_ne!(header.hash(), bumped.hash());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let db = MemoryDatabase::shared();
        let mut block = block_with(db.clone(), vec![signed_transfer(3, 1), signed_transfer(4, 2)]);
        let uncle = block_with(db.clone(), Vec::new()).seal();
        block.add_uncle(uncle.clone());

        let encoded = block.encode();
        let decoded = Block::decode(db, &encoded).unwrap();

        assert_eq!(decoded.seal(), block.seal());
        assert_eq!(decoded.transactions(), block.transactions());
        assert_eq!(decoded.uncles(), &[uncle][..]);
        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn test_decode_without_local_state() {
        let block = block_with(MemoryDatabase::shared(), vec![signed_transfer(3, 1)]);
        let mut funded = block.clone();
        funded
            .update_account(b"someone", &Account::new(U256::from(7)))
            .unwrap();
        let encoded = funded.encode();

        let elsewhere = Block::decode(MemoryDatabase::shared(), &encoded).unwrap();
        assert_eq!(elsewhere.hash(), funded.hash());
        assert_eq!(elsewhere.transactions(), funded.transactions());
        assert_eq!(elsewhere.encode(), encoded);
        assert!(matches!(
            elsewhere.get_account(b"someone"),
            Err(ChainError::MissingState(_))
        ));
    }

    #[test]
    fn test_decode_header_only() {
        let db = MemoryDatabase::shared();
        let block = block_with(db.clone(), vec![signed_transfer(3, 1)]);
        let sealed = block.seal();
        let header_only = codec::encode(&Value::List(vec![sealed.to_value()]));

        let decoded = Block::decode(db, &header_only).unwrap();
        assert!(!decoded.has_body());
        assert!(decoded.transactions().is_empty());
        // shas of a header-only block are taken as decoded
        assert_eq!(decoded.seal(), sealed);
        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.encode(), header_only);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let db = MemoryDatabase::shared();
        assert!(Block::decode(db.clone(), &[]).is_err());

        let short_header = Value::List(vec![Value::List(vec![Value::from("x")])]);
        assert!(matches!(
            Block::decode(db.clone(), &codec::encode(&short_header)),
            Err(ChainError::MalformedData(_))
        ));

        let block = block_with(db.clone(), Vec::new());
        let bad_tx = Value::List(vec![
            block.seal().to_value(),
            Value::List(vec![Value::from("not a transaction")]),
            Value::empty_list(),
        ]);
        assert!(Block::decode(db, &codec::encode(&bad_tx)).is_err());
    }

    #[test]
    fn test_create_applies_contract_creation() {
        let db = MemoryDatabase::shared();
        let creation = Transaction::new(Vec::new(), U256::from(100), &["PUSH 1", "PUSH 2"]).unwrap();
        let block = block_with(db.clone(), vec![creation.clone(), signed_transfer(1, 0)]);

        let contract = block.get_contract(&creation.hash()).unwrap().unwrap();
        assert_eq!(contract.balance, U256::from(100));
        assert_eq!(
            contract.storage().get(&account::storage_key(0)).unwrap(),
            Some(b"304".to_vec())
        );
        assert_eq!(
            contract.storage().get(&account::storage_key(1)).unwrap(),
            Some(b"560".to_vec())
        );
        assert_eq!(block.seal().state_root, block.state().root());
        assert!(!block.seal().state_root.is_empty());
    }

    #[test]
    fn test_decode_does_not_replay_contract_creation() {
        let db = MemoryDatabase::shared();
        let creation = Transaction::new(Vec::new(), U256::from(100), &["STOP"]).unwrap();
        let mut block = block_with(db.clone(), vec![creation.clone()]);
        // spend part of the contract so a replay would be visible
        assert!(block.pay_fee(&creation.hash(), U256::from(40)).unwrap());

        let decoded = Block::decode(db, &block.encode()).unwrap();
        let contract = decoded.get_contract(&creation.hash()).unwrap().unwrap();
        assert_eq!(contract.balance, U256::from(60));
    }

    #[test]
    fn test_pay_fee() {
        let db = MemoryDatabase::shared();
        let creation = Transaction::new(Vec::new(), U256::from(50), &[]).unwrap();
        let address = creation.hash();
        let mut block = block_with(db, vec![creation]);

        assert!(block.pay_fee(&address, U256::from(20)).unwrap());
        assert_eq!(block.get_contract(&address).unwrap().unwrap().balance, U256::from(30));
        assert_eq!(block.get_account(b"miner").unwrap().balance, U256::from(20));

        let root = block.state().root();
        assert!(!block.pay_fee(&address, U256::from(31)).unwrap());
        assert!(!block.pay_fee(b"no such contract", U256::from(1)).unwrap());
        assert_eq!(block.state().root(), root);
    }

    #[test]
    fn test_pay_contract_fee_from_schedule() {
        use crate::blockchain::core::fees::CONTRACT_FEE;

        let creation = Transaction::new(Vec::new(), CONTRACT_FEE, &["STOP"]).unwrap();
        let address = creation.hash();
        let mut block = block_with(MemoryDatabase::shared(), vec![creation]);

        assert!(block.pay_fee(&address, CONTRACT_FEE).unwrap());
        assert_eq!(block.get_contract(&address).unwrap().unwrap().balance, U256::zero());
        assert_eq!(block.get_account(b"miner").unwrap().balance, CONTRACT_FEE);
    }

    #[test]
    fn test_account_proxy() {
        let mut block = block_with(MemoryDatabase::shared(), Vec::new());
        assert_eq!(block.get_account(b"someone").unwrap(), Account::default());
        block
            .update_account(b"someone", &Account::new(U256::from(7)))
            .unwrap();
        assert_eq!(block.get_account(b"someone").unwrap().balance, U256::from(7));
        assert_eq!(block.seal().state_root, block.state().root());
    }
}
