//! Account state: externally owned accounts and contracts.
//!
//! Records are transient values read from and written back to a [`StateTrie`].
//! Nothing here owns durable data; the only way a change sticks is an explicit
//! [`update_account`] (or [`update_contract`]).

use crate::codec::{self, Value};
use crate::error::Result;
use crate::persistence::SharedDatabase;
use crate::transaction::Transaction;
use crate::trie::{StateTrie, Trie};
use primitive_types::U256;
use std::fmt;
use tracing::debug;

/// Externally owned account: a balance and a replay-protection nonce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
}

impl Account {
    pub fn new(balance: U256) -> Self {
        Account { balance, nonce: 0 }
    }

    pub fn add_fee(&mut self, fee: U256) {
        self.balance = self.balance.saturating_add(fee);
    }

    pub fn encode(&self) -> Vec<u8> {
        codec::encode(&Value::List(vec![
            Value::BigInt(self.balance),
            Value::Uint(self.nonce),
            Value::bytes(Vec::new()),
        ]))
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let decoded = codec::decode(data)?;
        Ok(Account {
            balance: decoded.get(0)?.as_big_int()?,
            nonce: decoded.get(1)?.as_u64()?,
        })
    }
}

/// Load the account at `address`, or a fresh zero-balance record if none exists.
pub fn get_account<S: StateTrie + ?Sized>(state: &S, address: &[u8]) -> Result<Account> {
    match state.get(address)? {
        Some(data) => Account::decode(&data),
        None => Ok(Account::default()),
    }
}

pub fn update_account<S: StateTrie + ?Sized>(
    state: &mut S,
    address: &[u8],
    account: &Account,
) -> Result<()> {
    state.update(address, &account.encode())
}

/// Contract account: balance and nonce plus its own storage namespace.
#[derive(Clone)]
pub struct Contract {
    pub balance: U256,
    pub nonce: u64,
    storage: Trie,
}

impl Contract {
    pub fn new(db: SharedDatabase, balance: U256, root: &[u8]) -> Result<Self> {
        Ok(Contract {
            balance,
            nonce: 0,
            storage: Trie::new(db, root)?,
        })
    }

    pub fn decode(db: SharedDatabase, data: &[u8]) -> Result<Self> {
        let decoded = codec::decode(data)?;
        Ok(Contract {
            balance: decoded.get(0)?.as_big_int()?,
            nonce: decoded.get(1)?.as_u64()?,
            storage: Trie::new(db, &decoded.get(2)?.as_bytes()?)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        codec::encode(&Value::List(vec![
            Value::BigInt(self.balance),
            Value::Uint(self.nonce),
            Value::bytes(self.storage.root()),
        ]))
    }

    pub fn storage(&self) -> &Trie {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Trie {
        &mut self.storage
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("balance", &self.balance)
            .field("nonce", &self.nonce)
            .field("storage", &self.storage)
            .finish()
    }
}

pub fn get_contract<S: StateTrie + ?Sized>(
    state: &S,
    db: &SharedDatabase,
    address: &[u8],
) -> Result<Option<Contract>> {
    state
        .get(address)?
        .map(|data| Contract::decode(db.clone(), &data))
        .transpose()
}

pub fn update_contract<S: StateTrie + ?Sized>(
    state: &mut S,
    address: &[u8],
    contract: &Contract,
) -> Result<()> {
    state.update(address, &contract.encode())
}

/// Storage key of the `index`-th code word: `index` as a 32-byte big-endian integer.
pub fn storage_key(index: usize) -> Vec<u8> {
    let mut key = [0u8; 32];
    U256::from(index).to_big_endian(&mut key);
    key.to_vec()
}

/// Materialize the contract created by `tx` and return its address (`tx.hash()`).
///
/// The contract is funded with `tx.value` and each data word is written to its
/// storage under [`storage_key`] of its position.
pub fn create_contract<S: StateTrie + ?Sized>(
    state: &mut S,
    db: &SharedDatabase,
    tx: &Transaction,
) -> Result<Vec<u8>> {
    let address = tx.hash().to_vec();
    let mut contract = Contract::new(db.clone(), tx.value, &[])?;
    for (i, word) in tx.data.iter().enumerate() {
        contract.storage_mut().update(&storage_key(i), word.as_bytes())?;
    }
    update_contract(state, &address, &contract)?;

    debug!(
        "Created contract {} with {} code words",
        hex::encode(&address),
        tx.data.len()
    );
    Ok(address)
}
