/// Transaction type and its canonical encoding
use crate::codec::{self, Value};
use crate::crypto::{keccak256, Hash};
use crate::error::{ChainError, Result};
use crate::instruction::compile_instr;
use primitive_types::U256;

/// A value transfer, or a contract creation when `recipient` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub recipient: Vec<u8>,
    pub value: U256,
    /// Compiled instruction words
    pub data: Vec<String>,
    pub(crate) v: u8,
    pub(crate) r: Vec<u8>,
    pub(crate) s: Vec<u8>,
}

impl Transaction {
    /// Build an unsigned transaction, compiling each textual instruction in `data`.
    pub fn new(recipient: Vec<u8>, value: U256, data: &[&str]) -> Result<Self> {
        let data = data
            .iter()
            .map(|word| compile_instr(word))
            .collect::<Result<Vec<_>>>()?;

        Ok(Transaction {
            nonce: 0,
            recipient,
            value,
            data,
            v: 0,
            r: Vec::new(),
            s: Vec::new(),
        })
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn is_contract(&self) -> bool {
        self.recipient.is_empty()
    }

    /// Keccak-256 over `(nonce, recipient, value, data)`. Signature fields are not covered.
    pub fn hash(&self) -> Hash {
        let unsigned = Value::List(vec![
            Value::Uint(self.nonce),
            Value::from(self.recipient.clone()),
            Value::BigInt(self.value),
            self.data_value(),
        ]);
        keccak256(&codec::encode(&unsigned))
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn v(&self) -> u8 {
        self.v
    }

    pub fn r(&self) -> &[u8] {
        &self.r
    }

    pub fn s(&self) -> &[u8] {
        &self.s
    }

    fn data_value(&self) -> Value {
        Value::List(self.data.iter().map(|w| Value::from(w.as_str())).collect())
    }

    pub fn to_value(&self) -> Value {
        Value::List(vec![
            Value::Uint(self.nonce),
            Value::from(self.recipient.clone()),
            Value::BigInt(self.value),
            self.data_value(),
            Value::Uint(u64::from(self.v)),
            Value::from(self.r.clone()),
            Value::from(self.s.clone()),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let data = value
            .get(3)?
            .as_list()?
            .iter()
            .map(Value::as_string)
            .collect::<Result<Vec<_>>>()?;
        let v = value.get(4)?.as_u64()?;

        Ok(Transaction {
            nonce: value.get(0)?.as_u64()?,
            recipient: value.get(1)?.as_bytes()?,
            value: value.get(2)?.as_big_int()?,
            data,
            v: u8::try_from(v).map_err(|_| {
                ChainError::MalformedData(format!("recovery byte {} out of range", v))
            })?,
            r: value.get(5)?.as_bytes()?,
            s: value.get(6)?.as_bytes()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        codec::encode(&self.to_value())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::from_value(&codec::decode(data)?)
    }
}
