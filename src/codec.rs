//! Canonical encoding for every persisted and broadcast structure.
//!
//! Values are built as a tagged tree and written in the RLP wire format. Decoding
//! produces the same tree with every scalar as [`Value::Bytes`]; callers then pull
//! fields out by position with the typed accessors, each of which checks the shape
//! it expects and fails with [`ChainError::MalformedData`] instead of guessing.

use crate::error::{ChainError, Result};
use primitive_types::U256;
use rlp::{Encodable, Rlp, RlpStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    Uint(u64),
    BigInt(U256),
    List(Vec<Value>),
}

impl Value {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    pub fn empty_list() -> Self {
        Value::List(Vec::new())
    }

    /// Child at `index`. Fails if this is not a list or the index is out of range.
    pub fn get(&self, index: usize) -> Result<&Value> {
        self.as_list()?.get(index).ok_or_else(|| {
            ChainError::MalformedData(format!("index {} out of range", index))
        })
    }

    /// Child at `index`, `None` when the position is absent.
    pub fn try_get(&self, index: usize) -> Option<&Value> {
        match self {
            Value::List(items) => items.get(index),
            _ => None,
        }
    }

    /// Number of children of a list, or the byte length of a scalar.
    pub fn len(&self) -> usize {
        match self {
            Value::List(items) => items.len(),
            Value::Bytes(data) => data.len(),
            Value::Uint(_) | Value::BigInt(_) => self.encoded_scalar().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for the empty string and the empty list.
    pub fn is_nil(&self) -> bool {
        self.is_empty()
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(ChainError::MalformedData(format!(
                "expected list, found {}",
                other.kind()
            ))),
        }
    }

    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Value::Bytes(data) => Ok(data.clone()),
            Value::Uint(_) | Value::BigInt(_) => Ok(self.encoded_scalar()),
            Value::List(_) => Err(ChainError::MalformedData(
                "expected bytes, found list".to_string(),
            )),
        }
    }

    pub fn as_string(&self) -> Result<String> {
        String::from_utf8(self.as_bytes()?)
            .map_err(|e| ChainError::MalformedData(format!("invalid utf-8 string: {}", e)))
    }

    pub fn as_u64(&self) -> Result<u64> {
        match self {
            Value::Uint(n) => Ok(*n),
            _ => {
                let data = self.as_bytes()?;
                if data.len() > 8 {
                    return Err(ChainError::MalformedData(format!(
                        "integer of {} bytes does not fit in u64",
                        data.len()
                    )));
                }
                Ok(data.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
            }
        }
    }

    pub fn as_big_int(&self) -> Result<U256> {
        match self {
            Value::BigInt(n) => Ok(*n),
            Value::Uint(n) => Ok(U256::from(*n)),
            _ => {
                let data = self.as_bytes()?;
                if data.len() > 32 {
                    return Err(ChainError::MalformedData(format!(
                        "integer of {} bytes does not fit in 256 bits",
                        data.len()
                    )));
                }
                Ok(U256::from_big_endian(&data))
            }
        }
    }

    /// Canonical encoding of this node, for re-embedding a decoded subtree.
    pub fn as_raw(&self) -> Vec<u8> {
        encode(self)
    }

    fn encoded_scalar(&self) -> Vec<u8> {
        match self {
            Value::Uint(n) => trim_leading_zeros(&n.to_be_bytes()),
            Value::BigInt(n) => {
                let mut buf = [0u8; 32];
                n.to_big_endian(&mut buf);
                trim_leading_zeros(&buf)
            }
            Value::Bytes(data) => data.clone(),
            Value::List(_) => Vec::new(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "bytes",
            Value::Uint(_) => "uint",
            Value::BigInt(_) => "bigint",
            Value::List(_) => "list",
        }
    }
}

fn trim_leading_zeros(data: &[u8]) -> Vec<u8> {
    let start = data.iter().position(|b| *b != 0).unwrap_or(data.len());
    data[start..].to_vec()
}

impl Encodable for Value {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            // scalars write straight to the encoder; the enclosing `append`
            // counts the item
            Value::Bytes(data) => s.encoder().encode_value(data),
            Value::Uint(n) => n.rlp_append(s),
            Value::BigInt(n) => n.rlp_append(s),
            Value::List(items) => {
                s.begin_list(items.len());
                for item in items {
                    s.append(item);
                }
            }
        }
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<U256> for Value {
    fn from(n: U256) -> Self {
        Value::BigInt(n)
    }
}

impl From<Vec<u8>> for Value {
    fn from(data: Vec<u8>) -> Self {
        Value::Bytes(data)
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::Bytes(data.to_vec())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

pub fn encode(value: &Value) -> Vec<u8> {
    rlp::encode(value).to_vec()
}

/// Decode a complete item. Trailing bytes after the first item are rejected.
pub fn decode(data: &[u8]) -> Result<Value> {
    if data.is_empty() {
        return Err(ChainError::MalformedData("empty input".to_string()));
    }
    let rlp = Rlp::new(data);
    let total = rlp.payload_info()?.total();
    if total != data.len() {
        return Err(ChainError::MalformedData(format!(
            "{} trailing bytes after item",
            data.len().saturating_sub(total)
        )));
    }
    from_rlp(&rlp)
}

fn from_rlp(rlp: &Rlp) -> Result<Value> {
    if rlp.is_list() {
        let count = rlp.item_count()?;
        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            items.push(from_rlp(&rlp.at(i)?)?);
        }
        Ok(Value::List(items))
    } else {
        Ok(Value::Bytes(rlp.data()?.to_vec()))
    }
}
