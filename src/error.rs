//! Error types for the ledger core

use primitive_types::U256;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Insufficient funds: balance {balance} is below value {value}")]
    InsufficientFunds { balance: U256, value: U256 },
    #[error("Invalid nonce {got} (expected {expected})")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("Invalid signature: sender could not be recovered")]
    InvalidSignature,
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),
    #[error("Malformed data: {0}")]
    MalformedData(String),
    #[error("Missing state for root {0}")]
    MissingState(String),
    #[error("Block not found: {0}")]
    BlockNotFound(String),
    #[error("No last block on the block chain")]
    NoChainHead,
    #[error("Transaction pool is closed")]
    PoolClosed,
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<rlp::DecoderError> for ChainError {
    fn from(err: rlp::DecoderError) -> Self {
        ChainError::MalformedData(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::DatabaseError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
