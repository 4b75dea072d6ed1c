//! Ledgercore - an account-based ledger core
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the genesis block and the chain index
//! - [`transaction`] - Transactions, signing and sender recovery
//! - [`account`] - Account and contract records kept in state
//! - [`mempool`] - Transaction pool with its validation worker
//!
//! ## Contracts
//! - [`instruction`] - Textual instruction compiler
//!
//! ## Cryptography
//! - [`crypto`] - Hashing, addresses and recoverable signatures (secp256k1)
//!
//! ## Storage & Encoding
//! - [`persistence`] - Durable key/value stores (SQLite, in-memory)
//! - [`trie`] - Account state store
//! - [`codec`] - Canonical RLP encoding
//!
//! ## Networking
//! - [`network`] - Outbound broadcast seam
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod account;
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Contracts
// ============================================================================
pub mod instruction;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Storage & Encoding
// ============================================================================
pub mod codec;
pub mod persistence;
pub mod trie;

// ============================================================================
// Networking
// ============================================================================
pub mod network;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
