// Thin re-export module: implementation is in `blockchain/core.rs` with one
// submodule per concern (block layout, genesis, chain index).

pub mod core;
pub use core::*;
