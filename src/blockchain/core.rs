// core.rs splits the chain into the block type, the genesis block, the fee
// schedule and chain management.
pub mod block;
pub mod chain;
pub mod fees;
pub mod genesis;

pub use block::*;
pub use chain::*;
pub use fees::*;
pub use genesis::*;
