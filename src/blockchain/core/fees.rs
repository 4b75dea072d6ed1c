//! Fee and block reward schedule.
//!
//! Amounts are in the smallest unit. Nothing here is charged automatically:
//! callers pick an amount and settle it with [`Block::pay_fee`](super::block::Block::pay_fee).

use primitive_types::U256;

/// Per-step execution fee, 10^16.
pub const STEP_FEE: U256 = U256([10_000_000_000_000_000, 0, 0, 0]);
/// Base transaction fee, 2^64.
pub const TX_FEE: U256 = U256([0, 1, 0, 0]);
/// Contract creation fee, 2^64.
pub const CONTRACT_FEE: U256 = U256([0, 1, 0, 0]);
/// Memory fee, 2^62.
pub const MEM_FEE: U256 = U256([1 << 62, 0, 0, 0]);
/// Data fee, 2^60.
pub const DATA_FEE: U256 = U256([1 << 60, 0, 0, 0]);
/// Crypto operation fee, 2^60.
pub const CRYPTO_FEE: U256 = U256([1 << 60, 0, 0, 0]);
/// Fee for the remaining operations, 2^60.
pub const EXTRO_FEE: U256 = U256([1 << 60, 0, 0, 0]);

/// Block reward in the first period, 2^90. Each later period halves it.
pub const PERIOD_1_REWARD: U256 = U256([0, 1 << 26, 0, 0]);
pub const PERIOD_2_REWARD: U256 = U256([0, 1 << 25, 0, 0]);
pub const PERIOD_3_REWARD: U256 = U256([0, 1 << 24, 0, 0]);
pub const PERIOD_4_REWARD: U256 = U256([0, 1 << 23, 0, 0]);

#[cfg(test)]
mod tests {
    use super::*;

    fn pow2(exp: u32) -> U256 {
        U256::from(2).pow(U256::from(exp))
    }

    #[test]
    fn test_fee_schedule_values() {
        assert_eq!(STEP_FEE, U256::exp10(16));
        assert_eq!(TX_FEE, pow2(64));
        assert_eq!(CONTRACT_FEE, pow2(64));
        assert_eq!(MEM_FEE, pow2(64) / 4);
        assert_eq!(DATA_FEE, pow2(64) / 16);
        assert_eq!(CRYPTO_FEE, DATA_FEE);
        assert_eq!(EXTRO_FEE, DATA_FEE);
    }

    #[test]
    fn test_reward_halves_per_period() {
        assert_eq!(PERIOD_1_REWARD, pow2(80) * 1024);
        assert_eq!(PERIOD_2_REWARD, PERIOD_1_REWARD / 2);
        assert_eq!(PERIOD_3_REWARD, PERIOD_2_REWARD / 2);
        assert_eq!(PERIOD_4_REWARD, PERIOD_3_REWARD / 2);
    }
}
