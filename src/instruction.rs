//! Compiler for the textual instruction words carried in transaction data.
//!
//! A word is a mnemonic followed by up to six numeric arguments, e.g. `"PUSH 1"`.
//! It compiles to a single number `op + a0 * 256 + a1 * 256^2 + ...`, stored in
//! decimal form.

use crate::error::{ChainError, Result};
use primitive_types::U256;

pub const MAX_ARGUMENTS: usize = 6;

const OPCODES: &[(&str, u8)] = &[
    ("STOP", 0),
    ("ADD", 1),
    ("MUL", 2),
    ("SUB", 3),
    ("DIV", 4),
    ("SDIV", 5),
    ("MOD", 6),
    ("SMOD", 7),
    ("EXP", 8),
    ("NEG", 9),
    ("LT", 10),
    ("LE", 11),
    ("GT", 12),
    ("GE", 13),
    ("EQ", 14),
    ("NOT", 15),
    ("MYADDRESS", 16),
    ("TXSENDER", 17),
    ("TXVALUE", 18),
    ("TXFEE", 19),
    ("TXDATAN", 20),
    ("TXDATA", 21),
    ("BLK_PREVHASH", 22),
    ("BLK_COINBASE", 23),
    ("BLK_TIMESTAMP", 24),
    ("BLK_NUMBER", 25),
    ("BLK_DIFFICULTY", 26),
    ("BASEFEE", 27),
    ("SHA256", 32),
    ("RIPEMD160", 33),
    ("ECMUL", 34),
    ("ECADD", 35),
    ("ECSIGN", 36),
    ("ECRECOVER", 37),
    ("ECVALID", 38),
    ("SHA3", 39),
    ("PUSH", 48),
    ("POP", 49),
    ("DUP", 50),
    ("SWAP", 51),
    ("MLOAD", 52),
    ("MSTORE", 53),
    ("SLOAD", 54),
    ("SSTORE", 55),
    ("JMP", 56),
    ("JMPI", 57),
    ("IND", 58),
    ("EXTRO", 59),
    ("BALANCE", 60),
    ("MKTX", 61),
    ("SUICIDE", 62),
];

pub fn opcode(mnemonic: &str) -> Option<u8> {
    OPCODES
        .iter()
        .find(|(name, _)| *name == mnemonic)
        .map(|(_, code)| *code)
}

fn parse_argument(token: &str) -> Result<U256> {
    let parsed = match token.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_dec_str(token).ok(),
    };
    parsed.ok_or_else(|| ChainError::InvalidInstruction(format!("bad argument: {}", token)))
}

pub fn compile_instr(word: &str) -> Result<String> {
    let mut tokens = word.split_whitespace();
    let mnemonic = tokens
        .next()
        .ok_or_else(|| ChainError::InvalidInstruction("empty instruction".to_string()))?;
    let op = opcode(mnemonic)
        .ok_or_else(|| ChainError::InvalidInstruction(format!("OP not found: {}", mnemonic)))?;

    let mut compiled = U256::from(op);
    let mut base = U256::one();
    for (i, token) in tokens.enumerate() {
        if i >= MAX_ARGUMENTS {
            return Err(ChainError::InvalidInstruction(format!(
                "too many arguments in {:?} (max {})",
                word, MAX_ARGUMENTS
            )));
        }
        base = base * U256::from(256u32);
        let arg = parse_argument(token)?;
        compiled = arg
            .checked_mul(base)
            .and_then(|shifted| shifted.checked_add(compiled))
            .ok_or_else(|| ChainError::InvalidInstruction(format!("overflow in {:?}", word)))?;
    }

    Ok(compiled.to_string())
}
