//! Hook creation code: the compiled bytecode template followed by the encoded
//! constructor arguments.

use std::{fmt, str::FromStr};

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};

/// How constructor arguments are appended to the bytecode template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgEncoding {
    /// Raw 20-byte addresses followed by the fee in as few bytes as it takes.
    #[default]
    Packed,
    /// Solidity ABI encoding: every argument occupies a 32-byte word.
    Abi,
}

impl FromStr for ArgEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "packed" => Ok(Self::Packed),
            "abi" => Ok(Self::Abi),
            other => Err(format!("unknown encoding `{other}`, expected `packed` or `abi`")),
        }
    }
}

impl fmt::Display for ArgEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Packed => f.write_str("packed"),
            Self::Abi => f.write_str("abi"),
        }
    }
}

/// Arguments passed to the hook constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructorArgs {
    pub pool_manager: Address,
    pub token: Address,
    pub creator: Address,
    pub creator_fee_bps: u64,
}

impl ConstructorArgs {
    pub fn encode(&self, encoding: ArgEncoding) -> Vec<u8> {
        match encoding {
            ArgEncoding::Packed => {
                let fee = minimal_be_bytes(self.creator_fee_bps);
                let mut out = Vec::with_capacity(60 + fee.len());
                out.extend_from_slice(self.pool_manager.as_slice());
                out.extend_from_slice(self.token.as_slice());
                out.extend_from_slice(self.creator.as_slice());
                out.extend_from_slice(&fee);
                out
            }
            ArgEncoding::Abi => {
                let mut out = Vec::with_capacity(128);
                out.extend_from_slice(self.pool_manager.into_word().as_slice());
                out.extend_from_slice(self.token.into_word().as_slice());
                out.extend_from_slice(self.creator.into_word().as_slice());
                out.extend_from_slice(&U256::from(self.creator_fee_bps).to_be_bytes::<32>());
                out
            }
        }
    }
}

/// Big-endian bytes of `value` without leading zero bytes. Zero keeps a
/// single byte.
fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[start..].to_vec()
}

/// Immutable creation code of a hook, with its hash cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitCode {
    code: Bytes,
    hash: B256,
}

impl InitCode {
    /// Wraps already assembled creation code.
    pub fn new(code: impl Into<Bytes>) -> Self {
        let code = code.into();
        let hash = keccak256(&code);
        Self { code, hash }
    }

    /// Appends the encoded `args` to `bytecode`.
    pub fn with_args(bytecode: &[u8], args: &ConstructorArgs, encoding: ArgEncoding) -> Self {
        let mut code = bytecode.to_vec();
        code.extend_from_slice(&args.encode(encoding));
        Self::new(code)
    }

    pub fn code(&self) -> &Bytes {
        &self.code
    }

    /// keccak256 of the creation code.
    pub fn hash(&self) -> B256 {
        self.hash
    }
}
