//! CREATE2 address derivation.
//!
//! `address = keccak256(0xff ‖ deployer ‖ salt ‖ keccak256(init_code))[12..32]`

use alloy_primitives::{Address, B256, keccak256};

/// Length of the CREATE2 preimage: 1 + 20 + 32 + 32 bytes.
const PREIMAGE_LEN: usize = 85;

/// Computes the address a contract with `init_code` lands at when `deployer`
/// creates it through CREATE2 with `salt`.
pub fn create2_address(deployer: &Address, salt: &B256, init_code: &[u8]) -> Address {
    create2_address_from_hash(deployer, salt, &keccak256(init_code))
}

/// Same as [`create2_address`], but takes the keccak256 of the init code
/// directly so callers deriving many addresses only hash the code once.
pub fn create2_address_from_hash(
    deployer: &Address,
    salt: &B256,
    init_code_hash: &B256,
) -> Address {
    let mut preimage = [0u8; PREIMAGE_LEN];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(deployer.as_slice());
    preimage[21..53].copy_from_slice(salt.as_slice());
    preimage[53..85].copy_from_slice(init_code_hash.as_slice());

    let digest = keccak256(preimage);
    Address::from_slice(&digest[12..])
}
