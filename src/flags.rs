//! Hook capability flags encoded in the leading bits of a hook address.
//!
//! The pool manager reads these bits to decide which callbacks to invoke, so a
//! hook has to be deployed at an address that carries exactly the flags it
//! implements within the flag window.

use alloy_primitives::{Address, U256};

/// Returns a `U256` with only bit `index` set.
const fn bit(index: usize) -> U256 {
    let mut limbs = [0u64; 4];
    limbs[index / 64] = 1 << (index % 64);
    U256::from_limbs(limbs)
}

/// The hook is called before every swap.
pub const BEFORE_SWAP_FLAG: U256 = bit(153);

/// The hook is called after every swap.
pub const AFTER_SWAP_FLAG: U256 = bit(152);

/// The hook may take the pool manager lock.
pub const ACCESS_LOCK_FLAG: U256 = bit(148);

/// The 12-bit flag window, bits 148 through 159.
pub const FLAG_MASK: U256 = U256::from_limbs([0, 0, 0xfff << 20, 0]);

/// Flags the Oink hook implements.
pub const HOOK_FLAGS: U256 = U256::from_limbs([
    0,
    0,
    BEFORE_SWAP_FLAG.as_limbs()[2]
        | AFTER_SWAP_FLAG.as_limbs()[2]
        | ACCESS_LOCK_FLAG.as_limbs()[2],
    0,
]);

/// Bit width of an address.
const ADDRESS_BITS: usize = 160;

/// A mask and the exact value the masked address bits must equal.
///
/// Both operate on the address read as a big-endian integer, zero-extended to
/// 256 bits, so bits at or above 160 are legal and simply never set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookFlags {
    mask: U256,
    required: U256,
}

impl HookFlags {
    pub const fn new(mask: U256, required: U256) -> Self {
        Self { mask, required }
    }

    pub const fn mask(&self) -> U256 {
        self.mask
    }

    pub const fn required(&self) -> U256 {
        self.required
    }

    /// Returns `true` if `address & mask == required`.
    #[inline]
    pub fn matches(&self, address: &Address) -> bool {
        address_to_uint(address) & self.mask == self.required
    }

    /// Returns `false` when no address can ever satisfy the pair: a required
    /// bit lies outside the mask or beyond the width of an address.
    pub fn is_satisfiable(&self) -> bool {
        self.required & !self.mask == U256::ZERO && self.required.bit_len() <= ADDRESS_BITS
    }
}

impl Default for HookFlags {
    fn default() -> Self {
        Self::new(FLAG_MASK, HOOK_FLAGS)
    }
}

/// Reads a 20-byte address as its big-endian numeric value.
#[inline]
pub fn address_to_uint(address: &Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}
