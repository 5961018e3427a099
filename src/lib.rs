//! Mines CREATE2 salts for the Oink hook.
//!
//! The pool manager decides which hook callbacks to invoke by reading flag
//! bits out of the hook's address, so the hook must be deployed at an address
//! whose flag window holds exactly its capabilities. This crate derives CREATE2
//! addresses for increasing salts until one carries the required flags.

pub mod cli;
pub mod create2;
pub mod error;
pub mod flags;
pub mod init_code;
pub mod mine;

pub use create2::{create2_address, create2_address_from_hash};
pub use error::Error;
pub use flags::HookFlags;
pub use init_code::{ArgEncoding, ConstructorArgs, InitCode};
pub use mine::{CancelToken, Create2Miner, Found, MAX_LOOP, MineError, Miner, SaltSearch};
