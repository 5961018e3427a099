use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_primitives::{Address, B256, Bytes, U256};

use crate::{
    flags::HookFlags,
    init_code::{ArgEncoding, ConstructorArgs, InitCode},
    mine::{Create2Miner, MAX_LOOP, SaltSearch},
};

/// Command-line interface for the Oink hook miner.
///
/// Mines a CREATE2 salt that places the Oink hook at an address whose leading
/// bits carry the hook's capability flags.
#[derive(Clone, Debug, clap::Parser)]
#[command(
    name = "oink-hook-miner",
    about = "Mines a CREATE2 salt for the Oink hook so its address carries the required hook flags."
)]
pub enum HookMiner {
    /// Mines the lowest salt whose hook address carries the required flags.
    Mine {
        #[command(flatten)]
        deployment: DeploymentArgs,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Computes the hook address for a given salt and checks its flags.
    Address {
        #[command(flatten)]
        deployment: DeploymentArgs,

        /// The 32-byte CREATE2 salt.
        salt: B256,
    },
}

/// Everything that determines the hook address apart from the salt.
#[derive(Clone, Debug, clap::Args)]
pub struct DeploymentArgs {
    /// Address that performs the CREATE2 deployment.
    #[arg(long, env = "HOOK_MINER_DEPLOYER")]
    pub deployer: Address,

    /// Address of the pool manager.
    #[arg(long, env = "HOOK_MINER_POOL_MANAGER")]
    pub pool_manager: Address,

    /// Address of the Oink token.
    #[arg(long, alias = "oink", env = "HOOK_MINER_TOKEN")]
    pub token: Address,

    /// Address of the hook creator.
    #[arg(long, env = "HOOK_MINER_CREATOR")]
    pub creator: Address,

    /// Creator fee in basis points.
    #[arg(long, env = "HOOK_MINER_CREATOR_FEE_BPS")]
    pub creator_fee_bps: u64,

    /// Hook creation bytecode as a hex string, without constructor arguments.
    #[arg(long, value_parser = parse_hex_bytes, env = "HOOK_MINER_BYTECODE")]
    pub bytecode: Option<Bytes>,

    /// File containing the hook creation bytecode as hex.
    #[arg(long, env = "HOOK_MINER_BYTECODE_FILE")]
    pub bytecode_file: Option<PathBuf>,

    /// How constructor arguments are appended to the bytecode: `packed` or `abi`.
    #[arg(long, default_value_t = ArgEncoding::Packed, env = "HOOK_MINER_ENCODING")]
    pub encoding: ArgEncoding,

    /// Hex mask selecting the flag bits. Defaults to bits 148 through 159.
    #[arg(long, value_parser = parse_hex_u256, env = "HOOK_MINER_MASK")]
    pub mask: Option<U256>,

    /// Hex value the masked address bits must equal. Defaults to the Oink
    /// hook's before-swap, after-swap and access-lock flags.
    #[arg(long, value_parser = parse_hex_u256, env = "HOOK_MINER_FLAGS")]
    pub flags: Option<U256>,
}

impl DeploymentArgs {
    pub fn constructor_args(&self) -> ConstructorArgs {
        ConstructorArgs {
            pool_manager: self.pool_manager,
            token: self.token,
            creator: self.creator,
            creator_fee_bps: self.creator_fee_bps,
        }
    }

    /// Loads the bytecode template and appends the constructor arguments.
    pub fn init_code(&self) -> Result<InitCode, ConfigError> {
        let bytecode = match (&self.bytecode, &self.bytecode_file) {
            (Some(bytecode), None) => bytecode.clone(),
            (None, Some(path)) => read_bytecode_file(path)?,
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingBytecode),
            (None, None) => return Err(ConfigError::MissingBytecode),
        };
        if bytecode.is_empty() {
            return Err(ConfigError::EmptyBytecode);
        }
        Ok(InitCode::with_args(
            &bytecode,
            &self.constructor_args(),
            self.encoding,
        ))
    }

    /// Builds the CREATE2 miner for this deployment.
    pub fn miner(&self) -> Result<Create2Miner, ConfigError> {
        Ok(Create2Miner::new(self.deployer, &self.init_code()?))
    }

    pub fn hook_flags(&self) -> HookFlags {
        let defaults = HookFlags::default();
        HookFlags::new(
            self.mask.unwrap_or(defaults.mask()),
            self.flags.unwrap_or(defaults.required()),
        )
    }
}

/// Bounds and execution of the salt search.
#[derive(Clone, Debug, clap::Args)]
pub struct SearchArgs {
    /// Number of salts to try, starting from zero.
    #[arg(long, default_value_t = MAX_LOOP, env = "HOOK_MINER_MAX_LOOP")]
    pub max_loop: u64,

    /// Worker threads sharing the search. One searches sequentially.
    #[arg(short, long, default_value_t = 1, env = "HOOK_MINER_WORKERS")]
    pub workers: usize,

    /// Give up after this many seconds.
    #[arg(long, env = "HOOK_MINER_TIMEOUT")]
    pub timeout: Option<u64>,
}

impl SearchArgs {
    /// Validates the bounds and builds a search for `flags`.
    pub fn salt_search(&self, flags: HookFlags) -> Result<SaltSearch, ConfigError> {
        if self.max_loop == 0 {
            return Err(ConfigError::ZeroMaxLoop);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        let mut search = SaltSearch::new(flags)
            .with_max_loop(self.max_loop)
            .with_workers(self.workers);
        if let Some(secs) = self.timeout {
            search = search.with_timeout(Duration::from_secs(secs));
        }
        Ok(search)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no bytecode given, pass --bytecode or --bytecode-file")]
    MissingBytecode,
    #[error("--bytecode and --bytecode-file are mutually exclusive")]
    ConflictingBytecode,
    #[error("bytecode is empty")]
    EmptyBytecode,
    #[error("failed to read bytecode file {}: {source}", .path.display())]
    ReadBytecode {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid bytecode hex in {}: {source}", .path.display())]
    InvalidBytecode {
        path: PathBuf,
        #[source]
        source: hex::FromHexError,
    },
    #[error("--max-loop must be at least 1")]
    ZeroMaxLoop,
    #[error("--workers must be at least 1")]
    ZeroWorkers,
}

fn read_bytecode_file(path: &Path) -> Result<Bytes, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadBytecode {
        path: path.to_path_buf(),
        source,
    })?;
    decode_hex(&contents).map_err(|source| ConfigError::InvalidBytecode {
        path: path.to_path_buf(),
        source,
    })
}

/// Decodes hex bytes, with or without `0x` and surrounding whitespace.
fn decode_hex(s: &str) -> Result<Bytes, hex::FromHexError> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits).map(Bytes::from)
}

fn parse_hex_bytes(s: &str) -> Result<Bytes, String> {
    decode_hex(s).map_err(|err| format!("invalid hex bytes `{s}`: {err}"))
}

/// Parses a hex integer, with or without `0x`.
fn parse_hex_u256(s: &str) -> Result<U256, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    U256::from_str_radix(digits, 16).map_err(|err| format!("invalid hex value `{s}`: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        create2::create2_address,
        flags::{FLAG_MASK, HOOK_FLAGS, address_to_uint},
        mine::{Miner, salt_from_index},
    };
    use alloy_primitives::address;
    use clap::Parser;

    const ADDRESSES: [&str; 8] = [
        "--deployer",
        "0x4e59b44847b379578588920cA78FbF26c0B4956C",
        "--pool-manager",
        "0x1111111111111111111111111111111111111111",
        "--token",
        "0x2222222222222222222222222222222222222222",
        "--creator",
        "0x3333333333333333333333333333333333333333",
    ];

    fn parse(extra: &[&str]) -> HookMiner {
        let args = ["oink-hook-miner", "mine"]
            .into_iter()
            .chain(ADDRESSES)
            .chain(["--creator-fee-bps", "500"])
            .chain(extra.iter().copied());
        HookMiner::try_parse_from(args).unwrap()
    }

    fn mine_args(extra: &[&str]) -> (DeploymentArgs, SearchArgs) {
        match parse(extra) {
            HookMiner::Mine { deployment, search } => (deployment, search),
            other => panic!("expected mine, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_defaults() {
        let (deployment, search) = mine_args(&["--bytecode", "0x6080"]);
        assert_eq!(deployment.creator_fee_bps, 500);
        assert_eq!(deployment.encoding, ArgEncoding::Packed);
        assert_eq!(deployment.hook_flags(), HookFlags::default());
        assert_eq!(search.max_loop, MAX_LOOP);
        assert_eq!(search.workers, 1);
        assert_eq!(search.timeout, None);

        let init_code = deployment.init_code().unwrap();
        assert_eq!(&init_code.code()[..2], &[0x60, 0x80]);
        assert_eq!(init_code.code().len(), 2 + 60 + 2);
    }

    #[test]
    fn test_custom_flags() {
        let (deployment, _) = mine_args(&["--bytecode", "60", "--mask", "0xff", "--flags", "a0"]);
        let flags = deployment.hook_flags();
        assert_eq!(flags.mask(), U256::from(0xff));
        assert_eq!(flags.required(), U256::from(0xa0));

        let (deployment, _) = mine_args(&["--bytecode", "60", "--flags", "0x1"]);
        assert_eq!(deployment.hook_flags().mask(), FLAG_MASK);
        assert_ne!(deployment.hook_flags().required(), HOOK_FLAGS);

        let bad = ["oink-hook-miner", "mine"]
            .into_iter()
            .chain(ADDRESSES)
            .chain(["--creator-fee-bps", "1", "--mask", "xyz"]);
        assert!(HookMiner::try_parse_from(bad).is_err());
    }

    #[test]
    fn test_bytecode_sources() {
        let (deployment, _) = mine_args(&[]);
        assert!(matches!(deployment.init_code(), Err(ConfigError::MissingBytecode)));

        let (deployment, _) = mine_args(&["--bytecode", "60", "--bytecode-file", "code.hex"]);
        assert!(matches!(deployment.init_code(), Err(ConfigError::ConflictingBytecode)));

        let (deployment, _) = mine_args(&["--bytecode", "0x"]);
        assert!(matches!(deployment.init_code(), Err(ConfigError::EmptyBytecode)));
    }

    #[test]
    fn test_bytecode_file() {
        let dir = std::env::temp_dir();
        let good = dir.join(format!("hook-miner-good-{}.hex", std::process::id()));
        let bad = dir.join(format!("hook-miner-bad-{}.hex", std::process::id()));
        fs::write(&good, "0x608060\n").unwrap();
        fs::write(&bad, "0xzz").unwrap();

        let (deployment, _) = mine_args(&["--bytecode-file", good.to_str().unwrap()]);
        let init_code = deployment.init_code().unwrap();
        assert_eq!(&init_code.code()[..3], &[0x60, 0x80, 0x60]);

        let (deployment, _) = mine_args(&["--bytecode-file", bad.to_str().unwrap()]);
        assert!(matches!(deployment.init_code(), Err(ConfigError::InvalidBytecode { .. })));

        let missing = dir.join("hook-miner-does-not-exist.hex");
        let (deployment, _) = mine_args(&["--bytecode-file", missing.to_str().unwrap()]);
        assert!(matches!(deployment.init_code(), Err(ConfigError::ReadBytecode { .. })));

        fs::remove_file(good).unwrap();
        fs::remove_file(bad).unwrap();
    }

    #[test]
    fn test_search_validation() {
        let (deployment, search) = mine_args(&["--bytecode", "60", "--max-loop", "0"]);
        assert!(matches!(
            search.salt_search(deployment.hook_flags()),
            Err(ConfigError::ZeroMaxLoop)
        ));

        let (deployment, search) = mine_args(&["--bytecode", "60", "-w", "0"]);
        assert!(matches!(
            search.salt_search(deployment.hook_flags()),
            Err(ConfigError::ZeroWorkers)
        ));

        let (deployment, search) = mine_args(&[
            "--bytecode",
            "60",
            "--max-loop",
            "10",
            "--workers",
            "2",
            "--timeout",
            "5",
        ]);
        let salt_search = search.salt_search(deployment.hook_flags()).unwrap();
        assert_eq!(salt_search.max_loop(), 10);
    }

    #[test]
    fn test_parse_address_command() {
        let args = ["oink-hook-miner", "address"]
            .into_iter()
            .chain(ADDRESSES)
            .chain([
                "--creator-fee-bps",
                "0",
                "--encoding",
                "abi",
                "--bytecode",
                "60",
                "0x0000000000000000000000000000000000000000000000000000000000000007",
            ]);
        match HookMiner::try_parse_from(args).unwrap() {
            HookMiner::Address { deployment, salt } => {
                assert_eq!(salt, B256::with_last_byte(7));
                assert_eq!(deployment.encoding, ArgEncoding::Abi);
                assert_eq!(deployment.init_code().unwrap().code().len(), 1 + 128);
            }
            other => panic!("expected address, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_bytecode_is_hex_decoded() {
        let (deployment, _) = mine_args(&["--bytecode", "0x6080"]);
        assert_eq!(deployment.bytecode.as_deref().map(|b| &b[..]), Some(&[0x60, 0x80][..]));

        let (deployment, _) = mine_args(&["--bytecode", "6080604052"]);
        assert_eq!(
            deployment.bytecode.as_deref().map(|b| &b[..]),
            Some(&[0x60, 0x80, 0x60, 0x40, 0x52][..])
        );

        let bad = ["oink-hook-miner", "mine"]
            .into_iter()
            .chain(ADDRESSES)
            .chain(["--creator-fee-bps", "1", "--bytecode", "0x60zz"]);
        assert!(HookMiner::try_parse_from(bad).is_err());
    }

    #[test]
    fn test_miner_derives_expected_address() {
        let (deployment, search) = mine_args(&["--bytecode", "0x6080", "--max-loop", "100"]);
        let miner = deployment.miner().unwrap();

        let mut code = vec![0x60, 0x80];
        code.extend_from_slice(&[0x11; 20]);
        code.extend_from_slice(&[0x22; 20]);
        code.extend_from_slice(&[0x33; 20]);
        code.extend_from_slice(&[0x01, 0xf4]);
        let deployer = address!("0x4e59b44847b379578588920cA78FbF26c0B4956C");

        let salt = salt_from_index(42);
        let expected = create2_address(&deployer, &salt, &code);
        assert_eq!(miner.compute_address(&salt), expected);
        assert_eq!(miner.init_code_hash(), alloy_primitives::keccak256(&code));

        // Require the full address of salt 42 and let the search find it.
        let mask = (U256::from(1) << 160) - U256::from(1);
        let flags = HookFlags::new(mask, address_to_uint(&expected));
        let found = search.salt_search(flags).unwrap().run(&miner).unwrap();
        assert_eq!(found.index, 42);
        assert_eq!(found.address, expected);
    }
}
