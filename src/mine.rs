use std::{
    iter::FusedIterator,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use alloy_primitives::{Address, B256};
use rayon::prelude::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info};

use crate::{create2::create2_address_from_hash, flags::HookFlags, init_code::InitCode};

/// Default number of salts tried before giving up.
pub const MAX_LOOP: u64 = 20_000;

/// Computes candidate hook addresses.
///
/// Implementations must be thread-safe so a search can be sharded.
pub trait Miner: Sync {
    /// Calculates the contract address that would result from deploying with the given salt.
    fn compute_address(&self, salt: &B256) -> Address;
}

/// Derives hook addresses with CREATE2 for a fixed deployer and creation code.
#[derive(Debug, Clone, Copy)]
pub struct Create2Miner {
    /// Address that executes the CREATE2 deployment
    deployer: Address,
    /// Keccak256 hash of the hook's creation code
    init_code_hash: B256,
}

impl Create2Miner {
    pub fn new(deployer: Address, init_code: &InitCode) -> Self {
        Self {
            deployer,
            init_code_hash: init_code.hash(),
        }
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    pub fn init_code_hash(&self) -> B256 {
        self.init_code_hash
    }
}

impl Miner for Create2Miner {
    fn compute_address(&self, salt: &B256) -> Address {
        create2_address_from_hash(&self.deployer, salt, &self.init_code_hash)
    }
}

/// Encodes a salt counter as a 32-byte big-endian word.
pub fn salt_from_index(index: u64) -> B256 {
    let mut salt = [0u8; 32];
    salt[24..32].copy_from_slice(&index.to_be_bytes());
    B256::from(salt)
}

/// The finite sequence of candidate salts `0, 1, …, end - 1`, paired with
/// their counter values.
#[derive(Debug, Clone)]
pub struct SaltRange {
    next: u64,
    end: u64,
}

impl SaltRange {
    pub fn new(end: u64) -> Self {
        Self { next: 0, end }
    }
}

impl Iterator for SaltRange {
    type Item = (u64, B256);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some((index, salt_from_index(index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SaltRange {}

impl FusedIterator for SaltRange {}

/// Cooperative cancellation shared between a search and whoever may stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A salt whose hook address carries the requested flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    /// The salt to pass to the CREATE2 deployment.
    pub salt: B256,
    /// Counter value the salt encodes.
    pub index: u64,
    /// The hook address the salt produces.
    pub address: Address,
    /// Addresses derived before the search stopped. With several workers this
    /// can exceed `index + 1`.
    pub attempts: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum MineError {
    #[error("No suitable hook found. Please try again.")]
    NoMatchFound { attempts: u64 },
    #[error("search cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
    #[error("search timed out after {attempts} attempts")]
    TimedOut { attempts: u64 },
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Why a running search stopped before reaching a verdict.
#[derive(Debug, Clone, Copy)]
enum Interrupt {
    Cancelled,
    TimedOut,
}

impl Interrupt {
    fn into_error(self, attempts: u64) -> MineError {
        match self {
            Self::Cancelled => MineError::Cancelled { attempts },
            Self::TimedOut => MineError::TimedOut { attempts },
        }
    }
}

/// Bounded first-match search over the salts `0..max_loop`.
///
/// The search starts out `Searching` and ends either `Found`, returning the
/// lowest matching salt, or `Exhausted`, failing with
/// [`MineError::NoMatchFound`] after exactly `max_loop` derivations.
#[derive(Debug, Clone)]
pub struct SaltSearch {
    flags: HookFlags,
    max_loop: u64,
    workers: usize,
    cancel: Option<CancelToken>,
    timeout: Option<Duration>,
}

impl SaltSearch {
    pub fn new(flags: HookFlags) -> Self {
        Self {
            flags,
            max_loop: MAX_LOOP,
            workers: 1,
            cancel: None,
            timeout: None,
        }
    }

    pub fn with_max_loop(mut self, max_loop: u64) -> Self {
        self.max_loop = max_loop;
        self
    }

    /// Shards the search over `workers` threads when greater than one. The
    /// result is the same as with a single worker.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Gives up once `timeout` has elapsed, counted from the start of each run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn flags(&self) -> &HookFlags {
        &self.flags
    }

    pub fn max_loop(&self) -> u64 {
        self.max_loop
    }

    /// Returns the lowest salt in range whose address matches the flags.
    pub fn run<M: Miner>(&self, miner: &M) -> Result<Found, MineError> {
        debug!(
            max_loop = self.max_loop,
            workers = self.workers,
            mask = %self.flags.mask(),
            required = %self.flags.required(),
            "starting salt search"
        );

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let found = if self.workers > 1 {
            self.run_sharded(miner, deadline)?
        } else {
            self.run_sequential(miner, deadline)?
        };

        info!(
            salt = %found.salt,
            address = %found.address,
            attempts = found.attempts,
            "found hook salt"
        );
        Ok(found)
    }

    fn run_sequential<M: Miner>(
        &self,
        miner: &M,
        deadline: Option<Instant>,
    ) -> Result<Found, MineError> {
        let mut attempts = 0;
        for (index, salt) in SaltRange::new(self.max_loop) {
            if let Some(interrupt) = self.interrupted(deadline) {
                return Err(interrupt.into_error(attempts));
            }

            attempts += 1;
            let address = miner.compute_address(&salt);
            if self.flags.matches(&address) {
                return Ok(Found {
                    salt,
                    index,
                    address,
                    attempts,
                });
            }
        }
        Err(MineError::NoMatchFound { attempts })
    }

    fn run_sharded<M: Miner>(
        &self,
        miner: &M,
        deadline: Option<Instant>,
    ) -> Result<Found, MineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|id| format!("hook-miner-{id}"))
            .build()?;
        let attempts = AtomicU64::new(0);

        // `find_map_first` keeps the lowest index among all hits, so shards
        // agree with the sequential order.
        let outcome = pool.install(|| {
            (0..self.max_loop).into_par_iter().find_map_first(|index| {
                if let Some(interrupt) = self.interrupted(deadline) {
                    return Some(Err(interrupt));
                }

                attempts.fetch_add(1, Ordering::Relaxed);
                let salt = salt_from_index(index);
                let address = miner.compute_address(&salt);
                self.flags
                    .matches(&address)
                    .then_some(Ok((index, salt, address)))
            })
        });

        let attempts = attempts.into_inner();
        match outcome {
            Some(Ok((index, salt, address))) => Ok(Found {
                salt,
                index,
                address,
                attempts,
            }),
            Some(Err(interrupt)) => Err(interrupt.into_error(attempts)),
            None => Err(MineError::NoMatchFound { attempts }),
        }
    }

    fn interrupted(&self, deadline: Option<Instant>) -> Option<Interrupt> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(Interrupt::Cancelled);
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(Interrupt::TimedOut);
        }
        None
    }
}
