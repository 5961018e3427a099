use std::process::ExitCode;

use alloy_primitives::B256;
use clap::Parser;
use hook_miner::{
    CancelToken, Error, Miner,
    cli::{DeploymentArgs, HookMiner, SearchArgs},
    flags::address_to_uint,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Entry point for the Oink hook miner.
///
/// `mine` searches for the lowest salt whose CREATE2 hook address carries the
/// required flags; `address` derives the hook address for a known salt so it
/// can be checked before the deployment is broadcast.
fn main() -> ExitCode {
    // Default to `info` when `RUST_LOG` is unset or invalid.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match HookMiner::parse() {
        HookMiner::Mine { deployment, search } => mine(&deployment, &search),
        HookMiner::Address { deployment, salt } => compute_address(&deployment, salt),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn mine(deployment: &DeploymentArgs, search: &SearchArgs) -> Result<(), Error> {
    let miner = deployment.miner()?;
    let flags = deployment.hook_flags();
    if !flags.is_satisfiable() {
        warn!(
            mask = %flags.mask(),
            required = %flags.required(),
            "required flags can never match, the search will exhaust"
        );
    }

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || on_interrupt.cancel())?;

    let search = search.salt_search(flags)?.with_cancel_token(cancel);
    info!(
        deployer = %deployment.deployer,
        init_code_hash = %miner.init_code_hash(),
        max_loop = search.max_loop(),
        "mining hook salt"
    );

    let found = search.run(&miner)?;

    // Output the discovered salt and resulting hook address
    println!("Found salt {} ==> {}", found.salt, found.address);
    println!("Salt (dec): {}", found.index);
    println!("Attempts:   {}", found.attempts);
    Ok(())
}

fn compute_address(deployment: &DeploymentArgs, salt: B256) -> Result<(), Error> {
    let flags = deployment.hook_flags();
    let address = deployment.miner()?.compute_address(&salt);

    let matches = flags.matches(&address);
    info!(%salt, %address, matches, "computed hook address");

    println!("Salt {salt} ==> {address}");
    println!("Flag bits:  {:#x}", address_to_uint(&address) & flags.mask());
    println!("Matches:    {matches}");
    Ok(())
}
