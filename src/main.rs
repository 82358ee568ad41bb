/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Main executable for dmft-rs

use clap::Parser;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = dmft_rs::cli::Cli::parse();

    println!("dmft-rs v{}", dmft_rs::VERSION);
    println!("Projected-local-orbital downfolding and DFT+DMFT iteration control");
    println!("-----------------------------------------------------------");

    let dmft = dmft_rs::Dmft::from_files(&cli.control, &cli.workdir)?;

    let mut solver = dmft_rs::solver::FileExchangeSolver::new(&cli.workdir);
    if let Some(seconds) = cli.solver_timeout {
        solver = solver.with_timeout(Duration::from_secs(seconds));
    }
    let mut mixer = dmft_rs::mixing::LinearMixer::new(dmft.control().mixing)?;

    let info = dmft.run(&mut solver, &mut mixer)?;

    println!(
        "finished: {} dmft iteration(s), mu = {:.6}, converged = {}",
        info.i1,
        info.mu_lattice,
        info.converged()
    );

    Ok(())
}
