/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

/// DFT+DMFT downfolding and iteration control
#[derive(Parser, Debug)]
#[command(name = "dmft-rs", version, about)]
pub struct Cli {
    /// Path to the JSON control file
    pub control: PathBuf,

    /// Directory holding the interchange files and the solver exchange
    #[arg(short, long, default_value = ".")]
    pub workdir: PathBuf,

    /// Give up on the external impurity solver after this many seconds
    #[arg(long)]
    pub solver_timeout: Option<u64>,
}
