//! Standard command line tools, used by the qcut binary.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use qcut::{ContractError, CutCircuitError};
use thiserror::Error;

pub mod contract;
pub mod cut;
pub mod io;

/// CLI arguments.
#[derive(Parser, Debug)]
#[clap(version, long_about = None)]
#[clap(about = "Quantum circuit cutting tools.")]
#[non_exhaustive]
pub enum CliArgs {
    /// Cut a program into fragment programs.
    Cut(cut::CutArgs),
    /// Recombine the results of fragment programs.
    Contract(contract::ContractArgs),
}

impl CliArgs {
    /// The verbosity requested for the subcommand.
    pub fn verbosity(&self) -> &Verbosity<InfoLevel> {
        match self {
            CliArgs::Cut(args) => &args.input_args.verbose,
            CliArgs::Contract(args) => &args.input_args.verbose,
        }
    }

    /// Run the selected subcommand.
    pub fn run(&mut self) -> anyhow::Result<()> {
        match self {
            CliArgs::Cut(args) => args.run(),
            CliArgs::Contract(args) => args.run(),
        }
    }
}

/// Error type for the CLI.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CliError {
    /// Error reading input.
    #[error("Error reading input: {0}")]
    InputFile(#[from] std::io::Error),
    /// Error parsing input.
    #[error("Error parsing input: {0}")]
    Parse(#[from] serde_json::Error),
    /// Errors produced by the `cut` subcommand.
    #[error("Error cutting circuit: {0}")]
    Cut(#[from] CutCircuitError),
    /// Errors produced by the `contract` subcommand.
    #[error("Error contracting results: {0}")]
    Contract(#[from] ContractError),
    /// The `contract` subcommand was given no fragment results.
    #[error("No fragment results given. Pass --results or add a \"results\" field to the input.")]
    MissingResults,
}
