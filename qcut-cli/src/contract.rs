//! The `contract` subcommand.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use qcut::Contraction;
use serde::Deserialize;
use tracing::info;

use crate::CliError;
use crate::io::{InputArgs, OutputArgs};

/// Recombine the results of fragment programs.
#[derive(Parser, Debug)]
#[clap(version, long_about = None)]
#[clap(about = "Recombine the results of fragment programs.")]
#[non_exhaustive]
pub struct ContractArgs {
    /// Input, as written by `qcut cut`. Its `programs` are ignored.
    #[command(flatten)]
    pub input_args: InputArgs,

    /// Read-out values output.
    #[command(flatten)]
    pub output_args: OutputArgs,

    /// JSON file with one array of read-out values per fragment program.
    /// Overrides the `results` field of the input.
    #[clap(short, long, value_name = "FILE")]
    pub results: Option<PathBuf>,
}

/// The input of the `contract` subcommand.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractInput {
    /// How to recombine the results.
    pub contraction: Contraction,
    /// The results of every fragment program, in order.
    #[serde(default)]
    pub results: Option<Vec<Vec<f64>>>,
}

impl ContractArgs {
    /// Contract the fragment results, with optional input/output overrides.
    ///
    /// # Arguments
    ///
    /// * `input_override` - Optional reader to use instead of the CLI input argument.
    /// * `output_override` - Optional writer to use instead of the CLI output argument.
    pub fn run_with_io<R: Read, W: Write>(
        &mut self,
        input_override: Option<R>,
        output_override: Option<W>,
    ) -> Result<()> {
        let input: ContractInput = self.input_args.read_json_with_reader(input_override)?;
        let results = match &self.results {
            Some(path) => serde_json::from_reader(std::fs::File::open(path).map_err(CliError::from)?)
                .map_err(CliError::from)?,
            None => input.results.ok_or(CliError::MissingResults)?,
        };
        let values = input
            .contraction
            .contract(&results)
            .map_err(CliError::from)?;
        info!(read_outs = values.len(), "contracted results");
        self.output_args
            .write_json_with_writer(&values, output_override)?;
        Ok(())
    }

    /// Contract the fragment results.
    pub fn run(&mut self) -> Result<()> {
        self.run_with_io(None::<&[u8]>, None::<Vec<u8>>)
    }
}
