//! The `cut` subcommand.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use qcut::{CutOptions, Program, cut_circuit};
use tracing::info;

use crate::CliError;
use crate::io::{InputArgs, OutputArgs};

/// Cut a program into fragment programs.
#[derive(Parser, Debug)]
#[clap(version, long_about = None)]
#[clap(about = "Cut a program into fragment programs.")]
#[non_exhaustive]
pub struct CutArgs {
    /// Program input, as JSON.
    #[command(flatten)]
    pub input_args: InputArgs,

    /// Cut circuit output.
    #[command(flatten)]
    pub output_args: OutputArgs,

    /// JSON file with the cut options. Other flags override its fields.
    #[clap(short, long, value_name = "FILE", help_heading = "Cutting")]
    pub config: Option<PathBuf>,

    /// Method placing cuts beyond the marked ones, e.g. `greedy` or
    /// `exhaustive`.
    #[clap(short, long, help_heading = "Cutting")]
    pub method: Option<String>,

    /// Maximum number of wires in a fragment.
    #[clap(long, value_name = "N", help_heading = "Cutting")]
    pub max_wires: Option<usize>,

    /// Maximum number of gates in a fragment.
    #[clap(long, value_name = "N", help_heading = "Cutting")]
    pub max_gates: Option<usize>,

    /// Maximum number of fragments.
    #[clap(long, value_name = "N", help_heading = "Cutting")]
    pub max_fragments: Option<usize>,

    /// Maximum total number of fragment programs.
    #[clap(long, value_name = "N", help_heading = "Cutting")]
    pub max_configurations: Option<usize>,
}

impl CutArgs {
    /// The cut options: the config file if given, overridden by the flags.
    pub fn options(&self) -> Result<CutOptions, CliError> {
        let mut options = match &self.config {
            Some(path) => serde_json::from_reader(std::fs::File::open(path)?)?,
            None => CutOptions::default(),
        };
        if let Some(method) = &self.method {
            options = options.with_method(method.as_str());
        }
        if let Some(n) = self.max_wires {
            options.bounds = options.bounds.with_max_wires(n);
        }
        if let Some(n) = self.max_gates {
            options.bounds = options.bounds.with_max_gates(n);
        }
        if let Some(n) = self.max_fragments {
            options.bounds = options.bounds.with_max_fragments(n);
        }
        if let Some(n) = self.max_configurations {
            options = options.with_max_configurations(n);
        }
        Ok(options)
    }

    /// Cut the input program, with optional input/output overrides.
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
        let options = self.options()?;
        let program: Program = self.input_args.read_json_with_reader(input_override)?;
        let cut = cut_circuit(&program, &options).map_err(CliError::from)?;
        info!(
            fragments = cut.num_fragments(),
            programs = cut.programs.len(),
            "cut circuit"
        );
        self.output_args
            .write_json_with_writer(&cut, output_override)?;
        Ok(())
    }

    /// Cut the input program.
    pub fn run(&mut self) -> Result<()> {
        self.run_with_io(None::<&[u8]>, None::<Vec<u8>>)
    }
}
