//! Input/output arguments shared by the subcommands.

use std::io::{BufReader, Read, Write};

use clap_verbosity_flag::{InfoLevel, Verbosity};
use clio::Input;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CliError;

/// Arguments for reading a JSON input.
#[derive(Debug, clap::Args)]
pub struct InputArgs {
    /// Input file. Defaults to `-` for stdin.
    #[arg(value_parser, default_value = "-", help_heading = "Input")]
    pub input: Input,
    /// Verbosity.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl InputArgs {
    /// Parse the input, or `input_override` if given, as JSON.
    pub fn read_json_with_reader<T: DeserializeOwned, R: Read>(
        &mut self,
        input_override: Option<R>,
    ) -> Result<T, CliError> {
        let value = match input_override {
            Some(reader) => serde_json::from_reader(BufReader::new(reader))?,
            None => serde_json::from_reader(BufReader::new(&mut self.input))?,
        };
        Ok(value)
    }
}

/// Arguments for writing a JSON output.
#[derive(Debug, clap::Args)]
pub struct OutputArgs {
    /// Output file. Use '-' for stdout.
    #[clap(short, long, value_parser, default_value = "-", help_heading = "Output")]
    pub output: clio::Output,
    /// Indent the JSON output.
    #[clap(long, help_heading = "Output")]
    pub pretty: bool,
}

impl OutputArgs {
    /// Write `value` as JSON to the output, or to `output_override` if
    /// given.
    pub fn write_json_with_writer<T: Serialize, W: Write>(
        &mut self,
        value: &T,
        output_override: Option<W>,
    ) -> Result<(), CliError> {
        match output_override {
            Some(writer) => write_json(value, writer, self.pretty),
            None => write_json(value, &mut self.output, self.pretty),
        }
    }
}

fn write_json<T: Serialize, W: Write>(value: &T, mut writer: W, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
