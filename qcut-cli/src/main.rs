//! Cut quantum circuits on the command line.

use clap::Parser as _;
use qcut_cli::CliArgs;

fn main() {
    let mut args = CliArgs::parse();
    let verbosity = args.verbosity();
    let report_errors = verbosity.tracing_level().is_some();
    tracing_subscriber::fmt()
        .with_max_level(verbosity.tracing_level_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = args.run() {
        if report_errors {
            eprintln!("{e}");
        }
        std::process::exit(1);
    }
}
