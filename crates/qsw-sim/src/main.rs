use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    parse::{self, ParseArgs},
    plan::{self, PlanArgs},
    run::{self, RunArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "qsw-sim", version, about = "Quantisation error sweep harness")]
struct Cli {
    /// Log every task at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a sweep plan YAML file with the observed defaults.
    Plan(PlanArgs),
    /// Execute a sweep plan and write CSV tables plus a JSON report.
    Run(RunArgs),
    /// Apply the measurement parser to a file or standard input.
    Parse(ParseArgs),
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Command::Plan(args) => plan::run(&args),
        Command::Run(args) => run::run(&args),
        Command::Parse(args) => parse::run(&args),
    }
}
