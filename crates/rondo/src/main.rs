use anyhow::Result;
use clap::{Parser, Subcommand};
use rondo::cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check(args) => args.run(),
        Command::Run(args) => args.run(),
    }
}

#[derive(Parser)]
#[command(name = "rondo", about = "Simulated motion-axis toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a configuration (and optionally a scenario) without running it.
    Check(cli::check::CheckArgs),
    /// Run a command scenario against simulated controllers and emit telemetry.
    Run(cli::run::RunArgs),
}
