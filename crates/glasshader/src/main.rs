mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Wrap { shader }) => run::print_wrapped(&shader),
        Some(Command::Paths) => run::print_paths(),
        None => run::run(cli.run),
    }
}
