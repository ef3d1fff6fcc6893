use clap::Parser;
use tracing::Level;

use optchain_sampler::{cli, logging, run};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    logging::init_logging(cli.log_format, Level::INFO);

    match cli.command {
        cli::Command::Run(args) => run::run(&args),
        cli::Command::Contracts(args) => run::list_contracts(&args),
    }
}
