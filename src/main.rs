//! Investigator CLI entry point.

use clap::Parser;

use investigator::cli::commands::{self, bootstrap};
use investigator::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let Cli {
        command,
        json,
        config,
    } = Cli::parse();

    let result = async {
        let (config, _logger) = bootstrap(config.as_deref())?;
        match command {
            Commands::Investigate(args) => commands::investigate::execute(args, config, json).await,
            Commands::Tools(args) => commands::tools::execute(&args, config, json),
        }
    }
    .await;

    if let Err(err) = result {
        investigator::cli::handle_error(err, json);
    }
}
