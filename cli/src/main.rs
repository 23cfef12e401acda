use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod blob;
mod error;
mod inspect;
mod logging;
mod output;
mod tree;
mod utils;

use error::Result;

use blob::BlobCommands;

#[derive(Parser)]
#[command(name = "inkan")]
#[command(about = "Notary Project signature inspection toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Blob signature operations
    Blob {
        #[command(subcommand)]
        command: BlobCommands,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Blob { command } => match command {
            BlobCommands::Inspect { config } => {
                blob::inspect::execute(config)?;
            }
        },
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
