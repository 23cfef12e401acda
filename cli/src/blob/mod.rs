pub(crate) mod inspect;

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum BlobCommands {
    /// Inspect signature associated with the signed blob
    #[command(after_help = inspect::EXAMPLES)]
    Inspect {
        #[command(flatten)]
        config: inspect::Config,
    },
}
