use std::io;
use std::path::Path;
use std::str::FromStr;

use clap::Args;
use inkan_envelope::media_type_from_path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::inspect::{self, InspectOutput};
use crate::logging::{self, LoggingFlags};
use crate::output::{self, OutputFormat};
use crate::utils::read_file;

/// Largest signature envelope accepted, 10 MiB.
pub(crate) const MAX_SIGNATURE_SIZE: u64 = 10 * 1024 * 1024;

pub(crate) const EXAMPLES: &str = "\
Examples:
  Inspect blob signature:
    inkan blob inspect <signature_path>

  Inspect blob signature and output as JSON:
    inkan blob inspect --output json <signature_path>";

#[derive(Args)]
pub(crate) struct Config {
    /// Path to the signature file (`.jws` or `.cose`, optionally followed by `.sig`)
    signature_path: Option<String>,

    /// Output format: json, plaintext (or text)
    #[arg(short, long, default_value = "text", value_parser = <OutputFormat as FromStr>::from_str)]
    output: OutputFormat,

    #[command(flatten)]
    logging: LoggingFlags,
}

pub(crate) fn execute(config: Config) -> Result<()> {
    logging::init(&config.logging);

    let path = config
        .signature_path
        .as_deref()
        .ok_or(Error::MissingSignaturePath)?;

    let media_type = media_type_from_path(Path::new(path)).map_err(Error::MediaType)?;
    debug!(path, %media_type, "resolved signature envelope media type");

    let envelope = read_file(Path::new(path), MAX_SIGNATURE_SIZE)?;
    info!(path, size = envelope.len(), "read signature envelope");

    let output = InspectOutput {
        media_type: media_type.to_string(),
        signatures: inspect::signatures(media_type, "", &envelope)?,
    };

    let mut stdout = io::stdout().lock();
    output::print(config.output, path, &output, &mut stdout)
}
