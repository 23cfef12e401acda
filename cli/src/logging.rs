use std::sync::Once;

use clap::Args;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

#[derive(Args, Debug, Clone, Copy, Default)]
pub(crate) struct LoggingFlags {
    /// Print verbose logs
    #[arg(short, long, conflicts_with = "debug")]
    verbose: bool,

    /// Print debug logs
    #[arg(short, long)]
    debug: bool,
}

impl LoggingFlags {
    /// Level forced by the flags, if any.
    fn level(&self) -> Option<&'static str> {
        if self.debug {
            Some("debug")
        } else if self.verbose {
            Some("info")
        } else {
            None
        }
    }
}

/// Installs the global subscriber writing to stderr.
///
/// The flags take precedence over `RUST_LOG`; without either only warnings
/// and errors are shown. Later calls are ignored.
pub(crate) fn init(flags: &LoggingFlags) {
    INIT.call_once(|| {
        let env_filter = match flags.level() {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        };

        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest(verbose, debug, expected,
        case(false, false, None),
        case(true, false, Some("info")),
        case(false, true, Some("debug")),
    )]
    fn test_level(verbose: bool, debug: bool, expected: Option<&str>) {
        assert_eq!(expected, LoggingFlags { verbose, debug }.level());
    }
}
