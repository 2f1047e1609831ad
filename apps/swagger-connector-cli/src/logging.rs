use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSection;

/// Filter directive for a `-v` count; `None` defers to `RUST_LOG` / config.
fn verbosity_directive(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Install the global subscriber. Logs go to stderr so command output stays clean.
pub fn init(config: &LoggingSection, verbose: u8) -> Result<()> {
    let filter = match verbosity_directive(verbose) {
        Some(directive) => EnvFilter::try_new(directive)?,
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&config.level)?,
        },
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    }
    .map_err(|e| anyhow!(e))
}
