//! Tracing setup for the command-line binary.
//!
//! `RUST_LOG` takes precedence. Otherwise the `-v` count picks the level:
//! none is `warn`, one is `info`, two or more is `debug`. Output goes to
//! stderr so piped table or JSON output stays clean.

use tracing_subscriber::EnvFilter;

pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "ledgerport=info",
        _ => "ledgerport=debug",
    }
}

/// Returns `false` when a global subscriber was already installed.
pub fn init(verbosity: u8) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
