//! Resolves named UI elements on a live screen and runs automation scripts
//! against them, with scroll search, dependency navigation and a replay log.

use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod device;
pub mod document;
pub mod locator;
pub mod resolver;
pub mod script;
pub mod skeleton;
pub mod trace;
pub mod tree;

/// Installs the stderr subscriber. `RUST_LOG` wins over the verbosity count.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
