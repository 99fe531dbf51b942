//! Tracing setup for the `recall` binary and the core unit tests.
//!
//! Log lines go to stderr so they never interleave with review prompts on stdout.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the subscriber for an ordinary `recall` run.
///
/// Only warnings show by default (skipped WAL lines, clamped step indexes);
/// `RUST_LOG` takes precedence.
pub fn init() {
    init_with_level("warn")
}

/// Install the subscriber with `default_level` unless `RUST_LOG` is set.
///
/// `recall --verbose` passes `"debug"`, which prints one line per scheduling
/// decision plus every deck and WAL write.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
