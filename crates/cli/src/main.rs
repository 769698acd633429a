//! entcache command-line entry point.
//!
//! Results go to stdout as JSON lines. Logging and `--watch` notifications go
//! to stderr so stdout stays machine-readable.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = args.resolve_config()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!(backend = %config.backend, init_mode = %config.init_mode, "Starting entcache");

    cli::run(&args, &config, &mut std::io::stdout().lock())
}
