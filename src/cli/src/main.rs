//! guestdisk CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use guestdisk_cli::commands::{dispatch, Cli};

fn main() {
    let cli = Cli::parse();

    // RUST_LOG, when set, overrides --loglevel
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.loglevel.as_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
