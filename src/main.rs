// Keystorage — Application Entry Point
//
// Parses CLI arguments, initializes structured logging (with a filter that
// never emits secret values), and dispatches to the command handler.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use keystorage::cli::{execute, Cli};

fn main() {
    // RUST_LOG=keystorage=debug for verbose output. Logs go to stderr;
    // stdout carries only command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("keystorage=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        keystore,
        token,
        command,
    } = Cli::parse();
    let config = keystorage::Config::resolve(keystore, token);

    if let Err(e) = execute(&config, command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
