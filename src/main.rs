//! Chat Relay - Entry Point
//!
//! Starts one listener (and one room) per port given on the command line.

use std::process::ExitCode;

use clap::Parser;

use chat_relay::config::USAGE;
use chat_relay::logging;
use chat_relay::{serve, CliArgs};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    if args.ports.is_empty() {
        eprintln!("{}", USAGE);
        return Ok(ExitCode::from(1));
    }

    // Logs go to stderr; RUST_LOG overrides --log-level
    logging::init(&args.log_level);

    let config = args.relay_config();
    serve(&args.ports, &config).await?;

    Ok(ExitCode::SUCCESS)
}
