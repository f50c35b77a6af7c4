//! idevkit - Command and log-streaming gateway for attached iOS devices
//!
//! This is the binary entry point. All logic lives in the library.

use clap::Parser;
use color_eyre::eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = idevkit::Args::parse();

    // stdout is reserved for results; a missing log directory is not fatal
    if let Err(e) = idevkit_core::logging::init() {
        eprintln!("warning: file logging disabled: {}", e);
    }

    if let Err(report) = idevkit::run(args).await {
        eprintln!("Error: {:?}", report);
        std::process::exit(idevkit::cli::exit_code(&report));
    }
    Ok(())
}
