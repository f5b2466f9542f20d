use arts::{batch, cli, cli::Cli};
use clap::Parser;
use color_eyre::eyre::{Report, Result};

fn main() -> Result<(), Report> {
    // ------------------------------------------------------------------------
    // CLI Setup

    // Parse CLI parameters
    let args = Cli::parse();

    // initialize color_eyre crate for colorized logs
    color_eyre::install()?;

    // Set logging/verbosity level via RUST_LOG
    std::env::set_var("RUST_LOG", args.verbosity.to_string());

    // initialize env_logger crate for logging/verbosity level
    env_logger::init();

    // check which CLI command we're running (run, combine)
    match args.command {
        cli::Command::Run(args) => {
            let dir = batch::run(&args)?;
            log::info!("Results written to {dir:?}");
        }
        cli::Command::Combine(args) => batch::combine(&args)?,
    }

    Ok(())
}
