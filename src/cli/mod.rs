//! [Command-line interface](Cli) (CLI) of the main binary.

pub mod combine;
pub mod run;

use crate::Verbosity;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::default::Default;

// ----------------------------------------------------------------------------
// CLI Entry Point
// ----------------------------------------------------------------------------

/// The command-line interface (CLI).
/// ---
/// The CLI is intended for parsing user input from the command-line in the main function. This is achieved with the `parse` function, which parses the command line arguments from [`std::env::args`](https://doc.rust-lang.org/std/env/fn.args.html).
/// ```no_run
/// use clap::Parser;
/// let args = arts::Cli::parse();
/// ```
/// The command-line arguments from `std::env::args` are simply a vector of space separated strings. Here is a manual example of setting the command-line input:
/// ```rust
/// # use clap::Parser;
/// let input = ["arts", "run", "genome.gbk", "reference/", "--multicpu", "4", "--options", "phyl,kres"];
/// let args = arts::Cli::parse_from(input);
/// let json = serde_json::to_string_pretty(&args)?;
/// assert!(json.contains("\"multicpu\": 4"));
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Debug, Deserialize, Parser, Serialize)]
#[clap(name = "arts", author, version)]
#[clap(about = "ARTS seeks antibiotic resistant targets: core genes linked to biosynthetic gene clusters.")]
pub struct Cli {
    #[clap(subcommand)]
    /// Pass CLI arguments to a particular [Command].
    #[clap(help = "Set the command.")]
    pub command: Command,

    /// Set the output [Verbosity] level.
    #[clap(short = 'v', long)]
    #[clap(value_enum, default_value_t = Verbosity::default())]
    #[clap(hide_possible_values = false)]
    #[clap(global = true)]
    #[clap(help = "Set the output verbosity level.")]
    pub verbosity: Verbosity,
}

/// CLI [commands](#variants). Used to decide which runtime [Command](#variants) the CLI arguments should be passed to.
#[derive(Debug, Deserialize, Serialize, Subcommand)]
pub enum Command {
    /// Pass CLI arguments to the [batch](crate::batch::run()) driver.
    ///
    /// ```rust
    /// use arts::{cli::Command, Cli};
    /// use clap::Parser;
    /// let args = Cli::parse_from(["arts", "run", "a.gbk,b.gbk", "reference/"]);
    /// match args.command {
    ///   Command::Run(args)     => assert_eq!(args.input, "a.gbk,b.gbk"),
    ///   Command::Combine(_)    => unreachable!(),
    /// }
    /// ```
    #[clap(about = "Run the analysis on one or more genomes.")]
    Run(run::RunArgs),

    /// Pass CLI arguments to the [combine](crate::batch::combine()) step of a finished batch.
    #[clap(about = "Combine the results of a batch run into summary tables.")]
    Combine(combine::CombineArgs),
}
