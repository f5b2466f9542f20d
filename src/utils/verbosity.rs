use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// -----------------------------------------------------------------------------
// Verbosity
// -----------------------------------------------------------------------------

/// The output verbosity level, exported as `RUST_LOG`.
///
/// ```rust
/// use arts::Verbosity;
/// assert_eq!(Verbosity::Debug.to_string(), "debug");
/// assert_eq!("warn".parse::<Verbosity>()?, Verbosity::Warn);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Clone, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize, ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum Verbosity {
    #[default]
    Info,
    Warn,
    Debug,
    Error,
}
