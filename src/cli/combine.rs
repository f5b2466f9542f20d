use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Combine the results of a finished batch from its `all_paths` manifest.
#[derive(Clone, Debug, Default, Deserialize, Parser, Serialize)]
pub struct CombineArgs {
    /// Main result directory of the batch.
    pub dir: PathBuf,
}
