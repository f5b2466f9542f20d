//! Typed failure kinds, carried inside [`color_eyre::Report`] so callers can tell them apart.

use std::path::PathBuf;

/// Failure of an external scientific program.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("Could not find executable \"{program}\" on the PATH")]
    NotFound { program: String },

    #[error("\"{command}\" exited with {status}:\n{stderr}")]
    Failed { command: String, status: String, stderr: String },

    #[error("\"{command}\" was killed after exceeding the {seconds} s time limit")]
    TimedOut { command: String, seconds: u64 },

    #[error("Could not run \"{command}\": {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the phylogeny stage that leaves the run without phylogeny evidence.
#[derive(thiserror::Error, Debug)]
pub enum PhyloError {
    #[error("Missing reference {kind} for model {model}: {path:?}")]
    MissingReference { model: String, kind: String, path: PathBuf },

    #[error("No gene trees were available to build a species tree")]
    NoInputTrees,

    #[error("ASTRAL jar not found, searched: {searched:?}")]
    AstralMissing { searched: Vec<PathBuf> },

    #[error("ASTRAL did not produce a species tree at {0:?}")]
    NoSpeciesTree(PathBuf),

    #[error("Query organism {0} is absent from the species tree")]
    QueryNotInSpeciesTree(String),
}

/// Failure to read the query genome.
#[derive(thiserror::Error, Debug)]
pub enum GenomeError {
    #[error("Organism name \"{0}\" has no alphanumeric characters")]
    EmptyOrganismName(String),

    #[error("Record {record} references sequence outside the file ({location})")]
    ExternalReference { record: String, location: String },
}
