//! `arts` is the **A**ntibiotic **R**esistant **T**arget **S**eeker.
//!
//! ## Why arts?
//!
//! Biosynthetic gene clusters (BGCs) that make antibiotics often carry a resistant copy of the
//! housekeeping gene their product targets. `arts` screens a genome for such core genes using
//! three independent lines of evidence:
//!
//! 1. **Duplication**: the core gene has more copies than in the reference genomes.
//! 1. **BGC proximity**: a core gene, known resistance gene or domain of unknown function
//!    lies inside a cluster annotated by antiSMASH.
//! 1. **Phylogeny**: the gene tree disagrees with the species tree, a transfer from an
//!    organism of another genus.
//!
//! Genes found by two or more criteria are the strongest resistant target candidates.
//!
//! The heavy lifting is done by external programs (hmmsearch, mafft, trimal, raxml, ASTRAL,
//! RANGER-DTL, antiSMASH and BiG-SCAPE), `arts` runs them and merges their results into
//! tables under `<resultdir>/tables`.

pub mod antismash;
pub mod batch;
pub mod cli;
pub mod duplication;
pub mod error;
pub mod genome;
pub mod phylogeny;
pub mod pipeline;
pub mod proximity;
pub mod report;
pub mod search;
pub mod utils;

#[doc(inline)]
pub use crate::cli::Cli;
#[doc(inline)]
pub use crate::utils::table::Table;
#[doc(inline)]
pub use crate::utils::verbosity::Verbosity;
