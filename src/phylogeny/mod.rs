//! Flag core genes whose gene tree disagrees with the species tree.
//!
//! Query genes are placed on reference gene trees, a coalescent species tree is built from
//! the single copy genes and every gene tree is reconciled against it. A transfer event
//! between the query and an organism of another genus is phylogeny evidence.

pub mod reconcile;
pub mod species;
pub mod trees;

use crate::utils::{self, runlog::RunLog};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use reconcile::DtlRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default RANGER-DTL executable.
pub const RANGER: &str = "ranger-dtl-U.linux";

/// Directories created in the run directory.
const DIRS: [&str; 5] = ["alignedcore", "trimmedcore", "raxml", "trees", "dtl"];

// ----------------------------------------------------------------------------
// States
// ----------------------------------------------------------------------------

/// Progress of one gene tree.
#[derive(Clone, Debug, PartialEq)]
pub enum GeneTreeState {
    NeedTree,
    Aligned,
    Trimmed,
    Placed,
    Aborted(String),
}

/// Progress of the organism level analysis.
///
/// Without a species tree nothing can be reconciled, the analysis is [`PhyloState::Aborted`]
/// and [`run`] returns the reason as an error.
#[derive(Clone, Debug, PartialEq)]
pub enum PhyloState {
    NeedTrees,
    TreesBuilt,
    SpeciesTreeBuilt(PathBuf),
    Reconciled(Vec<DtlRow>),
    Done(PhylogenyResult),
    Aborted(String),
}

// ----------------------------------------------------------------------------
// Config and Results
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PhyloConfig {
    /// Reference directory with `<model>.fna` alignments and `trees/<model>.tree`.
    pub refdir: PathBuf,
    pub astral: Option<PathBuf>,
    pub ranger: String,
    pub cpus: usize,
    /// Directory of trees to use instead of building them.
    pub prebuilt: Option<PathBuf>,
}

impl PhyloConfig {
    pub fn new(refdir: &Path) -> Self {
        PhyloConfig { refdir: refdir.to_path_buf(), astral: None, ranger: RANGER.to_string(), cpus: 1, prebuilt: None }
    }
}

/// `model -> gene tree node -> [[event, mapping, recipient, "a, b"]...]`
pub type PhylogenyHits = BTreeMap<String, BTreeMap<String, Vec<[String; 4]>>>;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PhylogenyResult {
    pub hits: PhylogenyHits,
    /// Number of distinct (model, node) hits.
    pub count: usize,
}

// ----------------------------------------------------------------------------
// Run
// ----------------------------------------------------------------------------

/// Run the phylogeny analysis of one organism.
///
/// ## Arguments
///
/// - `dir` - Run directory, the query core genes are read from `coregenes/`.
/// - `singles` - Single copy models, their trees make the species tree.
/// - `organism` - Query organism name as written in the FASTA headers.
/// - `genus` - Query genus, transfers within the genus are not evidence.
pub fn run(
    dir: &Path,
    singles: &[String],
    organism: &str,
    genus: &str,
    config: &PhyloConfig,
    log: &RunLog,
) -> Result<PhylogenyResult, Report> {
    for name in DIRS {
        utils::create_dir(&dir.join(name))?;
    }

    let mut state = PhyloState::NeedTrees;
    loop {
        state = match state {
            PhyloState::NeedTrees => {
                match &config.prebuilt {
                    Some(source) => {
                        trees::copy_prebuilt(source, dir, log)?;
                    }
                    None => {
                        let files = trees::tree_inputs(&dir.join("coregenes"))?;
                        log.info(format!("Building {} gene trees on {} cpus...", files.len(), config.cpus));
                        trees::build_trees(&config.refdir, dir, &files, config.cpus, log)?;
                    }
                }
                log.info("Milestone_3_complete");
                PhyloState::TreesBuilt
            }
            PhyloState::TreesBuilt => {
                let mut inputs = singles.iter().map(|m| dir.join("trees").join(format!("{m}.tree"))).collect::<Vec<_>>();
                let rna = dir.join("trees").join("RNA_16S_rRNA.tree");
                if rna.is_file() {
                    inputs.push(rna);
                }
                let built = species::species_tree(&inputs, dir, config.astral.as_deref(), log);
                log.info("Milestone_4_complete");
                match built {
                    Ok(path) => PhyloState::SpeciesTreeBuilt(path),
                    Err(e) => PhyloState::Aborted(format!("{e:#}")),
                }
            }
            PhyloState::SpeciesTreeBuilt(species) => {
                log.info(format!("Starting RangerDTL comparison for {organism}..."));
                let gene_trees = utils::list_files(&dir.join("trees"), ".tree")?;
                let inputs = reconcile::merge_trees(&species, &gene_trees, &dir.join("dtl"), organism, log)
                    .wrap_err("Failed to merge the gene trees with the species tree.")?;
                let rows = reconcile::reconcile(&inputs, &config.ranger, config.cpus, log)?;
                let rows = reconcile::query_transfers(rows, organism);
                reconcile::write_results(&dir.join("dtlresults.json"), organism, &rows)?;
                PhyloState::Reconciled(rows)
            }
            PhyloState::Reconciled(rows) => {
                let result = reconcile::check_phylogeny(&rows, organism, genus);
                log.info(format!("Phylogeny hits found: {}", result.count));
                PhyloState::Done(result)
            }
            PhyloState::Done(result) => return Ok(result),
            PhyloState::Aborted(reason) => {
                log.error(format!("No species tree, terminating tree comparison: {reason}"));
                log.info("Milestone_5_incomplete");
                return Err(eyre!("No species tree for {organism}: {reason}"));
            }
        };
    }
}

/// Map `f` over `items` on a pool of `cpus` threads, with a progress bar.
///
/// Results keep the order of `items`.
pub(crate) fn run_parallel<T, R, F>(items: &[T], cpus: usize, message: &str, f: F) -> Result<Vec<R>, Report>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cpus.max(1))
        .build()
        .wrap_err("Failed to build the thread pool.")?;

    let progress_bar_style = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg} | Elapsed: {elapsed_precise}")
        .wrap_err("Failed to create progress bar from template.")?;
    let progress_bar = ProgressBar::new(items.len() as u64);
    progress_bar.set_style(progress_bar_style);
    progress_bar.set_message(message.to_string());

    let results = pool.install(|| {
        items
            .par_iter()
            .map(|item| {
                let result = f(item);
                progress_bar.inc(1);
                result
            })
            .collect()
    });
    progress_bar.finish();

    Ok(results)
}
