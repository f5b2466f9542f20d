//! Place the query core genes onto the reference gene trees.

use crate::error::PhyloError;
use crate::phylogeny::{run_parallel, GeneTreeState};
use crate::utils::{self, runlog::RunLog, tool::Tool};
use color_eyre::eyre::{Report, Result, WrapErr};
use itertools::Itertools;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Per-model directories of a run.
const ALIGNED: &str = "alignedcore";
const TRIMMED: &str = "trimmedcore";
const RAXML: &str = "raxml";
const TREES: &str = "trees";

/// Remove placement node ids (`[I12]`), quotes and the `QUERY___` marker from a Newick line.
///
/// ```rust
/// use arts::phylogeny::trees::clean_labels;
/// let line = "('QUERY___Sx|G000001':0.1[I0],\"Sy|A12\":0.2[I1]);";
/// assert_eq!(clean_labels(line)?, "(Sx|G000001:0.1,Sy|A12:0.2);");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn clean_labels(line: &str) -> Result<String, Report> {
    let re = Regex::new(r#"\[I\d+?\]|"|'|QUERY___"#)?;
    Ok(re.replace_all(line, "").to_string())
}

/// Returns the first line of a text file.
pub fn first_line(path: &Path) -> Result<String, Report> {
    let content = std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read file: {path:?}"))?;
    Ok(content.lines().next().unwrap_or_default().to_string())
}

/// Returns the core gene files to build trees for.
///
/// rRNA genes are excluded, except for the 16S rRNA (`RNA_16S_rRNA.fna`).
pub fn tree_inputs(coregenes: &Path) -> Result<Vec<PathBuf>, Report> {
    let files = utils::list_files(&coregenes, ".fna")?
        .into_iter()
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            !name.ends_with("_rRNA.fna") || name == "RNA_16S_rRNA.fna"
        })
        .collect_vec();
    Ok(files)
}

/// Copy the cleaned first line of every `*.tree` of `source` into `<dir>/trees`.
pub fn copy_prebuilt(source: &Path, dir: &Path, log: &RunLog) -> Result<usize, Report> {
    let trees = utils::list_files(&source, ".tree")?;
    for tree in &trees {
        let output = dir.join(TREES).join(utils::file_name(tree)?);
        std::fs::write(&output, format!("{}\n", clean_labels(&first_line(tree)?)?))
            .wrap_err_with(|| format!("Failed to write tree: {output:?}"))?;
    }
    log.info(format!("Copied {} prebuilt trees from {source:?}", trees.len()));
    Ok(trees.len())
}

/// Align, trim and place the query sequences of one model.
///
/// Every step only runs when the previous one succeeded. The placed tree is written to
/// `<dir>/trees/<model>.tree`.
///
/// ## Arguments
///
/// - `refdir` - Reference directory with `<model>.fna` alignments and `trees/<model>.tree`.
/// - `dir` - Run directory, the query genes are read from `coregenes/<model>.fna`.
/// - `fasta` - File name of the model (ex. `TIGR02013.fna`).
pub fn build_tree(refdir: &Path, dir: &Path, fasta: &str, threads: usize, log: &RunLog) -> GeneTreeState {
    let mut state = GeneTreeState::NeedTree;
    let model = Path::new(fasta).file_stem().and_then(|s| s.to_str()).unwrap_or(fasta).to_string();

    loop {
        state = match state.next(refdir, dir, fasta, &model, threads, log) {
            Ok(next) => next,
            Err(e) => GeneTreeState::Aborted(format!("{e:#}")),
        };
        match &state {
            GeneTreeState::Placed => {
                log.info(format!("BuildTree: Finished {fasta}"));
                return state;
            }
            GeneTreeState::Aborted(reason) => {
                log.error(format!("BuildTree Failed: {fasta}: {reason}"));
                return state;
            }
            _ => (),
        }
    }
}

impl GeneTreeState {
    /// Run the step that follows this state.
    fn next(
        &self,
        refdir: &Path,
        dir: &Path,
        fasta: &str,
        model: &str,
        threads: usize,
        log: &RunLog,
    ) -> Result<GeneTreeState, Report> {
        let aligned = dir.join(ALIGNED).join(fasta);
        let trimmed = dir.join(TRIMMED).join(fasta);

        let state = match self {
            GeneTreeState::NeedTree => {
                let reference = refdir.join(fasta);
                if !reference.is_file() {
                    Err(PhyloError::MissingReference {
                        model: model.to_string(),
                        kind: "alignment".to_string(),
                        path: reference.clone(),
                    })?
                }
                let mut mafft = Tool::new("mafft").arg("--quiet");
                if threads > 1 {
                    mafft = mafft.arg("--thread").arg(threads);
                }
                mafft
                    .arg("--add")
                    .path_arg(&dir.join("coregenes").join(fasta))
                    .path_arg(&reference)
                    .stdout(&aligned)
                    .run(log)?;
                log.debug(format!("MAFFT: finished {aligned:?}"));
                GeneTreeState::Aligned
            }
            GeneTreeState::Aligned => {
                Tool::new("trimal")
                    .arg("-automated1")
                    .arg("-in")
                    .path_arg(&aligned)
                    .arg("-out")
                    .path_arg(&trimmed)
                    .run(log)?;
                log.debug(format!("TrimAl: finished {trimmed:?}"));
                GeneTreeState::Trimmed
            }
            GeneTreeState::Trimmed => {
                let reference = refdir.join(TREES).join(format!("{model}.tree"));
                if !reference.is_file() {
                    Err(PhyloError::MissingReference {
                        model: model.to_string(),
                        kind: "tree".to_string(),
                        path: reference.clone(),
                    })?
                }
                let workdir = std::fs::canonicalize(dir.join(RAXML))
                    .wrap_err_with(|| format!("Missing RAxML directory in {dir:?}"))?;
                Tool::new("raxmlHPC-SSE3")
                    .args(["-f", "v", "-m", "GTRGAMMA", "-p", "12345", "-w"])
                    .path_arg(&workdir)
                    .arg("-t")
                    .path_arg(&reference)
                    .arg("-s")
                    .path_arg(&trimmed)
                    .arg("-n")
                    .arg(format!("{model}.tree"))
                    .run(log)?;

                let labelled = workdir.join(format!("RAxML_labelledTree.{model}.tree"));
                let tree = clean_labels(&first_line(&labelled)?)?;
                let output = dir.join(TREES).join(format!("{model}.tree"));
                std::fs::write(&output, format!("{tree}\n")).wrap_err_with(|| format!("Failed to write {output:?}"))?;
                GeneTreeState::Placed
            }
            GeneTreeState::Placed | GeneTreeState::Aborted(_) => self.clone(),
        };
        Ok(state)
    }
}

/// Build the trees of several models on a pool of `cpus` workers.
///
/// Returns the final state of each model, a failing model does not affect the others.
pub fn build_trees(
    refdir: &Path,
    dir: &Path,
    files: &[PathBuf],
    cpus: usize,
    log: &RunLog,
) -> Result<Vec<(String, GeneTreeState)>, Report> {
    let names = files.iter().map(utils::file_name).collect::<Result<Vec<_>, _>>()?;
    // a single model gets every cpu, several models share the pool
    let threads = match names.len() {
        1 => cpus,
        _ => 1,
    };
    let states = run_parallel(&names, cpus, "trees", |name| {
        let state = build_tree(refdir, dir, name, threads, log);
        (name.clone(), state)
    })?;
    let placed = states.iter().filter(|(_, s)| *s == GeneTreeState::Placed).count();
    log.info(format!("Built {placed} of {} gene trees", states.len()));
    Ok(states)
}
