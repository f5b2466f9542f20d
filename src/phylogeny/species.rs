//! Build the coalescent species tree with ASTRAL.

use crate::error::PhyloError;
use crate::phylogeny::trees::first_line;
use crate::utils::{self, runlog::RunLog, tool::Tool};
use color_eyre::eyre::{Report, Result, WrapErr};
use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable pointing to the ASTRAL jar.
pub const ASTRAL_ENV: &str = "ASTRALJAR";

/// Replace sequence ids in tree labels with the organism name.
///
/// A `|` followed by an id (ex. `|G000001`, `|A12`) is removed, remaining `|` become `_`.
///
/// ```rust
/// use arts::phylogeny::species::organism_labels;
/// assert_eq!(organism_labels("(Sx|G000001:0.1,Sy|A12:0.2);")?, "(Sx:0.1,Sy:0.2);");
/// assert_eq!(organism_labels("Sx|strain|G000001")?, "Sx_strain");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn organism_labels(text: &str) -> Result<String, Report> {
    let re = Regex::new(r"\|[A-Z0-9][0-9]*")?;
    Ok(re.replace_all(text, "").replace('|', "_"))
}

/// Write the first line of every tree, with organism labels, to `output`.
///
/// Missing tree files are skipped with a warning. Returns the number of trees written.
pub fn concat_trees(trees: &[PathBuf], output: &Path, log: &RunLog) -> Result<usize, Report> {
    let mut file = File::create(output).wrap_err_with(|| format!("Unable to create file: {output:?}"))?;
    let mut written = 0;
    for tree in trees {
        if !tree.exists() {
            log.warn(format!("Tree file not found for MLST: {tree:?}"));
            continue;
        }
        let line = organism_labels(&first_line(tree)?)?;
        writeln!(file, "{line}").wrap_err_with(|| format!("Unable to write file: {output:?}"))?;
        written += 1;
    }
    Ok(written)
}

/// Locate the ASTRAL jar.
///
/// Searched in order: the explicit path, the `ASTRALJAR` environment variable and the
/// first `*.jar` of the `astral/` directory next to the executable.
pub fn find_astral(explicit: Option<&Path>) -> Result<PathBuf, PhyloError> {
    let mut searched = Vec::new();

    let candidates = explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(std::env::var_os(ASTRAL_ENV).map(PathBuf::from));
    for candidate in candidates {
        if candidate.is_file() {
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(|p| p.join("astral"))) {
        if let Some(jar) = utils::list_files(&dir, ".jar").ok().and_then(|jars| jars.into_iter().next()) {
            return Ok(jar);
        }
        searched.push(dir);
    }

    Err(PhyloError::AstralMissing { searched })
}

/// Build the species tree `<dir>/astMLST.tree` from the given gene trees.
///
/// ## Arguments
///
/// - `trees` - Gene trees of the single copy models (plus the 16S rRNA tree).
/// - `dir` - Run directory, receives `allmlst_cat.nwk`, `astMLST.tree` and `astral.log`.
/// - `astral` - Optional ASTRAL jar.
pub fn species_tree(trees: &[PathBuf], dir: &Path, astral: Option<&Path>, log: &RunLog) -> Result<PathBuf, Report> {
    let concatenated = dir.join("allmlst_cat.nwk");
    if concat_trees(trees, &concatenated, log)? == 0 {
        Err(PhyloError::NoInputTrees)?
    }

    let jar = find_astral(astral)?;
    log.debug(format!("Using astral {jar:?}"));
    log.info("Started building ASTRAL coalescent MLST tree...");

    let output = dir.join("astMLST.tree");
    Tool::new("java")
        .args(["-Xmx3000M", "-jar"])
        .path_arg(&jar)
        .arg("-i")
        .path_arg(&concatenated)
        .arg("-o")
        .path_arg(&output)
        .args(["-t", "0"])
        .stderr(&dir.join("astral.log"))
        .run(log)?;

    if !output.is_file() {
        Err(PhyloError::NoSpeciesTree(output.clone()))?
    }
    log.info(format!("Finished coalescent tree: {output:?}"));
    Ok(output)
}
