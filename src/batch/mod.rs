//! Run one or more genomes and combine the results of a batch.

pub mod plot;

use crate::cli::{combine::CombineArgs, run::RunArgs};
use crate::pipeline;
use crate::report::RunSummary;
use crate::utils::{self, runlog::RunLog, table::Table, tool::Tool};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Tables of each genome combined into one table of the batch: `(per genome, combined)`.
pub const COMBINED_TABLES: [(&str, &str); 3] = [
    ("coretable.tsv", "combined_coretable.tsv"),
    ("knownhits.tsv", "combined_knownhits.tsv"),
    ("duptable.tsv", "combined_duptable.tsv"),
];

// ----------------------------------------------------------------------------
// Inputs
// ----------------------------------------------------------------------------

/// Split comma separated inputs, repeated names get an increasing `_<n>` suffix.
///
/// ```rust
/// use arts::batch::parse_input_orgs;
/// assert_eq!(parse_input_orgs("a.gbk,b.gbk,a.gbk"), ["a.gbk", "b.gbk", "a.gbk_1"]);
/// assert_eq!(parse_input_orgs("a.gbk"), ["a.gbk"]);
/// ```
pub fn parse_input_orgs(input: &str) -> Vec<String> {
    let mut counter = 0;
    let mut names: Vec<String> = Vec::new();
    for name in input.split(',') {
        match names.iter().any(|n| n == name) {
            true => {
                counter += 1;
                names.push(format!("{name}_{counter}"));
            }
            false => names.push(name.to_string()),
        }
    }
    names
}

// ----------------------------------------------------------------------------
// Manifest
// ----------------------------------------------------------------------------

/// The `all_paths` manifest: result directory and input file of every genome.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Manifest {
    pub entries: Vec<(PathBuf, String)>,
}

impl Manifest {
    pub const HEADER: &'static str = "#Result Directory\tInput File";

    pub fn new() -> Self {
        Manifest::default()
    }

    pub fn push(&mut self, dir: &Path, input: &str) {
        self.entries.push((dir.to_path_buf(), input.to_string()));
    }

    pub fn write(&self, path: &Path) -> Result<(), Report> {
        let mut file = File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
        writeln!(file, "{}", Manifest::HEADER)?;
        for (dir, input) in &self.entries {
            writeln!(file, "{}\t{input}", dir.display())?;
        }
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, Report> {
        let file = File::open(path).wrap_err_with(|| format!("Failed to read manifest: {path:?}"))?;
        let mut manifest = Manifest::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let (dir, input) =
                line.split_once('\t').ok_or_else(|| eyre!("Malformed manifest line in {path:?}: {line}"))?;
            manifest.push(Path::new(dir), input);
        }
        Ok(manifest)
    }

    /// Short name of each genome, the input file stem (or name) of the entry.
    pub fn labels(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(_, input)| utils::file_stem(&input).unwrap_or_else(|_| input.clone()))
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Run
// ----------------------------------------------------------------------------

/// Run the analysis on every input of `args.input`.
///
/// A single input runs in the result directory. Several inputs run one after the other in
/// `<main>/<main name>_<i>`, then the batch results are combined.
pub fn run(args: &RunArgs) -> Result<PathBuf, Report> {
    let inputs = parse_input_orgs(&args.input);
    let main_dir = match &args.resultdir {
        Some(dir) => utils::create_dir(dir)?,
        None => {
            let parent = args.tempdir.clone().unwrap_or_else(std::env::temp_dir);
            tempfile::Builder::new()
                .prefix("arts-query-")
                .tempdir_in(&parent)
                .wrap_err_with(|| format!("Failed to create a result directory in {parent:?}"))?
                .into_path()
        }
    };

    if inputs.len() == 1 {
        let log = RunLog::new("arts").with_file(&main_dir.join("arts-query.log"))?;
        pipeline::run_query(args, Path::new(&args.input), &main_dir, &log)?;
        return Ok(main_dir);
    }

    let combined = RunLog::new("combined").with_file(&main_dir.join("combined.log"))?;
    let main_name = utils::file_name(&main_dir)?;
    let paths = args.input.split(',').collect_vec();
    let mut manifest = Manifest::new();

    for (i, (name, path)) in inputs.iter().zip(paths).enumerate() {
        let dir = main_dir.join(format!("{main_name}_{i}"));
        if !dir.exists() {
            utils::create_dir(&dir)?;
            link_progress(&dir, &combined);
        }
        manifest.push(&dir, path);

        combined.info(format!("artspipeline number {} start: {name}", i + 1));
        let log = combined.child(&format!("arts-query-{i}")).with_file(&dir.join("arts-query.log"))?;
        if let Err(e) = pipeline::run_query(args, Path::new(path), &dir, &log) {
            combined.exception(format!("artspipeline number {} failed", i + 1), &e);
        }
        combined.info(format!("artspipeline number {} end", i + 1));
    }

    combined.info(format!("Run bigscape: {} {:?}", args.runbigscape, args.bigscapepath));
    match (&args.bigscapepath, args.runbigscape) {
        (Some(bigscape), true) => {
            if let Err(e) = run_bigscape(&manifest, bigscape, &main_dir, &combined) {
                combined.exception("Bigscape couldn't run", &e);
            }
        }
        (None, true) => combined.warn("No BiG-SCAPE location given with --bigscapepath"),
        _ => (),
    }

    manifest.write(&main_dir.join("all_paths"))?;
    if let Err(e) = combine_results(&manifest, &main_dir, &combined) {
        combined.exception("Problem combining results", &e);
    }

    Ok(main_dir)
}

/// Link a result directory next to the main directory, so progress can be followed during the batch.
fn link_progress(dir: &Path, log: &RunLog) {
    let (Some(main_dir), Some(name)) = (dir.parent(), dir.file_name()) else { return };
    let Some(parent) = main_dir.parent() else { return };
    let link = parent.join(name);
    if link.exists() {
        return;
    }
    #[cfg(unix)]
    {
        let target = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        if let Err(e) = std::os::unix::fs::symlink(&target, &link) {
            log.warn(format!("Could not link {dir:?} to {link:?}: {e}"));
        }
    }
    #[cfg(not(unix))]
    {
        log.debug(format!("Symbolic links are not supported, {link:?} was not created"));
    }
}

// ----------------------------------------------------------------------------
// BiG-SCAPE
// ----------------------------------------------------------------------------

/// Copy the antiSMASH results of the batch into `all_antismash/` and group their clusters with BiG-SCAPE.
///
/// The region files and their inputs are written to `bigscape_regions.tsv`.
pub fn run_bigscape(manifest: &Manifest, bigscape: &Path, main_dir: &Path, log: &RunLog) -> Result<PathBuf, Report> {
    log.info("bigscape run start");
    let all_antismash = utils::create_dir(&main_dir.join("all_antismash"))?;
    let mut regions = Table::with_headers(&["#Region file", "Input File"]);

    for (dir, input) in &manifest.entries {
        let antismash = dir.join("antismash");
        if !antismash.is_dir() {
            log.warn(format!("No antiSMASH results in {dir:?}"));
            continue;
        }
        utils::copy_dir(&antismash, &all_antismash.join(utils::file_name(dir)?))?;
        for file in utils::list_files(&antismash, ".gbk")? {
            let name = utils::file_name(&file)?;
            if name.contains(".region") || name.contains(".cluster") {
                regions.add_row(vec![file.display().to_string(), input.clone()])?;
            }
        }
    }
    regions.write(&main_dir.join("bigscape_regions.tsv"))?;

    let output = main_dir.join("antismash_bigscape_result");
    Tool::new("python3")
        .path_arg(bigscape)
        .arg("-i")
        .path_arg(&all_antismash)
        .arg("-o")
        .path_arg(&output)
        .arg("--mix")
        .log_to(&main_dir.join("bigscape.log"))
        .run(log)?;
    log.info(format!("bigscape run saved to: {output:?}"));

    Ok(output)
}

// ----------------------------------------------------------------------------
// Combine
// ----------------------------------------------------------------------------

/// Re-run the combine step of a finished batch from its `all_paths` manifest.
pub fn combine(args: &CombineArgs) -> Result<(), Report> {
    let log = RunLog::new("combined").with_file(&args.dir.join("combined.log"))?;
    let manifest = Manifest::read(&args.dir.join("all_paths"))?;
    combine_results(&manifest, &args.dir, &log)
}

/// Write the combined tables, `summary.tsv` and `summary.svg` of a batch.
pub fn combine_results(manifest: &Manifest, main_dir: &Path, log: &RunLog) -> Result<(), Report> {
    for (table, output) in COMBINED_TABLES {
        let combined = combine_table(manifest, table, log)?;
        combined.write(&main_dir.join(output))?;
        log.info(format!("Combined {} rows of {table} into {output}", combined.rows.len()));
    }

    let summaries = manifest
        .labels()
        .into_iter()
        .zip(&manifest.entries)
        .filter_map(|(label, (dir, _))| match RunSummary::read(&dir.join("tables").join("summary.json")) {
            Ok(summary) => Some((label, summary)),
            Err(e) => {
                log.warn(format!("No summary for {dir:?}: {e}"));
                None
            }
        })
        .collect_vec();

    summary_table(&summaries)?.write(&main_dir.join("summary.tsv"))?;
    plot::write_summary_plot(&summaries, &main_dir.join("summary.svg"))?;
    Ok(())
}

/// Concatenate one table of every genome, with the genome as the first column.
///
/// Tables with a different header than the first one found are skipped.
pub fn combine_table(manifest: &Manifest, name: &str, log: &RunLog) -> Result<Table, Report> {
    let mut combined = Table::new();

    for (label, (dir, _)) in manifest.labels().into_iter().zip(&manifest.entries) {
        let path = dir.join("tables").join(name);
        if !path.exists() {
            log.debug(format!("No {name} in {dir:?}"));
            continue;
        }
        let table = Table::read(&path)?;
        let columns = table.headers.iter().map(|h| h.trim_start_matches('#').to_string());
        let columns = std::iter::once("#Input".to_string()).chain(columns).collect_vec();
        if combined.headers.is_empty() {
            combined.headers = columns;
        } else if combined.headers != columns {
            log.warn(format!("Skipping {path:?}, its columns differ from the other {name} tables"));
            continue;
        }
        for row in table.rows {
            combined.rows.push(std::iter::once(label.clone()).chain(row).collect());
        }
    }

    Ok(combined)
}

/// One row of counts per genome.
pub fn summary_table(summaries: &[(String, RunSummary)]) -> Result<Table, Report> {
    let mut table = Table::with_headers(&[
        "#Input",
        "Organism",
        "Core_genes",
        "Known_hits",
        "DUF_hits",
        "BGCs",
        "Duplication",
        "BGC_Proximity",
        "Phylogeny",
        "Two_plus",
        "Three_plus",
        "Failed_stages",
    ]);
    for (label, s) in summaries {
        let counts = [
            s.core_genes,
            s.known_hits,
            s.duf_hits,
            s.clusters,
            s.duplicates,
            s.proximity,
            s.phylogeny,
            s.multi_criteria.two_plus.len(),
            s.multi_criteria.three_plus.len(),
        ];
        let row = [label.clone(), s.organism.clone()]
            .into_iter()
            .chain(counts.iter().map(|c| c.to_string()))
            .chain([s.stages.failed().join(",")])
            .collect_vec();
        table.add_row(row)?;
    }
    Ok(table)
}
