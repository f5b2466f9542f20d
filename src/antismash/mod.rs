//! Run antiSMASH on the query before the analysis, or rebuild its results from a JSON file.

#[cfg(test)]
mod tests;

use crate::error::ToolError;
use crate::utils::{self, runlog::RunLog, tool::Tool};
use color_eyre::eyre::{Report, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Wall-clock limit of an antiSMASH run, in seconds.
pub const DEFAULT_TIMEOUT: u64 = 10800;

/// Log line of an input without gene annotations.
const GENEFINDING_DISABLED: &str = "Called find_genes, but genefinding disabled";
/// Log line of a WGS master record, which carries no sequence.
const WGS_UNSUPPORTED: &str = "whole genome shotgun records are not supported";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AntismashConfig {
    /// The `run_antismash.py` script.
    pub path: PathBuf,
    pub cpus: usize,
    pub timeout: Duration,
}

impl AntismashConfig {
    pub fn new(path: &Path) -> Self {
        AntismashConfig { path: path.to_path_buf(), cpus: 1, timeout: Duration::from_secs(DEFAULT_TIMEOUT) }
    }
}

/// What the antiSMASH log asks for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogVerdict {
    Done,
    NeedsGeneFinding,
    WgsRecord,
}

/// Scan an antiSMASH log.
pub fn check_log(log_text: &str) -> LogVerdict {
    if log_text.contains(WGS_UNSUPPORTED) {
        LogVerdict::WgsRecord
    } else if log_text.contains(GENEFINDING_DISABLED) {
        LogVerdict::NeedsGeneFinding
    } else {
        LogVerdict::Done
    }
}

/// Returns the main GenBank output of an antiSMASH directory.
///
/// Region (v5+) and cluster (v3/4) files are skipped.
pub fn main_output(dir: &Path) -> Result<Option<PathBuf>, Report> {
    let output = utils::list_files(&dir, ".gbk")?.into_iter().find(|path| {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        !name.contains("region") && !name.contains("cluster")
    });
    Ok(output)
}

/// Run antiSMASH on `input`, writing into `<dir>/antismash` and logging to `<dir>/aslog.txt`.
///
/// Returns the annotated GenBank file, or `input` when antiSMASH is missing or produced
/// nothing. A timeout is logged and the run goes on with whatever was written.
pub fn run_antismash(config: &AntismashConfig, input: &Path, dir: &Path, log: &RunLog) -> Result<PathBuf, Report> {
    if !config.path.exists() || !input.exists() {
        log.error(format!("Could not find Antismash executable {:?} and/or input file {input:?}", config.path));
        return Ok(input.to_path_buf());
    }

    let output_dir = dir.join("antismash");
    let aslog = dir.join("aslog.txt");
    let command = |extra: &[&str]| {
        Tool::new("python3")
            .path_arg(&config.path)
            .path_arg(input)
            .arg("--minimal")
            .arg("--output-dir")
            .path_arg(&output_dir)
            .arg("-v")
            .arg("--cpus")
            .arg(config.cpus)
            .args(extra)
            .log_to(&aslog)
    };

    run_logged(&command(&[]), config.timeout, log);
    let log_text = std::fs::read_to_string(&aslog).unwrap_or_default();
    match check_log(&log_text) {
        LogVerdict::WgsRecord => {
            log.warn(format!(
                "antiSMASH does not support WGS records without sequences, provide the full record for {input:?}"
            ));
        }
        LogVerdict::NeedsGeneFinding => {
            log.info("No gene annotations found, re-running antiSMASH with prodigal gene finding");
            // antiSMASH refuses a non-empty output directory
            utils::remove_path(&output_dir)?;
            run_logged(&command(&["--genefinding-tool", "prodigal"]), config.timeout, log);
        }
        LogVerdict::Done => (),
    }

    match main_output(&output_dir)? {
        Some(output) => {
            log.info(format!("Finished Antismash: {output:?}"));
            Ok(output)
        }
        None => {
            log.error("Could not find Antismash output");
            Ok(input.to_path_buf())
        }
    }
}

/// Run antiSMASH, logging instead of returning its failure.
fn run_logged(tool: &Tool, timeout: Duration, log: &RunLog) {
    match tool.run_with_timeout(timeout, log) {
        Ok(()) => (),
        Err(ToolError::TimedOut { .. }) => {
            log.error("Antismash taking too long, please use antismash servers for job and try again with json file")
        }
        Err(e) => log.warn(format!("Antismash exited with an error: {e}")),
    }
}

/// Rebuild antiSMASH results from a JSON file with `--reuse-results`.
///
/// Returns `<outdir>/<input stem>.gbk`, the log goes to `aslog.txt` next to `outdir`.
pub fn reuse_results(config: &AntismashConfig, input: &Path, outdir: &Path, log: &RunLog) -> Result<PathBuf, Report> {
    utils::create_dir(&outdir.join("knownclusterblast"))?;
    let aslog = outdir.parent().unwrap_or(outdir).join("aslog.txt");

    let tool = Tool::new("python3")
        .path_arg(&config.path)
        .arg("--reuse-results")
        .path_arg(input)
        .arg("--output-dir")
        .path_arg(outdir)
        .arg("--cpus")
        .arg(config.cpus)
        .log_to(&aslog);
    if let Err(e) = tool.run(log) {
        log.error(format!("Error running Antismash reuse-results: {e}"));
    }

    let output = outdir.join(format!("{}.gbk", utils::file_stem(&input)?));
    log.info(format!("Antismash reuse-results output: {output:?}"));
    Ok(output)
}
