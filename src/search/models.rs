//! Profile model databases: metadata, cutoff values and HMMER file helpers.

use crate::utils::{self, runlog::RunLog, tool::Tool};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Placeholder for metadata fields a source does not provide.
pub const NOT_AVAILABLE: &str = "N/A";

// ----------------------------------------------------------------------------
// Metadata
// ----------------------------------------------------------------------------

/// Descriptive fields of one profile model.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    pub description: String,
    pub function: String,
    pub tc: String,
    pub dnds: String,
    pub single_copy: String,
    pub ubiquity: String,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self::from_fields(&[])
    }
}

impl ModelMetadata {
    /// Build from positional fields `[name, description, function, tc, dnds, single_copy, ubiquity]`,
    /// missing fields become `N/A`.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        let field = |i: usize| fields.get(i).map(|f| f.as_ref().to_string()).unwrap_or(NOT_AVAILABLE.to_string());
        ModelMetadata {
            name: field(0),
            description: field(1),
            function: field(2),
            tc: field(3),
            dnds: field(4),
            single_copy: field(5),
            ubiquity: field(6),
        }
    }

    /// `name: description`, as shown in the reports.
    pub fn label(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }
}

/// Model metadata keyed by model accession (or name when the model has no accession).
pub type MetadataTable = BTreeMap<String, ModelMetadata>;

/// Load model metadata from a `.json`, `.tsv` or `.hmm` file.
///
/// ```rust
/// use arts::search::models::load_metadata;
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("model_metadata.json");
/// std::fs::write(&path, r#"{"TIGR02013": ["rpoB", "RNA polymerase beta", "Transcription", 1200]}"#)?;
/// let metadata = load_metadata(&path)?;
/// assert_eq!(metadata["TIGR02013"].label(), "rpoB: RNA polymerase beta");
/// assert_eq!(metadata["TIGR02013"].tc, "1200");
/// assert_eq!(metadata["TIGR02013"].ubiquity, "N/A");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
///
/// - JSON: an object of arrays, `{"TIGR00001": ["rpoB", "RNA polymerase", "Transcription", ...]}`.
/// - TSV: `model\tfield...` rows, `#` lines are skipped and the first occurrence of a model wins.
/// - HMM: `ACC`, `NAME`, `DESC` and `TC` lines of each model block.
pub fn load_metadata(path: &Path) -> Result<MetadataTable, Report> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
    match ext.as_str() {
        "json" => metadata_from_json(path),
        "tsv" => metadata_from_tsv(path),
        "hmm" => metadata_from_hmm(path),
        _ => Err(eyre!("Could not get model metadata from {path:?}"))
            .suggestion("Ensure the metadata file is .json, .tsv, or .hmm"),
    }
}

fn metadata_from_json(path: &Path) -> Result<MetadataTable, Report> {
    let raw: BTreeMap<String, Vec<serde_json::Value>> = utils::read_json(&path)?;
    let table = raw
        .into_iter()
        .map(|(model, values)| {
            let fields = values
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    v => v.to_string(),
                })
                .collect_vec();
            (model, ModelMetadata::from_fields(&fields))
        })
        .collect();
    Ok(table)
}

fn metadata_from_tsv(path: &Path) -> Result<MetadataTable, Report> {
    let mut table = MetadataTable::new();
    for line in read_lines(path)? {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields = line.trim_end().split('\t').collect_vec();
        table.entry(fields[0].to_string()).or_insert_with(|| ModelMetadata::from_fields(&fields[1..]));
    }
    Ok(table)
}

pub fn metadata_from_hmm(path: &Path) -> Result<MetadataTable, Report> {
    let mut table = MetadataTable::new();
    let (mut acc, mut name, mut desc, mut tc) = (None, None, None, None);

    for line in read_lines(path)? {
        let value = || line.split_whitespace().skip(1).join(" ");
        if line.starts_with("ACC") {
            acc = Some(value());
        } else if line.starts_with("NAME") {
            name = Some(value());
        } else if line.starts_with("DESC") {
            desc = Some(value());
        } else if line.starts_with("TC") {
            tc = line.split_whitespace().nth(1).map(String::from);
        } else if line.starts_with("HMM ") {
            let key = acc.take().or_else(|| name.clone()).unwrap_or(NOT_AVAILABLE.to_string());
            let fields = [
                name.take().unwrap_or(NOT_AVAILABLE.to_string()),
                desc.take().unwrap_or(NOT_AVAILABLE.to_string()),
                NOT_AVAILABLE.to_string(),
                tc.take().unwrap_or(NOT_AVAILABLE.to_string()),
            ];
            table.entry(key).or_insert_with(|| ModelMetadata::from_fields(&fields));
        }
    }
    Ok(table)
}

// ----------------------------------------------------------------------------
// Cutoff Values
// ----------------------------------------------------------------------------

/// Model embedded score cutoffs, `[sequence, domain]` bit scores.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CutoffValues {
    pub ga: Option<[f64; 2]>,
    pub tc: Option<[f64; 2]>,
    pub nc: Option<[f64; 2]>,
}

/// Read the `GA`, `TC` and `NC` lines of every model in an HMM file.
///
/// Models are keyed by `ACC` when present, otherwise by `NAME`. Trailing `;` and any
/// other non numeric characters are stripped from the values.
pub fn cutoff_values(hmm: &Path) -> Result<BTreeMap<String, CutoffValues>, Report> {
    let non_decimal = Regex::new(r"[^\d.]+")?;
    let parse = |value: Option<&str>| -> Option<f64> { non_decimal.replace_all(value?, "").parse().ok() };

    let mut table = BTreeMap::new();
    let (mut name, mut acc, mut values) = (None, None, CutoffValues::default());

    for line in read_lines(hmm)? {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("NAME") => name = fields.next().map(String::from),
            Some("ACC") => acc = fields.next().map(String::from),
            Some(kind @ ("GA" | "TC" | "NC")) => {
                let pair = parse(fields.next()).zip(parse(fields.next())).map(|(s, d)| [s, d]);
                match kind {
                    "GA" => values.ga = pair,
                    "TC" => values.tc = pair,
                    _ => values.nc = pair,
                }
            }
            Some("//") => {
                if let Some(key) = acc.take().or(name.take()) {
                    table.insert(key, std::mem::take(&mut values));
                }
                name = None;
                values = CutoffValues::default();
            }
            _ => (),
        }
    }
    // truncated file without a final terminator
    if let Some(key) = acc.or(name) {
        table.insert(key, values);
    }
    Ok(table)
}

// ----------------------------------------------------------------------------
// HMM Files
// ----------------------------------------------------------------------------

/// Returns `true` if `hmmstat` can read the model file.
pub fn validate_hmm(hmm: &Path, log: &RunLog) -> bool {
    if !hmm.is_file() {
        return false;
    }
    match Tool::new("hmmstat").path_arg(hmm).run(log) {
        Ok(_) => true,
        Err(e) => {
            log.warn(format!("Invalid hmm model file {hmm:?}: {e}"));
            false
        }
    }
}

/// Convert a model file to the current HMMER format with `hmmconvert`.
pub fn convert_hmm(hmm: &Path, output: &Path, log: &RunLog) -> Result<PathBuf, Report> {
    Tool::new("hmmconvert")
        .path_arg(hmm)
        .stdout(output)
        .run(log)
        .wrap_err_with(|| format!("Failed to convert hmm models: {hmm:?}"))?;
    Ok(output.to_path_buf())
}

/// Concatenate the valid model files into a new `hmmdb_*.hmm` inside `dir`.
///
/// Returns [`None`] when none of the files exist.
pub fn concat_hmms(hmms: &[PathBuf], dir: &Path, log: &RunLog) -> Result<Option<PathBuf>, Report> {
    let files = hmms.iter().filter(|p| p.is_file()).collect_vec();
    if files.is_empty() {
        return Ok(None);
    }

    let (mut output, path) = tempfile::Builder::new()
        .prefix("hmmdb_")
        .suffix(".hmm")
        .tempfile_in(dir)
        .wrap_err_with(|| format!("Failed to create hmm database in {dir:?}"))?
        .keep()
        .wrap_err("Failed to keep hmm database")?;

    for file in files {
        if !validate_hmm(file, log) {
            continue;
        }
        let content = std::fs::read(file).wrap_err_with(|| format!("Failed to read file: {file:?}"))?;
        output.write_all(&content).wrap_err_with(|| format!("Failed to write file: {path:?}"))?;
    }
    log.debug(format!("Combined hmm models into {path:?}"));
    Ok(Some(path))
}

/// Merge custom models into a database: both are converted and concatenated.
///
/// Returns the original database if the custom models are invalid.
pub fn merge_custom(
    db: &Path,
    custom: Option<&Path>,
    name: &str,
    dir: &Path,
    log: &RunLog,
) -> Result<PathBuf, Report> {
    let Some(custom) = custom.filter(|c| validate_hmm(c, log)) else {
        return Ok(db.to_path_buf());
    };
    let converted = [
        convert_hmm(db, &dir.join(format!("{name}.hmm")), log)?,
        convert_hmm(custom, &dir.join(format!("cust{name}.hmm")), log)?,
    ];
    let merged = concat_hmms(&converted, dir, log)?.unwrap_or(db.to_path_buf());
    log.info(format!("Combined {name} models = {merged:?}"));
    Ok(merged)
}

/// The core model database and its metadata.
#[derive(Clone, Debug, Default)]
pub struct CoreDatabase {
    pub hmm: PathBuf,
    pub metadata: MetadataTable,
}

impl CoreDatabase {
    /// Choose the core models for a run.
    ///
    /// A list of valid user databases replaces the reference models. Otherwise
    /// `coremodels.hmm` (or `coremodels_exp.hmm` in expert mode) of the reference directory
    /// is used with its `model_metadata.json`. Custom core models are merged in last.
    pub fn prepare(
        refdir: &Path,
        hmmdblist: &[PathBuf],
        custom: Option<&Path>,
        expert: bool,
        dir: &Path,
        log: &RunLog,
    ) -> Result<Self, Report> {
        let user_dbs = !hmmdblist.is_empty() && hmmdblist.iter().all(|db| validate_hmm(db, log));
        let user_db = match user_dbs {
            true => concat_hmms(hmmdblist, dir, log)?,
            false => None,
        };

        let mut database = match user_db {
            Some(hmm) => {
                let metadata = metadata_from_hmm(&hmm)?;
                CoreDatabase { hmm, metadata }
            }
            None => {
                let expert_hmm = refdir.join("coremodels_exp.hmm");
                let hmm = match expert && expert_hmm.exists() {
                    true => expert_hmm,
                    false => refdir.join("coremodels.hmm"),
                };
                let metadata_path = ["model_metadata.json", "model_metadata.tsv"]
                    .iter()
                    .map(|f| refdir.join(f))
                    .find(|p| p.exists());
                let metadata = match metadata_path {
                    Some(path) => load_metadata(&path)?,
                    None if hmm.exists() => metadata_from_hmm(&hmm)?,
                    None => MetadataTable::new(),
                };
                CoreDatabase { hmm, metadata }
            }
        };

        if !database.hmm.is_file() {
            Err(eyre!("No core hmm models found: {:?}", database.hmm))
                .suggestion("Check the reference directory or the --hmmdblist models.")?
        }

        if let Some(custom) = custom.filter(|c| c.exists()) {
            let merged = merge_custom(&database.hmm, Some(custom), "core", dir, log)?;
            if merged != database.hmm {
                database.metadata.extend(metadata_from_hmm(custom)?);
                database.hmm = merged;
            }
        }

        Ok(database)
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, Report> {
    let file = File::open(path).wrap_err_with(|| format!("Failed to read file: {path:?}"))?;
    BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .wrap_err_with(|| format!("Failed to read lines from: {path:?}"))
}
