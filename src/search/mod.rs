//! Profile searches with `hmmsearch` and parsing of its per-domain tables into [`HitTable`]s.

pub mod models;
#[cfg(test)]
mod tests;

use crate::genome::store::GeneStore;
use crate::utils::{self, runlog::RunLog, table::Table, tool::Tool};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use models::CutoffValues;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Sequences with a worse e-value are not extracted as core or RNA genes.
pub const MAX_EVALUE: f64 = 0.1;

/// E-value used when the search itself is not limited by a model cutoff.
pub const DEFAULT_EVALUE: f64 = 0.01;

// ----------------------------------------------------------------------------
// Cutoff Policy
// ----------------------------------------------------------------------------

/// How profile hits are filtered by score.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum CutoffPolicy {
    /// Model trusted cutoff, applied by `hmmsearch --cut_tc`.
    #[default]
    Trusted,
    /// Model gathering cutoff, applied after the search.
    Gathering,
    /// Model noise cutoff, applied after the search.
    Noise,
    /// A fraction of the model noise cutoff, applied after the search.
    NoiseFraction(f64),
    /// A global e-value threshold.
    Evalue(f64),
}

impl FromStr for CutoffPolicy {
    type Err = Report;

    /// Parse a threshold argument.
    ///
    /// ```rust
    /// use arts::search::CutoffPolicy;
    /// assert_eq!("tc".parse::<CutoffPolicy>()?, CutoffPolicy::Trusted);
    /// assert_eq!("GA".parse::<CutoffPolicy>()?, CutoffPolicy::Gathering);
    /// assert_eq!("E2".parse::<CutoffPolicy>()?, CutoffPolicy::NoiseFraction(0.75));
    /// assert_eq!("1e-5".parse::<CutoffPolicy>()?, CutoffPolicy::Evalue(1e-5));
    /// assert!("E7".parse::<CutoffPolicy>().is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    fn from_str(value: &str) -> Result<Self, Report> {
        let policy = match value.trim().to_uppercase().as_str() {
            "TC" => CutoffPolicy::Trusted,
            "GA" => CutoffPolicy::Gathering,
            "NC" => CutoffPolicy::Noise,
            "E1" => CutoffPolicy::NoiseFraction(0.90),
            "E2" => CutoffPolicy::NoiseFraction(0.75),
            "E3" => CutoffPolicy::NoiseFraction(0.50),
            "E4" => CutoffPolicy::NoiseFraction(0.30),
            other => match other.parse::<f64>() {
                Ok(evalue) if evalue > 0.0 => CutoffPolicy::Evalue(evalue),
                _ => Err(eyre!("Invalid threshold: {value}"))?,
            },
        };
        Ok(policy)
    }
}

impl CutoffPolicy {
    /// Parse a threshold argument, unparseable values fall back to the trusted cutoff.
    pub fn parse_or_default(value: Option<&str>, log: &RunLog) -> Self {
        match value.map(CutoffPolicy::from_str) {
            None => CutoffPolicy::default(),
            Some(Ok(policy)) => policy,
            Some(Err(e)) => {
                log.warn(format!("{e}, using default trusted cutoffs"));
                CutoffPolicy::default()
            }
        }
    }

    /// The `hmmsearch` reporting arguments.
    pub fn hmmsearch_args(&self) -> Vec<String> {
        match self {
            CutoffPolicy::Trusted => vec!["--cut_tc".to_string()],
            CutoffPolicy::Evalue(evalue) => vec!["-E".to_string(), evalue.to_string()],
            _ => vec!["-E".to_string(), DEFAULT_EVALUE.to_string()],
        }
    }

    /// Per model minimum bit scores for the policies that filter after the search.
    ///
    /// Models without the requested cutoff get a threshold of `0`.
    pub fn thresholds(&self, cutoffs: &BTreeMap<String, CutoffValues>) -> Option<BTreeMap<String, f64>> {
        let select = |values: &CutoffValues| -> f64 {
            match self {
                CutoffPolicy::Gathering => values.ga.map(|v| v[0]).unwrap_or(0.0),
                CutoffPolicy::Noise => values.nc.map(|v| v[0]).unwrap_or(0.0),
                CutoffPolicy::NoiseFraction(f) => values.nc.map(|v| v[0] * f).unwrap_or(0.0),
                _ => 0.0,
            }
        };
        match self {
            CutoffPolicy::Gathering | CutoffPolicy::Noise | CutoffPolicy::NoiseFraction(_) => {
                Some(cutoffs.iter().map(|(model, values)| (model.clone(), select(values))).collect())
            }
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// hmmsearch
// ----------------------------------------------------------------------------

/// Run `hmmsearch` and return the path of its per-domain table (`domrslt_*.domhr` in `dir`).
///
/// The program log is written next to the table (`domrslt_*.domhr.log`).
pub fn run_hmmsearch(
    query: &Path,
    db: &Path,
    dir: &Path,
    cutoff: &CutoffPolicy,
    cpus: usize,
    log: &RunLog,
) -> Result<PathBuf, Report> {
    let (_, domtbl) = tempfile::Builder::new()
        .prefix("domrslt_")
        .suffix(".domhr")
        .tempfile_in(dir)
        .wrap_err_with(|| format!("Failed to create search result file in {dir:?}"))?
        .keep()
        .wrap_err("Failed to keep search result file")?;
    let log_path = PathBuf::from(format!("{}.log", domtbl.display()));

    let mut tool = Tool::new("hmmsearch").args(cutoff.hmmsearch_args());
    if cpus > 1 {
        tool = tool.arg("--cpu").arg(cpus);
    }
    tool.arg("--domtblout")
        .path_arg(&domtbl)
        .args(["--noali", "--notextw"])
        .path_arg(db)
        .path_arg(query)
        .stdout(&log_path)
        .run(log)?;

    Ok(domtbl)
}

// ----------------------------------------------------------------------------
// Hits
// ----------------------------------------------------------------------------

/// Returns the contig and `[start, end, strand]` encoded in a sequence header.
///
/// ```rust
/// use arts::search::parse_source_location;
/// let (source, loc) = parse_source_location("Sx|source|contig_1|loc|100_400_-1|G000001");
/// assert_eq!(source, "contig_1");
/// assert_eq!(loc, ["100", "400", "-1"]);
///
/// let (source, loc) = parse_source_location("G000001");
/// assert_eq!(source, "");
/// assert_eq!(loc, ["", "", ""]);
/// ```
pub fn parse_source_location(header: &str) -> (String, [String; 3]) {
    let tag_value = |tag: &str| -> Option<&str> {
        let start = header.find(tag)? + tag.len();
        let rest = &header[start..];
        Some(rest.split('|').next().unwrap_or(rest))
    };
    let source = tag_value("|source|").unwrap_or_default().trim().to_string();
    let mut location: [String; 3] = Default::default();
    if let Some(loc) = tag_value("|loc|") {
        for (i, part) in loc.trim().split('_').take(3).enumerate() {
            location[i] = part.to_string();
        }
    }
    (source, location)
}

/// One row of a `hmmsearch` per-domain table.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Hit {
    pub seqid: String,
    /// Model accession, or name when the model has no accession.
    pub model: String,
    pub model_name: String,
    pub source: String,
    pub start: String,
    pub end: String,
    pub strand: String,
    pub evalue: f64,
    pub bitscore: f64,
    pub description: String,
}

impl Hit {
    /// Parse one data line of a `--domtblout` table.
    pub fn from_domtbl_line(line: &str) -> Result<Self, Report> {
        let fields = line.split_whitespace().collect_vec();
        if fields.len() < 22 {
            Err(eyre!("Expected at least 22 columns in domain table line: {line}"))?
        }
        let target = fields[0];
        let (source, [start, end, strand]) = parse_source_location(target);
        let model = match fields[4] {
            "-" => fields[3],
            acc => acc,
        };
        let hit = Hit {
            seqid: target.rsplit('|').next().unwrap_or(target).to_string(),
            model: model.to_string(),
            model_name: fields[3].to_string(),
            source,
            start,
            end,
            strand,
            evalue: fields[6].parse().wrap_err_with(|| format!("Invalid e-value: {}", fields[6]))?,
            bitscore: fields[7].parse().wrap_err_with(|| format!("Invalid bit score: {}", fields[7]))?,
            description: fields[22..].join(" ").replace('\'', ""),
        };
        Ok(hit)
    }

    /// `[seqid, model, source, start, end, strand, evalue, bitscore]`
    pub fn location_row(&self) -> Value {
        json!([self.seqid, self.model, self.source, self.start, self.end, self.strand, self.evalue, self.bitscore])
    }

    /// `[model, model_name, seqid, evalue, bitscore]`, plus the sequence description if requested.
    pub fn model_row(&self, with_description: bool) -> Vec<String> {
        let mut row = vec![
            self.model.clone(),
            self.model_name.clone(),
            self.seqid.clone(),
            self.evalue.to_string(),
            self.bitscore.to_string(),
        ];
        if with_description {
            row.push(self.description.clone());
        }
        row
    }

    /// `{seqid}|{source}:{start}-{end}`, used to list hits in the reports.
    pub fn label(&self) -> String {
        format!("{}|{}:{}-{}", self.seqid, self.source, self.start, self.end)
    }

    fn start_end(&self) -> Option<(u64, u64)> {
        Some((self.start.parse().ok()?, self.end.parse().ok()?))
    }
}

/// Parsed hits of one search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HitTable {
    /// The first hit of each sequence, in table order.
    pub data: Vec<Hit>,
    /// The best scoring hit of each sequence.
    pub seqs: BTreeMap<String, Hit>,
    /// Hits of each model by sequence.
    pub by_model: BTreeMap<String, BTreeMap<String, Hit>>,
    /// Every hit, in table order.
    pub hits: Vec<Hit>,
    pub with_description: bool,
}

impl HitTable {
    pub fn new(with_description: bool) -> Self {
        HitTable { with_description, ..Default::default() }
    }

    /// Collect hits, the best hit of a sequence is only replaced by a strictly higher bit score.
    pub fn from_hits<I>(hits: I, with_description: bool) -> Self
    where
        I: IntoIterator<Item = Hit>,
    {
        let mut table = HitTable::new(with_description);
        hits.into_iter().for_each(|hit| table.add(hit));
        table
    }

    /// Parse a `hmmsearch --domtblout` table, keeping hits with an e-value up to `max_evalue`.
    ///
    /// ## Arguments
    ///
    /// - `path` - Per-domain table.
    /// - `max_evalue` - Optional full sequence e-value limit.
    /// - `with_description` - Keep the target description in the model rows.
    pub fn from_domtbl(path: &Path, max_evalue: Option<f64>, with_description: bool) -> Result<Self, Report> {
        let file = File::open(path).wrap_err_with(|| format!("Failed to read file: {path:?}"))?;
        let mut hits = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.wrap_err_with(|| format!("Failed to read line from: {path:?}"))?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let hit = Hit::from_domtbl_line(&line).wrap_err_with(|| format!("Invalid hit in {path:?}"))?;
            if max_evalue.map_or(true, |max| hit.evalue <= max) {
                hits.push(hit);
            }
        }
        Ok(Self::from_hits(hits, with_description))
    }

    fn add(&mut self, hit: Hit) {
        match self.seqs.get(&hit.seqid) {
            None => {
                self.data.push(hit.clone());
                self.seqs.insert(hit.seqid.clone(), hit.clone());
            }
            Some(best) if best.bitscore < hit.bitscore => {
                self.seqs.insert(hit.seqid.clone(), hit.clone());
            }
            Some(_) => (),
        }
        self.by_model.entry(hit.model.clone()).or_default().insert(hit.seqid.clone(), hit.clone());
        self.hits.push(hit);
    }

    /// A new table with the hits (every hit, not only the best ones) for which `keep` is `true`.
    pub fn filter<F>(&self, keep: F) -> Self
    where
        F: Fn(&Hit) -> bool,
    {
        // table order, so that ties keep the first seen hit
        let hits = self.hits.iter().filter(|hit| keep(hit)).cloned();
        Self::from_hits(hits, self.with_description)
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// `{"data": [...], "seqs": {seqid: location_row}, "<model>": {seqid: model_row}}`
    pub fn to_json(&self) -> Value {
        let mut json = Map::new();
        let data = self.data.iter().map(|h| h.model_row(self.with_description)).collect_vec();
        json.insert("data".to_string(), json!(data));
        let seqs: Map<String, Value> = self.seqs.iter().map(|(id, h)| (id.clone(), h.location_row())).collect();
        json.insert("seqs".to_string(), Value::Object(seqs));
        for (model, hits) in &self.by_model {
            let rows: Map<String, Value> =
                hits.iter().map(|(id, h)| (id.clone(), json!(h.model_row(self.with_description)))).collect();
            json.insert(model.clone(), Value::Object(rows));
        }
        Value::Object(json)
    }

    /// One row per sequence (its first hit), header `#Model Description Sequence id evalue bitscore`.
    pub fn to_table(&self) -> Result<Table, Report> {
        let mut headers = vec!["#Model", "Description", "Sequence id", "evalue", "bitscore"];
        if self.with_description {
            headers.push("Sequence description");
        }
        let mut table = Table::with_headers(&headers);
        for hit in &self.data {
            table.add_row(hit.model_row(self.with_description))?;
        }
        Ok(table)
    }

    /// Write `<dir>/<name>.json` and `<dir>/<name>.tsv`.
    pub fn write(&self, dir: &Path, name: &str) -> Result<(), Report> {
        utils::write_json(&dir.join(format!("{name}.json")), &self.to_json())?;
        self.to_table()?.write(&dir.join(format!("{name}.tsv")))
    }
}

// ----------------------------------------------------------------------------
// Searches
// ----------------------------------------------------------------------------

/// Run an annotation search (known resistance or DUF models) with trusted cutoffs.
///
/// The raw table is kept as `<dir>/<name>.domhr` and the hits are written to
/// `<dir>/tables/<name>.{json,tsv}`.
pub fn annotation_search(
    query: &Path,
    db: &Path,
    dir: &Path,
    name: &str,
    cpus: usize,
    log: &RunLog,
) -> Result<HitTable, Report> {
    let domtbl = run_hmmsearch(query, db, dir, &CutoffPolicy::Trusted, cpus, log)?;
    let renamed = dir.join(format!("{name}.domhr"));
    std::fs::rename(&domtbl, &renamed).wrap_err_with(|| format!("Failed to rename {domtbl:?} to {renamed:?}"))?;

    let table = HitTable::from_domtbl(&renamed, None, true)?;
    table.write(&dir.join("tables"), name)?;
    Ok(table)
}

/// Search RNA models against the query nucleotides and write the best hit of each model
/// to `<dir>/coregenes/RNA_<model name>.fna`. Returns the number of files written.
pub fn rna_search(
    genes: &GeneStore,
    query: &Path,
    db: &Path,
    dir: &Path,
    cpus: usize,
    log: &RunLog,
) -> Result<usize, Report> {
    let domtbl = run_hmmsearch(query, db, dir, &CutoffPolicy::Trusted, cpus, log)?;
    let table = HitTable::from_domtbl(&domtbl, Some(MAX_EVALUE), false)?;

    let mut written = 0;
    for hits in table.by_model.values() {
        // highest bit score, first seen on ties
        let Some(best) = hits.values().reduce(|best, hit| if hit.bitscore > best.bitscore { hit } else { best })
        else {
            continue;
        };
        let path = dir.join("coregenes").join(format!("RNA_{}.fna", best.model_name));
        written += genes.write_tree_fasta(&path, &[best.seqid.as_str()])?;
    }
    log.info(format!("RNA genes extracted: {written}"));
    Ok(written)
}

/// Core gene hits: each sequence assigned to its best model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoreHits {
    pub table: HitTable,
    /// Sequence ids of each model.
    pub models: BTreeMap<String, Vec<String>>,
}

impl CoreHits {
    /// Assign every sequence of a filtered table to its best model.
    pub fn from_table(table: HitTable) -> Self {
        let mut models: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for hit in table.seqs.values() {
            models.entry(hit.model.clone()).or_default().push(hit.seqid.clone());
        }
        CoreHits { table, models }
    }

    /// Parse a core search table: e-value up to [`MAX_EVALUE`], then the per model thresholds.
    pub fn from_domtbl(path: &Path, thresholds: Option<&BTreeMap<String, f64>>) -> Result<Self, Report> {
        let table = HitTable::from_domtbl(path, Some(MAX_EVALUE), false)?;
        let table = match thresholds {
            Some(thresholds) => {
                table.filter(|hit| thresholds.get(&hit.model).map_or(true, |min| hit.bitscore >= *min))
            }
            None => table,
        };
        Ok(Self::from_table(table))
    }

    /// Returns the report labels of the sequences assigned to a model.
    pub fn labels(&self, model: &str) -> Vec<String> {
        self.models
            .get(model)
            .map(|seqids| seqids.iter().filter_map(|id| self.table.seqs.get(id)).map(Hit::label).collect())
            .unwrap_or_default()
    }

    /// Returns every assigned core hit with its numeric location.
    pub fn locations(&self) -> impl Iterator<Item = (&Hit, (u64, u64))> {
        self.table.seqs.values().filter_map(|hit| Some((hit, hit.start_end()?)))
    }

    /// Write one `<model>.fna` per model into `dir`, returns the number of files written.
    pub fn write_fasta(&self, genes: &GeneStore, dir: &Path) -> Result<usize, Report> {
        for (model, seqids) in &self.models {
            let seqids = seqids.iter().map(String::as_str).collect_vec();
            genes
                .write_tree_fasta(&dir.join(format!("{model}.fna")), &seqids)
                .wrap_err_with(|| format!("Failed to write core genes of {model}"))?;
        }
        Ok(self.models.len())
    }
}

/// Run the core search and extract the core genes into `<dir>/coregenes`.
pub fn core_search(
    genes: &GeneStore,
    query: &Path,
    db: &Path,
    dir: &Path,
    cutoff: &CutoffPolicy,
    cpus: usize,
    log: &RunLog,
) -> Result<CoreHits, Report> {
    if std::fs::metadata(query).is_ok_and(|m| m.len() == 0) {
        log.warn(format!("No query proteins in {query:?}, skipping the core gene search"));
        return Ok(CoreHits::default());
    }
    log.info(format!("Starting Core Gene hmmsearch... ({db:?})"));
    let thresholds = match models::cutoff_values(db) {
        Ok(values) => cutoff.thresholds(&values),
        Err(e) => {
            log.warn(format!("Could not set thresholds, using default trusted cutoffs: {e}"));
            None
        }
    };
    // post-filtered policies still need a reporting threshold
    let search_cutoff = match (cutoff, &thresholds) {
        (CutoffPolicy::Evalue(_), _) | (_, Some(_)) => *cutoff,
        _ => CutoffPolicy::Trusted,
    };
    let domtbl = run_hmmsearch(query, db, dir, &search_cutoff, cpus, log)?;
    let core = CoreHits::from_domtbl(&domtbl, thresholds.as_ref())?;

    log.info("Extracting core genes...");
    let written = core.write_fasta(genes, &dir.join("coregenes"))?;
    log.info(format!("Core genes found: {} sequences in {written} models", core.table.seqs.len()));
    Ok(core)
}

/// Returns the path if it was given and exists.
pub fn existing(path: Option<&PathBuf>) -> Option<&Path> {
    path.map(PathBuf::as_path).filter(|p| p.exists())
}
