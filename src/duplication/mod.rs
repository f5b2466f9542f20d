//! Compare core gene copy numbers against the reference [`ReferenceMatrix`].

#[cfg(test)]
mod tests;

use crate::search::CoreHits;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Thresholds of the duplication test.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DuplicationConfig {
    /// Models with a higher reference mean copy number are never flagged.
    pub max_ref_count: f64,
    /// Models with a lower reference relative standard deviation are never flagged.
    pub min_rsd: f64,
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        DuplicationConfig { max_ref_count: 3.0, min_rsd: 0.2 }
    }
}

// ----------------------------------------------------------------------------
// Reference Matrix
// ----------------------------------------------------------------------------

/// Copy number statistics of one model across the reference organisms.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ReferenceRow {
    pub mean: f64,
    pub stdev: f64,
    pub rsd: f64,
    pub ubiquity: f64,
    /// Copy number in each reference organism.
    pub counts: Vec<f64>,
}

impl ReferenceRow {
    /// `[mean, stdev, rsd, ubiquity, counts...]`
    pub fn values(&self) -> Vec<f64> {
        [self.mean, self.stdev, self.rsd, self.ubiquity].into_iter().chain(self.counts.iter().copied()).collect()
    }
}

/// The precomputed `genematrix.txt` of a reference directory.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ReferenceMatrix {
    pub organisms: Vec<String>,
    pub singles: BTreeSet<String>,
    pub models: BTreeMap<String, ReferenceRow>,
}

impl ReferenceMatrix {
    /// Read a gene matrix.
    ///
    /// - `#Gene` header: organism names start at the sixth column.
    /// - `#Singles` row: comma separated single copy models.
    /// - Model rows: `model mean stdev rsd ubiquity counts...`.
    pub fn read(path: &Path) -> Result<Self, Report> {
        let mut matrix = ReferenceMatrix::default();
        for (line_i, line) in read_rows(path)?.into_iter().enumerate() {
            match line.first().map(String::as_str) {
                Some("#Gene") => matrix.organisms = line.into_iter().skip(5).collect(),
                Some("#Singles") => matrix.singles = parse_singles(line.get(1)),
                Some(model) if model.starts_with('#') => (),
                Some(model) => {
                    let values = line[1..]
                        .iter()
                        .map(|v| v.trim().parse::<f64>())
                        .collect::<Result<Vec<_>, _>>()
                        .wrap_err_with(|| format!("Invalid number on line {} of {path:?}", line_i + 1))?;
                    if values.len() < 4 {
                        Err(eyre!("Expected at least 4 values for {model} on line {} of {path:?}", line_i + 1))?
                    }
                    let row = ReferenceRow {
                        mean: values[0],
                        stdev: values[1],
                        rsd: values[2],
                        ubiquity: values[3],
                        counts: values[4..].to_vec(),
                    };
                    matrix.models.insert(model.to_string(), row);
                }
                None => (),
            }
        }
        Ok(matrix)
    }
}

// ----------------------------------------------------------------------------
// Count Matrix
// ----------------------------------------------------------------------------

/// Copy number of each core model in the query organism.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CountMatrix {
    pub organism: String,
    pub counts: BTreeMap<String, usize>,
    /// Models found exactly once.
    pub singles: BTreeSet<String>,
}

impl CountMatrix {
    pub fn new(organism: &str, counts: BTreeMap<String, usize>) -> Self {
        let singles = counts.iter().filter(|(_, count)| **count == 1).map(|(m, _)| m.clone()).collect();
        CountMatrix { organism: organism.to_string(), counts, singles }
    }

    /// Count the sequences assigned to each core model.
    pub fn from_hits(core: &CoreHits, organism: &str) -> Self {
        let counts = core.models.iter().map(|(model, seqids)| (model.clone(), seqids.len())).collect();
        Self::new(organism, counts)
    }

    /// Write in the gene matrix layout, each count doubling as its own mean.
    pub fn write(&self, path: &Path) -> Result<(), Report> {
        let mut file = File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
        let mut content = format!("#Gene\tCount\tMean\tStdev\tRSD\t{}\n", self.organism);
        content.push_str(&format!("#Singles\t{}\n", self.singles.iter().join(",")));
        for (model, count) in &self.counts {
            content.push_str(&format!("{model}\t{count}\t{count}\t0\t0\t{count}\n"));
        }
        file.write_all(content.as_bytes()).wrap_err_with(|| format!("Unable to write file: {path:?}"))?;
        Ok(())
    }

    /// Read a matrix written by [`CountMatrix::write`], only the count column is used.
    pub fn read(path: &Path) -> Result<Self, Report> {
        let mut organism = String::new();
        let mut counts = BTreeMap::new();
        for line in read_rows(path)? {
            match line.first().map(String::as_str) {
                Some("#Gene") => organism = line.get(5).cloned().unwrap_or_default(),
                Some(model) if model.starts_with('#') => (),
                Some(model) => {
                    let count = line
                        .get(1)
                        .and_then(|c| c.trim().parse::<f64>().ok())
                        .ok_or_else(|| eyre!("Invalid count for {model} in {path:?}"))?;
                    counts.insert(model.to_string(), count as usize);
                }
                None => (),
            }
        }
        Ok(Self::new(&organism, counts))
    }
}

// ----------------------------------------------------------------------------
// Duplicates
// ----------------------------------------------------------------------------

/// Returns the models duplicated in the query organism, sorted.
///
/// A model is duplicated when its copy number exceeds the reference mean plus one
/// standard deviation, the reference mean is at most `max_ref_count` and the reference
/// relative standard deviation is at least `min_rsd`. Models missing from either matrix
/// are ignored.
///
/// ```rust
/// use arts::duplication::{find_duplicates, CountMatrix, DuplicationConfig, ReferenceMatrix, ReferenceRow};
/// let mut reference = ReferenceMatrix::default();
/// let row = ReferenceRow { mean: 1.0, stdev: 0.5, rsd: 0.5, ubiquity: 1.0, counts: vec![] };
/// reference.models.insert("TIGR1".to_string(), row);
///
/// let current = CountMatrix::new("Sx", [("TIGR1".to_string(), 2), ("TIGR9".to_string(), 9)].into());
/// assert_eq!(find_duplicates(&reference, &current, &DuplicationConfig::default()), ["TIGR1"]);
/// ```
pub fn find_duplicates(reference: &ReferenceMatrix, current: &CountMatrix, config: &DuplicationConfig) -> Vec<String> {
    current
        .counts
        .iter()
        .filter_map(|(model, count)| {
            let row = reference.models.get(model)?;
            let duplicated = *count as f64 > row.mean + row.stdev
                && row.mean <= config.max_ref_count
                && row.rsd >= config.min_rsd;
            duplicated.then(|| model.clone())
        })
        .collect()
}

/// Duplication evidence of one run.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DuplicationResult {
    /// Single copy models of both the reference and the query, used for the species tree.
    pub singles: Vec<String>,
    pub duplicates: Vec<String>,
    /// Query organism followed by the reference organisms.
    pub orgs: Vec<String>,
    /// `[count, mean, stdev, rsd, ubiquity, counts...]` for models in the reference, `[count]` otherwise.
    pub matrix: BTreeMap<String, Vec<f64>>,
}

/// Compare the query counts against the reference.
pub fn analyze(reference: &ReferenceMatrix, current: &CountMatrix, config: &DuplicationConfig) -> DuplicationResult {
    let singles = reference.singles.intersection(&current.singles).cloned().collect();
    let duplicates = find_duplicates(reference, current, config);
    let orgs = std::iter::once(current.organism.clone()).chain(reference.organisms.iter().cloned()).collect();
    let matrix = current
        .counts
        .iter()
        .map(|(model, count)| {
            let mut row = vec![*count as f64];
            if let Some(reference) = reference.models.get(model) {
                row.extend(reference.values());
            }
            (model.clone(), row)
        })
        .collect();
    DuplicationResult { singles, duplicates, orgs, matrix }
}

fn parse_singles(value: Option<&String>) -> BTreeSet<String> {
    value
        .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default()
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, Report> {
    let file = File::open(path).wrap_err_with(|| format!("Failed to read file: {path:?}"))?;
    let mut rows = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.wrap_err_with(|| format!("Failed to read line from: {path:?}"))?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(line.trim_end().split('\t').map(String::from).collect());
    }
    Ok(rows)
}
