//! Merge the evidence of one run into the core gene, duplication and summary reports.

#[cfg(test)]
mod tests;

use crate::duplication::DuplicationResult;
use crate::phylogeny::PhylogenyHits;
use crate::search::models::{MetadataTable, ModelMetadata};
use crate::search::{CoreHits, HitTable};
use crate::utils::{self, table::Table};
use color_eyre::eyre::{Report, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use strum::Display;

// ----------------------------------------------------------------------------
// Evidence
// ----------------------------------------------------------------------------

/// The evidence gathered by a run, a `None` field is a skipped or failed stage.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Evidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub singles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orgs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<BTreeMap<String, Vec<f64>>>,
    /// `model -> seqid -> cluster row`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity: Option<BTreeMap<String, BTreeMap<String, Vec<String>>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phylogeny: Option<PhylogenyHits>,
}

impl Evidence {
    pub fn new() -> Self {
        Evidence::default()
    }

    /// Fill the duplication fields.
    pub fn set_duplication(&mut self, result: DuplicationResult) {
        self.singles = Some(result.singles);
        self.duplicates = Some(result.duplicates);
        self.orgs = Some(result.orgs);
        self.matrix = Some(result.matrix);
    }
}

/// Genes supported by several lines of evidence.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct MultiCriteria {
    /// In at least two of duplicates, proximity and phylogeny.
    pub two_plus: BTreeSet<String>,
    /// In all three.
    pub three_plus: BTreeSet<String>,
}

impl From<&Evidence> for MultiCriteria {
    /// Missing evidence contributes nothing.
    ///
    /// ```rust
    /// use arts::report::{Evidence, MultiCriteria};
    /// let mut evidence = Evidence::new();
    /// evidence.duplicates = Some(vec!["TIGR1".into(), "TIGR2".into()]);
    /// evidence.proximity = Some([("TIGR2".to_string(), Default::default())].into());
    /// let criteria = MultiCriteria::from(&evidence);
    /// assert_eq!(criteria.two_plus.into_iter().collect::<Vec<_>>(), ["TIGR2"]);
    /// assert!(criteria.three_plus.is_empty());
    /// ```
    fn from(evidence: &Evidence) -> Self {
        let sets: Vec<BTreeSet<&String>> = [
            evidence.duplicates.as_ref().map(|d| d.iter().collect::<BTreeSet<_>>()),
            evidence.proximity.as_ref().map(|p| p.keys().collect::<BTreeSet<_>>()),
            evidence.phylogeny.as_ref().map(|p| p.keys().collect::<BTreeSet<_>>()),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut counts: BTreeMap<&String, usize> = BTreeMap::new();
        for gene in sets.iter().flatten() {
            *counts.entry(*gene).or_default() += 1;
        }

        let mut criteria = MultiCriteria::default();
        for (gene, count) in counts {
            if count >= 2 {
                criteria.two_plus.insert(gene.clone());
            }
            if count >= 3 {
                criteria.three_plus.insert(gene.clone());
            }
        }
        criteria
    }
}

// ----------------------------------------------------------------------------
// Core Table
// ----------------------------------------------------------------------------

/// `Yes` / `No` when the evidence exists, `N/A` otherwise.
fn flag(evidence: Option<bool>) -> String {
    match evidence {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "N/A",
    }
    .to_string()
}

/// `[a; b; c]` with `;` removed from the items.
fn bracket_list(items: &[String]) -> String {
    format!("[{}]", items.iter().map(|s| s.replace(';', "")).join("; "))
}

/// One row of the core gene table.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CoreRow {
    pub coregene: String,
    #[serde(rename = "TC")]
    pub tc: String,
    #[serde(rename = "dNdS")]
    pub dnds: String,
    #[serde(rename = "SC")]
    pub single_copy: String,
    #[serde(rename = "Ubiq")]
    pub ubiquity: String,
    pub description: String,
    pub func: String,
    pub duplicate: String,
    pub proximity: String,
    pub phylogeny: String,
    pub hits: Vec<String>,
    pub proxhits: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phylhits: Option<BTreeMap<String, Vec<[String; 4]>>>,
    pub known_hit: String,
    pub allhits: String,
}

impl CoreRow {
    fn tsv_row(&self) -> Vec<String> {
        vec![
            self.coregene.clone(),
            self.description.clone(),
            self.func.clone(),
            self.duplicate.clone(),
            self.proximity.clone(),
            self.phylogeny.clone(),
            self.known_hit.clone(),
            self.allhits.clone(),
        ]
    }
}

/// The core gene table, one row per model counted in the query.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CoreTable {
    pub data: Vec<CoreRow>,
    /// `seqid -> [seqid, model, source, start, end, strand, evalue, bitscore]`
    pub seqs: BTreeMap<String, Value>,
    /// Number of models per function tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funcstats: Option<BTreeMap<String, usize>>,
}

impl CoreTable {
    /// Merge every line of evidence per core gene model.
    ///
    /// ## Arguments
    ///
    /// - `core` - Core gene hits.
    /// - `evidence` - Evidence of the run, the rows follow `evidence.matrix`.
    /// - `known` - Known resistance hits, `None` if the search did not run.
    /// - `metadata` - Model metadata.
    pub fn new(core: &CoreHits, evidence: &Evidence, known: Option<&HitTable>, metadata: &MetadataTable) -> Self {
        let mut table = CoreTable {
            seqs: core.table.seqs.iter().map(|(id, hit)| (id.clone(), hit.location_row())).collect(),
            ..Default::default()
        };
        let Some(matrix) = &evidence.matrix else { return table };

        let mut funcstats = BTreeMap::new();
        for model in matrix.keys() {
            let meta = metadata.get(model).cloned().unwrap_or_else(ModelMetadata::default);
            if !meta.function.is_empty() {
                *funcstats.entry(meta.function.clone()).or_default() += 1;
            }

            let hits = core.models.get(model).cloned().unwrap_or_default();
            let proxhits = evidence.proximity.as_ref().and_then(|p| p.get(model)).cloned();
            let phylhits = evidence.phylogeny.as_ref().and_then(|p| p.get(model)).cloned();
            let known_hit = known.map(|known| hits.iter().any(|id| known.seqs.contains_key(id)));

            table.data.push(CoreRow {
                coregene: model.clone(),
                tc: meta.tc.clone(),
                dnds: meta.dnds.clone(),
                single_copy: meta.single_copy.clone(),
                ubiquity: meta.ubiquity.clone(),
                description: meta.label(),
                func: meta.function.clone(),
                duplicate: flag(evidence.duplicates.as_ref().map(|d| d.contains(model))),
                proximity: flag(evidence.proximity.as_ref().map(|_| proxhits.is_some())),
                phylogeny: flag(evidence.phylogeny.as_ref().map(|_| phylhits.is_some())),
                allhits: bracket_list(&core.labels(model)),
                hits,
                proxhits: proxhits.unwrap_or_default(),
                phylhits,
                known_hit: flag(known_hit),
            });
        }
        table.funcstats = Some(funcstats);
        table
    }

    pub fn to_table(&self) -> Result<Table, Report> {
        let mut table = Table::with_headers(&[
            "#Core_gene",
            "Description",
            "Function",
            "Duplication",
            "BGC_Proximity",
            "Phylogeny",
            "Known_target",
            "[Hits_listed]",
        ]);
        for row in &self.data {
            table.add_row(row.tsv_row())?;
        }
        Ok(table)
    }

    /// Write `coretable.{json,tsv}` into `dir`.
    pub fn write(&self, dir: &Path) -> Result<(), Report> {
        utils::write_json(&dir.join("coretable.json"), self)?;
        self.to_table()?.write(&dir.join("coretable.tsv"))
    }
}

// ----------------------------------------------------------------------------
// Duplication Table
// ----------------------------------------------------------------------------

/// The duplicated core genes with their reference statistics.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DupTable {
    /// `[model, count, mean, stdev, rsd, ubiquity, "[hits]", "name: description"]`
    pub data: Vec<Vec<String>>,
    /// Hit labels of each duplicated model.
    pub hits: BTreeMap<String, Vec<String>>,
}

impl DupTable {
    pub fn new(core: &CoreHits, evidence: &Evidence, metadata: &MetadataTable) -> Self {
        let mut table = DupTable::default();
        let empty = BTreeMap::new();
        let matrix = evidence.matrix.as_ref().unwrap_or(&empty);

        for model in evidence.duplicates.iter().flatten() {
            let labels = core.labels(model);
            let mut row = vec![model.clone()];
            match matrix.get(model) {
                Some(values) => row.extend(values.iter().take(5).map(f64::to_string)),
                None => row.push("n/a".to_string()),
            }
            row.push(bracket_list(&labels));
            row.push(metadata.get(model).map(ModelMetadata::label).unwrap_or_else(|| "n/a: n/a".to_string()));
            table.data.push(row);
            table.hits.insert(model.clone(), labels);
        }
        table
    }

    pub fn to_table(&self) -> Result<Table, Report> {
        let mut table = Table::with_headers(&[
            "#Core_gene",
            "Count",
            "Ref_median",
            "Ref_stdev",
            "Ref_RSD",
            "Ref_ubiquity",
            "[Hits_listed]",
            "Description",
        ]);
        for row in &self.data {
            table.add_row(row.clone())?;
        }
        Ok(table)
    }

    /// Write `duptable.{json,tsv}` into `dir`.
    pub fn write(&self, dir: &Path) -> Result<(), Report> {
        utils::write_json(&dir.join("duptable.json"), self)?;
        self.to_table()?.write(&dir.join("duptable.tsv"))
    }
}

// ----------------------------------------------------------------------------
// Summary
// ----------------------------------------------------------------------------

/// Outcome of one pipeline stage.
#[derive(Clone, Debug, Deserialize, Display, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "message")]
#[strum(serialize_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Skipped(String),
    Failed(String),
}

/// Stage outcomes in the order the stages ran.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct StageReport {
    pub stages: Vec<(String, StageStatus)>,
}

impl StageReport {
    pub fn new() -> Self {
        StageReport::default()
    }

    pub fn record(&mut self, stage: &str, status: StageStatus) {
        self.stages.push((stage.to_string(), status));
    }

    pub fn status(&self, stage: &str) -> Option<&StageStatus> {
        self.stages.iter().rev().find(|(name, _)| name == stage).map(|(_, status)| status)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|(_, status)| matches!(status, StageStatus::Failed(_)))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Counts written to `tables/summary.json`, also read back by the batch summary.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RunSummary {
    pub organism: String,
    pub genus: String,
    pub core_genes: usize,
    pub known_hits: usize,
    pub duf_hits: usize,
    pub clusters: usize,
    pub duplicates: usize,
    pub proximity: usize,
    pub phylogeny: usize,
    pub multi_criteria: MultiCriteria,
    pub stages: StageReport,
}

impl RunSummary {
    pub fn read(path: &Path) -> Result<Self, Report> {
        utils::read_json(&path)
    }

    pub fn write(&self, path: &Path) -> Result<(), Report> {
        utils::write_json(&path, self)
    }
}
