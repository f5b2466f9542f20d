//! Locate core, resistance and DUF hits inside biosynthetic gene clusters.

#[cfg(test)]
mod tests;

use crate::genome::ClusterRecord;
use crate::search::models::MetadataTable;
use crate::search::HitTable;
use crate::utils::{self, table::Table};
use color_eyre::eyre::{Report, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use strum::{Display, EnumString};

/// Returns `true` if two inclusive intervals `(start, end)` share at least one position.
///
/// ```rust
/// use arts::proximity::overlaps;
/// assert!(overlaps((100, 200), (200, 300)));
/// assert!(overlaps((160, 170), (150, 300)));
/// assert!(!overlaps((100, 199), (200, 300)));
/// ```
pub fn overlaps(a: (u64, u64), b: (u64, u64)) -> bool {
    !(a.1 < b.0 || b.1 < a.0)
}

/// The search a hit came from.
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize)]
pub enum EvidenceKind {
    Core,
    ResModel,
    #[strum(serialize = "DUF")]
    Duf,
}

/// A hit located inside a cluster.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClusterHit {
    pub seqid: String,
    pub model: String,
    pub start: String,
    pub end: String,
    pub kind: EvidenceKind,
    pub description: String,
    pub function: String,
}

impl ClusterHit {
    /// `[seqid, model, start, end, kind, description, function]`
    pub fn row(&self) -> Vec<String> {
        vec![
            self.seqid.clone(),
            self.model.clone(),
            self.start.clone(),
            self.end.clone(),
            self.kind.to_string(),
            self.description.clone(),
            self.function.clone(),
        ]
    }
}

/// A cluster and the hits located inside it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClusterHits {
    pub cluster: ClusterRecord,
    pub hits: Vec<ClusterHit>,
}

impl ClusterHits {
    /// `[cluster-N, product, source, "start - end"]`
    pub fn row(&self) -> Vec<String> {
        vec![self.cluster.name(), self.cluster.product.clone(), self.cluster.source.clone(), self.cluster.location()]
    }

    pub fn core_count(&self) -> usize {
        self.hits.iter().filter(|h| h.kind == EvidenceKind::Core).count()
    }
}

/// Proximity evidence of one run.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ProximityResult {
    pub clusters: Vec<ClusterHits>,
    /// `model -> seqid -> [cluster, product, source, start, end, gene start, gene end, "Core"]`
    pub proximity: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// Number of core hits inside clusters.
    pub core_hits: usize,
}

/// Attribute every hit to the first cluster, in annotation order, that overlaps it on the same contig.
///
/// ## Arguments
///
/// - `clusters` - Clusters of the query genome.
/// - `evidence` - The best hit tables of each search, scanned in order.
/// - `metadata` - Model descriptions and functions.
pub fn check_proximity(
    clusters: &[ClusterRecord],
    evidence: &[(EvidenceKind, &HitTable)],
    metadata: &MetadataTable,
) -> ProximityResult {
    let mut result = ProximityResult {
        clusters: clusters.iter().map(|c| ClusterHits { cluster: c.clone(), hits: Vec::new() }).collect(),
        ..Default::default()
    };

    for (kind, table) in evidence {
        for (seqid, hit) in &table.seqs {
            let (Ok(start), Ok(end)) = (hit.start.parse::<u64>(), hit.end.parse::<u64>()) else { continue };

            // first match wins
            let Some(entry) = result
                .clusters
                .iter_mut()
                .find(|c| c.cluster.source == hit.source && overlaps((start, end), (c.cluster.start, c.cluster.end)))
            else {
                continue;
            };

            let (description, function) = match metadata.get(&hit.model) {
                Some(m) => (m.label(), m.function.clone()),
                None => (String::new(), String::new()),
            };
            if *kind == EvidenceKind::Core {
                let cluster = &entry.cluster;
                let row = vec![
                    cluster.name(),
                    cluster.product.clone(),
                    cluster.source.clone(),
                    cluster.start.to_string(),
                    cluster.end.to_string(),
                    hit.start.clone(),
                    hit.end.clone(),
                    kind.to_string(),
                ];
                result.proximity.entry(hit.model.clone()).or_default().insert(seqid.clone(), row);
                result.core_hits += 1;
            }
            entry.hits.push(ClusterHit {
                seqid: seqid.clone(),
                model: hit.model.clone(),
                start: hit.start.clone(),
                end: hit.end.clone(),
                kind: *kind,
                description,
                function,
            });
        }
    }

    result
}

impl ProximityResult {
    /// `{"cluster-N": {"row": [...], "hits": [...]}, "data": [[...row, core, other, hits]]}`
    pub fn to_json(&self) -> Value {
        let mut json = Map::new();
        let mut data = Vec::new();
        for entry in &self.clusters {
            let hits: Vec<Vec<String>> = entry.hits.iter().map(ClusterHit::row).collect();
            json.insert(entry.cluster.name(), json!({"row": entry.row(), "hits": hits}));
            let core = entry.core_count();
            let mut row: Vec<Value> = entry.row().into_iter().map(Value::String).collect();
            row.push(json!(core.to_string()));
            row.push(json!((entry.hits.len() - core).to_string()));
            row.push(json!(hits));
            data.push(Value::Array(row));
        }
        json.insert("data".to_string(), Value::Array(data));
        Value::Object(json)
    }

    pub fn to_table(&self) -> Result<Table, Report> {
        let mut table =
            Table::with_headers(&["#Cluster", "Type", "Source", "Location", "Core hits", "Other hits", "Genelist"]);
        for entry in &self.clusters {
            let core = entry.core_count();
            let hits: Vec<Vec<String>> = entry.hits.iter().map(ClusterHit::row).collect();
            let mut row = entry.row();
            row.push(core.to_string());
            row.push((entry.hits.len() - core).to_string());
            row.push(serde_json::to_string(&hits)?);
            table.add_row(row)?;
        }
        Ok(table)
    }

    /// Write `bgctable.{json,tsv}` into `dir`.
    pub fn write(&self, dir: &Path) -> Result<(), Report> {
        utils::write_json(&dir.join("bgctable.json"), &self.to_json())?;
        self.to_table()?.write(&dir.join("bgctable.tsv"))
    }
}
