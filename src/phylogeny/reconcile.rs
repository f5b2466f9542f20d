//! Reconcile gene trees with the species tree using RANGER-DTL.

use crate::error::PhyloError;
use crate::phylogeny::species::organism_labels;
use crate::phylogeny::trees::first_line;
use crate::phylogeny::{run_parallel, PhylogenyResult};
use crate::utils::{self, runlog::RunLog, tool::Tool};
use arts_phylo::{newick, ToNewick};
use color_eyre::eyre::{Report, Result, WrapErr};
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Reconciliation input of one model.
#[derive(Clone, Debug, PartialEq)]
pub struct DtlInput {
    pub model: String,
    /// `dtl/<model>.input`, species tree then gene tree.
    pub path: PathBuf,
    /// Short id (`S3`, `S3_1`) to original label.
    pub names: HashMap<String, String>,
}

/// One reconciliation event, translated back to organism names.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DtlRow {
    pub model: String,
    pub node: String,
    pub event: String,
    pub mapping: String,
    pub recipient: String,
    /// The two gene tree leaves whose LCA is the node, `"a, b"`.
    pub pair: String,
}

impl DtlRow {
    /// `[model, node, event, mapping, recipient, pair]`
    pub fn row(&self) -> Vec<String> {
        vec![
            self.model.clone(),
            self.node.clone(),
            self.event.clone(),
            self.mapping.clone(),
            self.recipient.clone(),
            self.pair.clone(),
        ]
    }
}

/// Returns the organism of a gene tree leaf (ex. `Sx|G000001` is `Sx`).
pub fn leaf_organism(label: &str) -> Result<String, Report> {
    organism_labels(label)
}

// ----------------------------------------------------------------------------
// Merge
// ----------------------------------------------------------------------------

/// Write one RANGER-DTL input per gene tree that contains the query organism.
///
/// Species are renamed `S<i>` and their genes `S<i>_<k>`, gene leaves of organisms absent
/// from the species tree are pruned.
///
/// ## Arguments
///
/// - `species` - The ASTRAL species tree.
/// - `gene_trees` - Placed gene trees, one per model.
/// - `dir` - Output directory of the `<model>.input` files.
/// - `query` - Query organism name.
pub fn merge_trees(
    species: &Path,
    gene_trees: &[PathBuf],
    dir: &Path,
    query: &str,
    log: &RunLog,
) -> Result<Vec<DtlInput>, Report> {
    let mut species_tree = newick::parse(&first_line(species)?)
        .wrap_err_with(|| format!("Failed to parse species tree: {species:?}"))?;

    let organisms = species_tree.leaf_labels()?.into_iter().map(String::from).collect_vec();
    if !organisms.iter().any(|o| o == query) {
        Err(PhyloError::QueryNotInSpeciesTree(query.to_string()))?
    }
    let species_ids: HashMap<String, String> =
        organisms.iter().enumerate().map(|(i, o)| (o.clone(), format!("S{i}"))).collect();

    species_tree.relabel_leaves(&species_ids);
    species_tree.clear_internal_labels();
    species_tree.resolve_root()?;
    let species_newick = species_tree.to_newick()?;

    let mut inputs = Vec::new();
    for path in gene_trees {
        let model = utils::file_stem(path)?;
        let gene_tree = newick::parse(&first_line(path)?).wrap_err_with(|| format!("Failed to parse tree: {path:?}"))?;

        let mut leaves = Vec::new();
        for label in gene_tree.leaf_labels()? {
            let organism = leaf_organism(label)?;
            if species_ids.contains_key(&organism) {
                leaves.push((label.to_string(), organism));
            }
        }
        if leaves.len() < 2 || !leaves.iter().any(|(_, o)| o == query) {
            log.debug(format!("Skipping reconciliation of {model}, query organism or comparison missing"));
            continue;
        }

        let mut gene_tree = gene_tree.prune(|label| leaves.iter().any(|(l, _)| l == label))?;
        let mut gene_ids = HashMap::new();
        let mut names: HashMap<String, String> =
            species_ids.iter().map(|(organism, id)| (id.clone(), organism.clone())).collect();
        for (k, (label, organism)) in leaves.iter().enumerate() {
            let id = format!("{}_{}", species_ids[organism], k + 1);
            gene_ids.insert(label.clone(), id.clone());
            names.insert(id, label.clone());
        }
        gene_tree.relabel_leaves(&gene_ids);
        gene_tree.clear_internal_labels();
        gene_tree.resolve_root()?;

        let input = dir.join(format!("{model}.input"));
        std::fs::write(&input, format!("{species_newick}\n{}\n", gene_tree.to_newick()?))
            .wrap_err_with(|| format!("Failed to write reconciliation input: {input:?}"))?;
        inputs.push(DtlInput { model, path: input, names });
    }

    log.info(format!("Prepared {} of {} gene trees for reconciliation", inputs.len(), gene_trees.len()));
    Ok(inputs)
}

// ----------------------------------------------------------------------------
// Reconcile
// ----------------------------------------------------------------------------

/// Parse a RANGER-DTL output, translating short ids with `names`.
///
/// Only internal node lines are read (ex. `m3 = LCA[S0_1, S2_1]: Transfer, Mapping --> n1, Recipient --> S2`).
pub fn parse_ranger(text: &str, model: &str, names: &HashMap<String, String>) -> Result<Vec<DtlRow>, Report> {
    let re = Regex::new(
        r"^(\S+) = LCA\[(\S+), (\S+)\]: (Speciation|Duplication|Transfer), Mapping --> (\S+)(?:, Recipient --> (\S+))?",
    )?;
    let translate = |id: &str| names.get(id).cloned().unwrap_or_else(|| id.to_string());

    let rows = text
        .lines()
        .filter_map(|line| re.captures(line.trim()))
        .map(|caps| DtlRow {
            model: model.to_string(),
            node: caps[1].to_string(),
            event: caps[4].to_string(),
            mapping: translate(&caps[5]),
            recipient: caps.get(6).map(|m| translate(m.as_str())).unwrap_or_default(),
            pair: format!("{}, {}", translate(&caps[2]), translate(&caps[3])),
        })
        .collect();
    Ok(rows)
}

/// Run RANGER-DTL on every input, on a pool of `cpus` threads.
///
/// A model that fails is logged and contributes no rows.
pub fn reconcile(inputs: &[DtlInput], ranger: &str, cpus: usize, log: &RunLog) -> Result<Vec<DtlRow>, Report> {
    let results = run_parallel(inputs, cpus, "reconciliations", |input| -> Result<Vec<DtlRow>, Report> {
        let output = input.path.with_extension("output");
        Tool::new(ranger).arg("-i").path_arg(&input.path).arg("-o").path_arg(&output).run(log)?;
        let text = std::fs::read_to_string(&output).wrap_err_with(|| format!("Failed to read {output:?}"))?;
        parse_ranger(&text, &input.model, &input.names)
    })?;

    let mut rows = Vec::new();
    for (input, result) in inputs.iter().zip(results) {
        match result {
            Ok(model_rows) => rows.extend(model_rows),
            Err(e) => log.exception(format!("Reconciliation failed for {}", input.model), &e),
        }
    }
    Ok(rows)
}

/// Keep the transfers that involve the query organism.
///
/// A transfer is kept when the query receives it or is one side of the LCA pair.
pub fn query_transfers(rows: Vec<DtlRow>, query: &str) -> Vec<DtlRow> {
    rows.into_iter()
        .filter(|row| row.event == "Transfer")
        .filter(|row| {
            row.recipient == query
                || row.pair.split(", ").any(|side| leaf_organism(side).map(|o| o == query).unwrap_or(false))
        })
        .collect()
}

/// Write `dtlresults.json` as `{organism: [[model, node, event, mapping, recipient, pair]...]}`.
pub fn write_results(path: &Path, organism: &str, rows: &[DtlRow]) -> Result<(), Report> {
    let results = BTreeMap::from([(organism.to_string(), rows.iter().map(DtlRow::row).collect_vec())]);
    utils::write_json(&path, &results)
}

// ----------------------------------------------------------------------------
// Evidence
// ----------------------------------------------------------------------------

/// Returns `true` if a transfer crosses the genus boundary.
///
/// The side of the LCA pair without the query organism is compared, the transfer is within
/// the genus when `genus` appears (case-insensitive) in that side or in the recipient.
///
/// ```rust
/// use arts::phylogeny::reconcile::{check_genus, DtlRow};
/// let row = DtlRow {
///     model: "TIGR1".into(), node: "m3".into(), event: "Transfer".into(), mapping: "n1".into(),
///     recipient: "Salinispora_tropica".into(),
///     pair: "Streptomyces_sp_X|G000001, Salinispora_arenicola|A12".into(),
/// };
/// assert!(check_genus("Streptomyces", "Streptomyces_sp_X", &row));
/// assert!(!check_genus("Salinispora", "Streptomyces_sp_X", &row));
/// ```
pub fn check_genus(genus: &str, organism: &str, row: &DtlRow) -> bool {
    let sides = row.pair.split(", ").collect_vec();
    let other = match sides.as_slice() {
        [first, second, ..] if first.contains(organism) => *second,
        [first, ..] => *first,
        [] => "",
    };
    let genus = genus.to_lowercase();
    !(row.recipient.to_lowercase().contains(&genus) || other.to_lowercase().contains(&genus))
}

/// Collect the transfers across the genus boundary, grouped by model and node.
pub fn check_phylogeny(rows: &[DtlRow], organism: &str, genus: &str) -> PhylogenyResult {
    let mut result = PhylogenyResult::default();
    for row in rows.iter().filter(|row| check_genus(genus, organism, row)) {
        let nodes = result.hits.entry(row.model.clone()).or_default();
        let hits = nodes.entry(row.node.clone()).or_insert_with(|| {
            result.count += 1;
            Vec::new()
        });
        hits.push([row.event.clone(), row.mapping.clone(), row.recipient.clone(), row.pair.clone()]);
    }
    result
}
