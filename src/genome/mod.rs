//! Read the annotated query genome into a [`GeneStore`] and a list of [`ClusterRecord`]s.

pub mod store;

use crate::error::GenomeError;
use crate::utils::{self, runlog::RunLog};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use gb_io::seq::{Feature, Location, Seq};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use store::{Alphabet, GeneKind, GeneRecord, GeneStore};

// ----------------------------------------------------------------------------
// Names
// ----------------------------------------------------------------------------

/// Returns an organism name that is safe for file names, FASTA headers and Newick labels.
///
/// `.` and `,` are removed and any other character that is not ASCII alphanumeric or `_`
/// becomes `_`. A name without any alphanumeric character is an error.
///
/// ```rust
/// use arts::genome::sanitize_name;
/// assert_eq!(sanitize_name("Streptomyces coelicolor A3(2)")?, "Streptomyces_coelicolor_A3_2_");
/// assert_eq!(sanitize_name("Streptomyces sp. CNQ-509")?, "Streptomyces_sp_CNQ_509");
/// assert!(sanitize_name(" (!) ").is_err());
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn sanitize_name(name: &str) -> Result<String, Report> {
    let sanitized: String = name
        .trim()
        .chars()
        .filter(|c| *c != '.' && *c != ',')
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    match sanitized.chars().any(|c| c.is_ascii_alphanumeric()) {
        true => Ok(sanitized),
        false => Err(GenomeError::EmptyOrganismName(name.to_string()))?,
    }
}

/// Returns the genus, the first word of an organism name.
///
/// ```rust
/// use arts::genome::genus_of;
/// assert_eq!(genus_of("Streptomyces_coelicolor_A3_2_"), "Streptomyces");
/// assert_eq!(genus_of("Salinispora tropica"), "Salinispora");
/// ```
pub fn genus_of(organism: &str) -> String {
    organism.replace('_', " ").split_whitespace().next().unwrap_or_default().to_string()
}

// ----------------------------------------------------------------------------
// Clusters
// ----------------------------------------------------------------------------

/// A biosynthetic gene cluster annotated by antiSMASH, coordinates are 1-based and inclusive.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClusterRecord {
    pub index: usize,
    pub product: String,
    pub source: String,
    pub start: u64,
    pub end: u64,
}

impl ClusterRecord {
    /// Cluster identifier used in reports (ex. `cluster-3`).
    pub fn name(&self) -> String {
        format!("cluster-{}", self.index)
    }

    pub fn location(&self) -> String {
        format!("{} - {}", self.start, self.end)
    }
}

// ----------------------------------------------------------------------------
// Genome
// ----------------------------------------------------------------------------

/// The normalized query genome.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Genome {
    pub organism: String,
    pub genus: String,
    pub genes: GeneStore,
    pub clusters: Vec<ClusterRecord>,
}

impl Genome {
    /// An empty genome, used when the input could not be read.
    pub fn empty(organism: &str) -> Self {
        Genome {
            organism: organism.to_string(),
            genus: genus_of(organism),
            genes: GeneStore::new(organism),
            clusters: Vec::new(),
        }
    }

    /// Read an antiSMASH annotated GenBank file.
    ///
    /// ## Arguments
    ///
    /// - `path` - GenBank file, possibly with several records (contigs).
    /// - `organism` - Optional organism name overriding the `ORGANISM` line.
    pub fn from_genbank(path: &Path, organism: Option<&str>) -> Result<Self, Report> {
        let records = gb_io::reader::parse_file(path)
            .map_err(|e| eyre!("{e}"))
            .wrap_err_with(|| format!("Failed to parse GenBank file: {path:?}"))?;
        let first = records.first().ok_or_else(|| eyre!("No records found in GenBank file: {path:?}"))?;

        let organism = match organism {
            Some(name) => name.to_string(),
            None => first
                .source
                .as_ref()
                .and_then(|s| s.organism.clone().or_else(|| Some(s.source.clone())))
                .or_else(|| first.definition.clone())
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(utils::file_stem(&path)?),
        };
        let organism = sanitize_name(&organism)?;
        let mut genome = Genome::empty(&organism);

        for (record_i, record) in records.iter().enumerate() {
            let source = record.name.clone().unwrap_or_else(|| format!("record_{}", record_i + 1));
            genome.add_record(record, &source)?;
        }

        Ok(genome)
    }

    fn add_record(&mut self, record: &Seq, source: &str) -> Result<(), Report> {
        for feature in &record.features {
            if let Some(external) = find_external(&feature.location) {
                Err(GenomeError::ExternalReference { record: source.to_string(), location: external })?
            }
            let kind = feature.kind.to_string();
            match kind.as_str() {
                "CDS" | "rRNA" => self.add_gene(record, feature, source, &kind)?,
                "region" | "cluster" => self.add_cluster(feature, source, &kind)?,
                _ => (),
            }
        }
        Ok(())
    }

    fn add_gene(&mut self, record: &Seq, feature: &Feature, source: &str, kind: &str) -> Result<(), Report> {
        let Ok((from, to)) = feature.location.find_bounds() else { return Ok(()) };
        if from < 0 || to <= from {
            return Ok(());
        }
        let translation = qualifier(feature, "translation").map(|t| t.split_whitespace().join(""));
        let kind = match kind {
            "CDS" => GeneKind::Cds,
            _ => GeneKind::Rrna,
        };
        // pseudo genes without a translation are not searchable
        if kind == GeneKind::Cds && translation.is_none() {
            return Ok(());
        }
        let nucleotide = extract(&record.seq, &feature.location)
            .map(|s| String::from_utf8_lossy(&s).to_uppercase())
            .unwrap_or_default();
        let strand = match is_reverse(&feature.location) {
            true => -1,
            false => 1,
        };
        let locus_tag = ["locus_tag", "gene", "protein_id"]
            .into_iter()
            .find_map(|key| qualifier(feature, key))
            .unwrap_or_default();

        let gene = GeneRecord {
            seqid: self.genes.next_seqid(),
            organism: self.organism.clone(),
            genus: self.genus.clone(),
            source: source.to_string(),
            start: from as u64 + 1,
            end: to as u64,
            strand,
            locus_tag,
            kind,
            translation,
            nucleotide,
        };
        self.genes.insert(gene)
    }

    fn add_cluster(&mut self, feature: &Feature, source: &str, kind: &str) -> Result<(), Report> {
        let (from, to) = feature
            .location
            .find_bounds()
            .map_err(|e| eyre!("Failed to locate {kind} feature in {source}: {e:?}"))?;
        // region numbers restart on every record, clusters are numbered across the genome
        let index = self.clusters.len() + 1;
        let product = feature.qualifier_values("product".into()).join("-");
        self.clusters.push(ClusterRecord {
            index,
            product,
            source: source.to_string(),
            start: from.max(0) as u64 + 1,
            end: to.max(0) as u64,
        });
        Ok(())
    }

    /// Map each gene (by locus tag, or sequence id when untagged) to the first cluster containing it.
    pub fn locus_to_region(&self) -> BTreeMap<String, String> {
        self.genes
            .genes
            .values()
            .filter_map(|gene| {
                let cluster = self.clusters.iter().find(|c| {
                    c.source == gene.source && crate::proximity::overlaps((gene.start, gene.end), (c.start, c.end))
                })?;
                let key = match gene.locus_tag.is_empty() {
                    true => gene.seqid.clone(),
                    false => gene.locus_tag.clone(),
                };
                Some((key, cluster.name()))
            })
            .collect()
    }

    /// Write `queryseqs.{json,faa,fna}` and `locus_to_region.json` into the run directory.
    pub fn write(&self, dir: &Path, log: &RunLog) -> Result<(), Report> {
        self.genes.write(&dir.join("queryseqs.json"))?;
        let proteins = self.genes.write_fasta(&dir.join("queryseqs.faa"), Alphabet::Protein)?;
        let nucleotides = self.genes.write_fasta(&dir.join("queryseqs.fna"), Alphabet::Nucleotide)?;
        utils::write_json(&dir.join("locus_to_region.json"), &self.locus_to_region())?;
        log.info(format!(
            "Extracted {proteins} protein and {nucleotides} nucleotide sequences and {} clusters for {}",
            self.clusters.len(),
            self.organism
        ));
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Locations
// ----------------------------------------------------------------------------

fn qualifier(feature: &Feature, key: &str) -> Option<String> {
    feature.qualifier_values(key.into()).next().map(|v| v.to_string())
}

/// Returns the first reference to a sequence outside of this file.
fn find_external(location: &Location) -> Option<String> {
    match location {
        Location::External(accession, _) => Some(accession.to_string()),
        Location::Complement(inner) => find_external(inner),
        Location::Join(parts) | Location::Order(parts) | Location::Bond(parts) | Location::OneOf(parts) => {
            parts.iter().find_map(find_external)
        }
        _ => None,
    }
}

/// Returns `true` if most parts of the location are on the reverse strand.
fn is_reverse(location: &Location) -> bool {
    fn strands(location: &Location, reverse: bool, out: &mut Vec<bool>) {
        match location {
            Location::Range(..) | Location::Between(..) => out.push(reverse),
            Location::Complement(inner) => strands(inner, !reverse, out),
            Location::Join(parts) | Location::Order(parts) | Location::Bond(parts) | Location::OneOf(parts) => {
                parts.iter().for_each(|p| strands(p, reverse, out))
            }
            Location::External(_, Some(inner)) => strands(inner, reverse, out),
            _ => (),
        }
    }
    let mut out = Vec::new();
    strands(location, false, &mut out);
    out.iter().filter(|r| **r).count() * 2 > out.len()
}

/// Returns the nucleotide sequence of a location, reverse complemented where needed.
fn extract(seq: &[u8], location: &Location) -> Option<Vec<u8>> {
    match location {
        Location::Range((from, _), (to, _)) => {
            let (from, to) = (usize::try_from(*from).ok()?, usize::try_from(*to).ok()?);
            seq.get(from..to).map(|s| s.to_vec())
        }
        Location::Complement(inner) => extract(seq, inner).map(|s| reverse_complement(&s)),
        Location::Join(parts) | Location::Order(parts) => {
            parts.iter().map(|p| extract(seq, p)).collect::<Option<Vec<_>>>().map(|p| p.concat())
        }
        _ => None,
    }
}

/// Reverse complement of a nucleotide sequence, ambiguous bases become `N`.
///
/// ```rust
/// use arts::genome::reverse_complement;
/// assert_eq!(reverse_complement(b"ATGCcn"), b"NGGCAT");
/// ```
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|b| match b.to_ascii_uppercase() {
            b'A' => b'T',
            b'T' => b'A',
            b'G' => b'C',
            b'C' => b'G',
            _ => b'N',
        })
        .collect()
}
