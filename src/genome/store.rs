//! The per-organism [`GeneStore`] of extracted gene sequences.

use crate::utils;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use noodles::fasta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use strum::{Display, EnumString};

/// Feature type a [`GeneRecord`] was extracted from.
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize)]
pub enum GeneKind {
    #[strum(serialize = "CDS")]
    Cds,
    #[strum(serialize = "rRNA")]
    Rrna,
}

/// Sequence alphabet to export.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Alphabet {
    Protein,
    Nucleotide,
}

/// One gene of the query genome, coordinates are 1-based and inclusive.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GeneRecord {
    pub seqid: String,
    pub organism: String,
    pub genus: String,
    pub source: String,
    pub start: u64,
    pub end: u64,
    /// `1` or `-1`
    pub strand: i8,
    pub locus_tag: String,
    pub kind: GeneKind,
    pub translation: Option<String>,
    pub nucleotide: String,
}

impl GeneRecord {
    /// The FASTA header that carries the gene location through the profile search.
    ///
    /// ```rust
    /// use arts::genome::store::{GeneKind, GeneRecord};
    /// let gene = GeneRecord {
    ///     seqid: "G000001".into(), organism: "Streptomyces_sp_X".into(), genus: "Streptomyces".into(),
    ///     source: "contig_1".into(), start: 100, end: 400, strand: -1, locus_tag: "SX_0001".into(),
    ///     kind: GeneKind::Cds, translation: None, nucleotide: String::new(),
    /// };
    /// assert_eq!(gene.header(), "Streptomyces_sp_X|source|contig_1|loc|100_400_-1|G000001");
    /// ```
    pub fn header(&self) -> String {
        format!(
            "{}|source|{}|loc|{}_{}_{}|{}",
            self.organism, self.source, self.start, self.end, self.strand, self.seqid
        )
    }

    /// The FASTA header used in per-model files fed to the tree builders.
    pub fn tree_header(&self) -> String {
        format!("{}|{}", self.organism, self.seqid)
    }
}

/// Gene records of one organism keyed by sequence id.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GeneStore {
    pub organism: String,
    pub genes: BTreeMap<String, GeneRecord>,
}

impl GeneStore {
    pub fn new(organism: &str) -> Self {
        GeneStore { organism: organism.to_string(), genes: BTreeMap::new() }
    }

    /// Returns the next free sequence id (ex. `G000001`).
    pub fn next_seqid(&self) -> String {
        format!("G{:06}", self.genes.len() + 1)
    }

    /// Add a gene, records are immutable so an existing sequence id is an error.
    pub fn insert(&mut self, gene: GeneRecord) -> Result<(), Report> {
        if self.genes.contains_key(&gene.seqid) {
            return Err(eyre!("Gene {} is already in the store of {}", gene.seqid, self.organism));
        }
        self.genes.insert(gene.seqid.clone(), gene);
        Ok(())
    }

    pub fn get(&self, seqid: &str) -> Option<&GeneRecord> {
        self.genes.get(seqid)
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn read(path: &Path) -> Result<Self, Report> {
        utils::read_json(&path)
    }

    pub fn write(&self, path: &Path) -> Result<(), Report> {
        utils::write_json(&path, self)
    }

    /// Write every gene with a sequence in the requested alphabet, returns the number written.
    pub fn write_fasta(&self, path: &Path, alphabet: Alphabet) -> Result<usize, Report> {
        let genes = self.genes.values().map(|g| (g, g.header()));
        write_fasta(path, genes, alphabet)
    }

    /// Write the nucleotide sequences of `seqids` with the short `{organism}|{seqid}` header.
    pub fn write_tree_fasta(&self, path: &Path, seqids: &[&str]) -> Result<usize, Report> {
        let genes = seqids
            .iter()
            .map(|id| self.get(id).ok_or_else(|| eyre!("Gene {id} is not in the store of {}", self.organism)))
            .collect::<Result<Vec<_>, Report>>()?;
        write_fasta(path, genes.into_iter().map(|g| (g, g.tree_header())), Alphabet::Nucleotide)
    }
}

fn write_fasta<'g, I>(path: &Path, genes: I, alphabet: Alphabet) -> Result<usize, Report>
where
    I: Iterator<Item = (&'g GeneRecord, String)>,
{
    let file = File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
    let mut writer = fasta::Writer::new(file);
    let mut written = 0;
    for (gene, header) in genes {
        let sequence = match alphabet {
            Alphabet::Protein => gene.translation.as_deref(),
            Alphabet::Nucleotide => Some(gene.nucleotide.as_str()).filter(|s| !s.is_empty()),
        };
        let Some(sequence) = sequence else { continue };
        let definition = fasta::record::Definition::new(header, None);
        let sequence = fasta::record::Sequence::from(sequence.as_bytes().to_vec());
        writer
            .write_record(&fasta::Record::new(definition, sequence))
            .wrap_err_with(|| format!("Unable to write fasta record for {} to {path:?}", gene.seqid))?;
        written += 1;
    }
    Ok(written)
}

/// Returns the record names of a FASTA file.
pub fn read_fasta_names(path: &Path) -> Result<Vec<String>, Report> {
    let mut reader = File::open(path)
        .map(BufReader::new)
        .map(fasta::Reader::new)
        .wrap_err_with(|| eyre!("Unable to read fasta: {path:?}"))?;
    reader
        .records()
        .map(|r| r.map(|r| r.name().to_string()).wrap_err_with(|| eyre!("Invalid fasta record in {path:?}")))
        .collect()
}
