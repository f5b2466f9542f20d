//! Run every stage of the analysis for one query genome.
//!
//! Setup failures (missing input, unwritable result directory, missing core models) abort
//! the run. Any other stage failure is logged, recorded in the [`StageReport`] and leaves
//! its evidence absent, the run still ends with `SUCCESS! job finished`.

#[cfg(test)]
mod tests;

use crate::antismash;
use crate::cli::run::{EvidenceModule, RunArgs};
use crate::duplication::{self, CountMatrix, ReferenceMatrix};
use crate::genome::{self, Genome};
use crate::phylogeny;
use crate::proximity::{self, EvidenceKind};
use crate::report::{CoreTable, DupTable, Evidence, MultiCriteria, RunSummary, StageReport, StageStatus};
use crate::search::models::{self, CoreDatabase};
use crate::search::{self, CoreHits, CutoffPolicy, HitTable};
use crate::utils::{self, runlog::RunLog};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use std::path::{Path, PathBuf};

/// Directories of a run.
pub const DIRS: [&str; 6] = ["coregenes", "alignedcore", "trimmedcore", "raxml", "trees", "tables"];

// ----------------------------------------------------------------------------
// Query Context
// ----------------------------------------------------------------------------

/// The run directory, log and stage outcomes of one query.
#[derive(Debug)]
pub struct QueryContext {
    pub dir: PathBuf,
    pub log: RunLog,
    pub stages: StageReport,
}

impl QueryContext {
    pub fn new(dir: &Path, log: &RunLog) -> Self {
        QueryContext { dir: dir.to_path_buf(), log: log.clone(), stages: StageReport::new() }
    }

    /// Run one stage, a failure is logged and recorded but never returned.
    pub fn stage<T, F>(&mut self, name: &str, f: F) -> Option<T>
    where
        F: FnOnce(&RunLog) -> Result<T, Report>,
    {
        match f(&self.log) {
            Ok(value) => {
                self.stages.record(name, StageStatus::Completed);
                Some(value)
            }
            Err(e) => {
                self.log.exception(format!("Stage {name} failed"), &e);
                self.stages.record(name, StageStatus::Failed(e.to_string()));
                None
            }
        }
    }

    pub fn skip(&mut self, name: &str, reason: &str) {
        self.log.info(format!("Skipping {name}: {reason}"));
        self.stages.record(name, StageStatus::Skipped(reason.to_string()));
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

// ----------------------------------------------------------------------------
// Run
// ----------------------------------------------------------------------------

/// Analyze one genome in `dir`, returns the summary written to `tables/summary.json`.
///
/// ## Arguments
///
/// - `args` - Run arguments, `args.input` is ignored in favor of `input`.
/// - `input` - GenBank file, or antiSMASH JSON when antiSMASH is available.
/// - `dir` - Result directory of this genome.
/// - `log` - Logging context of this genome.
pub fn run_query(args: &RunArgs, input: &Path, dir: &Path, log: &RunLog) -> Result<RunSummary, Report> {
    let mut ctx = QueryContext::new(dir, log);
    for name in DIRS {
        utils::create_dir(&dir.join(name)).wrap_err("Problem with folder creation / disk error")?;
    }
    utils::write_json(&dir.join("arts-args.json"), args)?;
    log.info("Init folders complete");
    log.debug(format!("Starting query: dir={dir:?}; pid={}; input={input:?}", std::process::id()));

    let input = prepare_input(&mut ctx, args, input);
    if !input.is_file() {
        Err(eyre!("No such input path {input:?}")).suggestion("Check the input file, or the antiSMASH output.")?
    }

    // ------------------------------------------------------------------------
    // Genome

    let fallback = utils::file_stem(&input)?;
    let genome = ctx
        .stage("genome", |_| Genome::from_genbank(&input, args.orgname.as_deref()))
        .unwrap_or_else(|| {
            log.error("Could not parse the GenBank file, please ensure no external sequence references are present");
            let organism = args.orgname.as_deref().unwrap_or(&fallback);
            Genome::empty(&genome::sanitize_name(organism).unwrap_or_else(|_| "query".to_string()))
        });
    genome.write(dir, log)?;
    log.info(format!("query: org={}", genome.organism));
    log.info(format!("query: genus={}", genome.genus));

    // ------------------------------------------------------------------------
    // Models

    let database = CoreDatabase::prepare(
        &args.refdir,
        &args.hmmdblist,
        args.custcorehmms.as_deref(),
        args.has(EvidenceModule::Expert),
        dir,
        log,
    )
    .wrap_err("Problem init database")?;
    let mut metadata = database.metadata.clone();
    let cutoff = CutoffPolicy::parse_or_default(args.thresh.as_deref(), log);

    let proteins = dir.join("queryseqs.faa");
    let nucleotides = dir.join("queryseqs.fna");
    let cpus = args.multicpu;

    // ------------------------------------------------------------------------
    // Annotation searches

    match search::existing(args.rnahmmdb.as_ref()) {
        Some(db) => {
            log.info("Starting RNA hmmsearch...");
            ctx.stage("rna", |log| search::rna_search(&genome.genes, &nucleotides, db, dir, cpus, log));
        }
        None => ctx.skip("rna", "no RNA models"),
    }

    let known = match search::existing(args.knownhmms.as_ref()).filter(|_| args.has(EvidenceModule::Kres)) {
        Some(db) => ctx.stage("known_resistance", |log| {
            log.info(format!("Checking customhmms {:?}...", args.customhmms));
            let db = models::merge_custom(db, args.customhmms.as_deref(), "res", dir, log)?;
            metadata.extend(models::metadata_from_hmm(&db)?);
            log.info("Start known resistance search...");
            let table = search::annotation_search(&proteins, &db, dir, "knownhits", cpus, log)?;
            log.info(format!("Known Resistance Hits: {}", table.seqs.len()));
            Ok(table)
        }),
        None => {
            ctx.skip("known_resistance", "no resistance models or kres option unset");
            None
        }
    };

    let duf = match search::existing(args.dufhmms.as_ref()).filter(|_| args.has(EvidenceModule::Duf)) {
        Some(db) => ctx.stage("duf", |log| {
            log.info("Start DUF search...");
            let table = search::annotation_search(&proteins, db, dir, "dufhits", cpus, log)?;
            log.info(format!("DUF Hits: {}", table.seqs.len()));
            Ok(table)
        }),
        None => {
            ctx.skip("duf", "no DUF models or duf option unset");
            None
        }
    };
    log.info("Milestone_1_complete");

    // ------------------------------------------------------------------------
    // Core genes

    let core = search::core_search(&genome.genes, &proteins, &database.hmm, dir, &cutoff, cpus, log)
        .wrap_err("Core gene search failed")?;
    ctx.stages.record("core", StageStatus::Completed);

    let tables = ctx.path("tables");
    let mut evidence = Evidence::new();
    let config = args.duplication_config();
    ctx.stage("duplication", |log| {
        let counts = CountMatrix::from_hits(&core, &genome.organism);
        counts.write(&dir.join("coregenes").join("genematrix.txt"))?;
        let reference = ReferenceMatrix::read(&args.refdir.join("genematrix.txt"))?;
        let result = duplication::analyze(&reference, &counts, &config);
        log.info(format!("Found {} single copy genes for MLST: {:?}", result.singles.len(), result.singles));
        log.info(format!("Found {} duplicate genes", result.duplicates.len()));
        evidence.set_duplication(result);

        log.info("Writing duplicates table...");
        DupTable::new(&core, &evidence, &metadata).write(&tables)
    });

    // ------------------------------------------------------------------------
    // Proximity

    let proximity = ctx.stage("proximity", |log| {
        log.info("Writing bgc and core tables...");
        let mut hit_tables: Vec<(EvidenceKind, &HitTable)> = vec![(EvidenceKind::Core, &core.table)];
        if let Some(known) = &known {
            hit_tables.push((EvidenceKind::ResModel, known));
        }
        if let Some(duf) = &duf {
            hit_tables.push((EvidenceKind::Duf, duf));
        }
        let result = proximity::check_proximity(&genome.clusters, &hit_tables, &metadata);
        log.info(format!("Proximity hits found: {}", result.core_hits));
        result.write(&tables)?;
        evidence.proximity = Some(result.proximity);

        CoreTable::new(&core, &evidence, known.as_ref(), &metadata).write(&tables)?;
        log.info("Milestone_2_complete");
        Ok(result.core_hits)
    });

    // ------------------------------------------------------------------------
    // Phylogeny

    let singles = evidence.singles.clone().unwrap_or_default();
    match args.has(EvidenceModule::Phyl) && !singles.is_empty() {
        true => {
            let config = args.phylo_config();
            let result = ctx.stage("phylogeny", |log| {
                phylogeny::run(dir, &singles, &genome.organism, &genome.genus, &config, log)
            });
            evidence.phylogeny = result.map(|r| r.hits);
        }
        false => {
            log.info("No single genes found or phylogeny option unset, skipping phylogeny Check...");
            ctx.stages.record("phylogeny", StageStatus::Skipped("no single copy genes or phyl option unset".to_string()));
        }
    }
    log.info("Milestone_5_complete");

    // ------------------------------------------------------------------------
    // Export

    log.info("Exporting results...");
    ctx.stage("export", |log| export(dir, log));

    let criteria = MultiCriteria::from(&evidence);
    log.info(format!("Hits with two or more criteria: {} : {:?}", criteria.two_plus.len(), criteria.two_plus));
    log.info(format!("Hits with three or more criteria: {} : {:?}", criteria.three_plus.len(), criteria.three_plus));

    CoreTable::new(&core, &evidence, known.as_ref(), &metadata).write(&tables)?;

    let summary = summarize(&genome, &core, &evidence, [known.as_ref(), duf.as_ref()], proximity, criteria, ctx.stages);
    summary.write(&tables.join("summary.json"))?;
    log.info("SUCCESS! job finished");

    Ok(summary)
}

/// Run antiSMASH, or rebuild its results from JSON, returns the file to analyze.
fn prepare_input(ctx: &mut QueryContext, args: &RunArgs, input: &Path) -> PathBuf {
    let is_json = input.extension().is_some_and(|ext| ext == "json");
    let config = match args.antismash_config() {
        Some(config) if args.runantismash || is_json => config,
        Some(_) => {
            ctx.skip("antismash", "runantismash unset");
            return input.to_path_buf();
        }
        None => {
            if args.runantismash || is_json {
                ctx.log.warn("No antiSMASH installation given with --antismashpath");
            }
            ctx.skip("antismash", "no antismashpath");
            return input.to_path_buf();
        }
    };

    let dir = ctx.dir.clone();
    let output = ctx.stage("antismash", |log| match args.runantismash {
        true => {
            log.info("Starting Antismash job...");
            antismash::run_antismash(&config, input, &dir, log)
        }
        false => antismash::reuse_results(&config, input, &dir.join("antismash"), log),
    });
    output.unwrap_or_else(|| input.to_path_buf())
}

/// Archive the trees and alignments, then remove the intermediate files.
///
/// `astMLST.tree` is kept in the tree archive as `SpeciesMLST.tree`.
pub fn export(dir: &Path, log: &RunLog) -> Result<(), Report> {
    let species = dir.join("astMLST.tree");
    let trees = dir.join("trees");
    if species.exists() {
        let output = trees.join("SpeciesMLST.tree");
        std::fs::rename(&species, &output).wrap_err_with(|| format!("Failed to move {species:?} to {output:?}"))?;
    }
    if !utils::list_files(&trees, ".tree")?.is_empty() {
        let n = utils::archive_dir(&trees, &dir.join("alltrees.zip"))?;
        log.debug(format!("Archived {n} trees"));
        utils::remove_path(&dir.join("raxml"))?;
    }
    if !utils::list_files(&dir.join("trimmedcore"), ".fna")?.is_empty() {
        utils::archive_dir(&dir.join("alignedcore"), &dir.join("aligned_core_genes.zip"))?;
        utils::remove_path(&dir.join("alignedcore"))?;
        utils::remove_path(&dir.join("trimmedcore"))?;
    }

    let removed = [("queryseqs", ""), ("domrslt", ""), ("", ".hmm")]
        .iter()
        .map(|(prefix, suffix)| utils::remove_matching(&dir, prefix, suffix))
        .collect::<Result<Vec<_>, Report>>()?;
    log.debug(format!("Removed {} intermediate files", removed.iter().sum::<usize>()));
    Ok(())
}

fn summarize(
    genome: &Genome,
    core: &CoreHits,
    evidence: &Evidence,
    annotations: [Option<&HitTable>; 2],
    proximity: Option<usize>,
    multi_criteria: MultiCriteria,
    stages: StageReport,
) -> RunSummary {
    let [known, duf] = annotations.map(|table| table.map(|t| t.seqs.len()).unwrap_or(0));
    RunSummary {
        organism: genome.organism.clone(),
        genus: genome.genus.clone(),
        core_genes: core.models.len(),
        known_hits: known,
        duf_hits: duf,
        clusters: genome.clusters.len(),
        duplicates: evidence.duplicates.as_ref().map(Vec::len).unwrap_or(0),
        proximity: proximity.unwrap_or(0),
        phylogeny: evidence.phylogeny.as_ref().map(|p| p.values().map(|nodes| nodes.len()).sum()).unwrap_or(0),
        multi_criteria,
        stages,
    }
}

