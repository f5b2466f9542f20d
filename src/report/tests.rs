use crate::report::{CoreTable, DupTable, Evidence, MultiCriteria, RunSummary, StageReport, StageStatus};
use crate::search::models::{MetadataTable, ModelMetadata};
use crate::search::{CoreHits, Hit, HitTable};

use color_eyre::eyre::{Report, Result};
use std::collections::BTreeMap;

fn hit(seqid: &str, model: &str, start: u64) -> Hit {
    Hit {
        seqid: seqid.to_string(),
        model: model.to_string(),
        model_name: model.to_lowercase(),
        source: "contig_1".to_string(),
        start: start.to_string(),
        end: (start + 300).to_string(),
        strand: "1".to_string(),
        evalue: 1e-20,
        bitscore: 150.0,
        description: String::new(),
    }
}

fn core_hits() -> CoreHits {
    let table = HitTable::from_hits(
        [hit("G000001", "TIGR1", 100), hit("G000002", "TIGR1", 900), hit("G000003", "TIGR2", 2000)],
        false,
    );
    CoreHits::from_table(table)
}

fn metadata() -> MetadataTable {
    MetadataTable::from([
        ("TIGR1".to_string(), ModelMetadata::from_fields(&["rpoB", "RNA polymerase", "Transcription", "500"])),
        ("TIGR2".to_string(), ModelMetadata::from_fields(&["gyrB", "DNA gyrase", "Replication"])),
    ])
}

fn set(genes: &[&str]) -> Vec<String> {
    genes.iter().map(|g| g.to_string()).collect()
}

#[test]
fn multi_criteria_tallies() -> Result<(), Report> {
    let mut evidence = Evidence::new();
    assert_eq!(MultiCriteria::from(&evidence), MultiCriteria::default());

    evidence.duplicates = Some(set(&["A", "B", "C"]));
    evidence.proximity = Some(BTreeMap::from([("B".to_string(), BTreeMap::new()), ("C".to_string(), BTreeMap::new())]));
    evidence.phylogeny = Some(BTreeMap::from([("C".to_string(), BTreeMap::new()), ("D".to_string(), BTreeMap::new())]));

    let criteria = MultiCriteria::from(&evidence);
    assert_eq!(criteria.two_plus.iter().collect::<Vec<_>>(), ["B", "C"]);
    assert_eq!(criteria.three_plus.iter().collect::<Vec<_>>(), ["C"]);

    // absent phylogeny contributes nothing
    evidence.phylogeny = None;
    let criteria = MultiCriteria::from(&evidence);
    assert_eq!(criteria.two_plus.iter().collect::<Vec<_>>(), ["B", "C"]);
    assert!(criteria.three_plus.is_empty());
    Ok(())
}

#[test]
fn evidence_json_omits_missing_stages() -> Result<(), Report> {
    let mut evidence = Evidence::new();
    evidence.duplicates = Some(set(&["TIGR1"]));
    let json = serde_json::to_value(&evidence)?;
    assert_eq!(json, serde_json::json!({"duplicates": ["TIGR1"]}));
    Ok(())
}

#[test]
fn core_table_flags() -> Result<(), Report> {
    let core = core_hits();
    let mut evidence = Evidence::new();
    evidence.matrix = Some(BTreeMap::from([("TIGR1".to_string(), vec![2.0]), ("TIGR2".to_string(), vec![1.0])]));
    evidence.duplicates = Some(set(&["TIGR1"]));
    let known = HitTable::from_hits([hit("G000003", "RF0001", 2000)], true);

    // proximity and phylogeny did not run
    let table = CoreTable::new(&core, &evidence, Some(&known), &metadata());
    assert_eq!(table.data.len(), 2);
    let tigr1 = &table.data[0];
    assert_eq!(tigr1.description, "rpoB: RNA polymerase");
    assert_eq!(tigr1.tc, "500");
    assert_eq!(tigr1.duplicate, "Yes");
    assert_eq!(tigr1.proximity, "N/A");
    assert_eq!(tigr1.phylogeny, "N/A");
    assert_eq!(tigr1.known_hit, "No");
    assert_eq!(tigr1.hits, ["G000001", "G000002"]);
    assert_eq!(tigr1.allhits, "[G000001|contig_1:100-400; G000002|contig_1:900-1200]");
    assert_eq!(table.data[1].known_hit, "Yes");
    assert_eq!(table.data[1].duplicate, "No");
    let funcstats = table.funcstats.clone().unwrap_or_default();
    assert_eq!(funcstats["Transcription"], 1);
    assert_eq!(funcstats["Replication"], 1);

    // proximity ran and found TIGR2
    let row = vec!["cluster-1".to_string(), "NRPS".to_string()];
    evidence.proximity = Some(BTreeMap::from([(
        "TIGR2".to_string(),
        BTreeMap::from([("G000003".to_string(), row.clone())]),
    )]));
    let table = CoreTable::new(&core, &evidence, None, &metadata());
    assert_eq!(table.data[0].proximity, "No");
    assert_eq!(table.data[1].proximity, "Yes");
    assert_eq!(table.data[1].proxhits["G000003"], row);
    assert_eq!(table.data[1].known_hit, "N/A");

    let tsv = table.to_table()?;
    assert_eq!(tsv.headers[0], "#Core_gene");
    assert_eq!(tsv.rows[1][..7], ["TIGR2", "gyrB: DNA gyrase", "Replication", "No", "Yes", "N/A", "N/A"]);
    Ok(())
}

#[test]
fn core_table_without_matrix_is_empty() -> Result<(), Report> {
    let table = CoreTable::new(&core_hits(), &Evidence::new(), None, &metadata());
    assert!(table.data.is_empty());
    assert!(table.funcstats.is_none());
    assert_eq!(table.seqs.len(), 3);
    Ok(())
}

#[test]
fn dup_table_rows() -> Result<(), Report> {
    let mut evidence = Evidence::new();
    evidence.matrix = Some(BTreeMap::from([("TIGR1".to_string(), vec![2.0, 1.0, 0.5, 0.5, 0.9, 1.0, 1.0])]));
    evidence.duplicates = Some(set(&["TIGR1", "TIGR9"]));

    let table = DupTable::new(&core_hits(), &evidence, &metadata());
    assert_eq!(
        table.data[0],
        [
            "TIGR1",
            "2",
            "1",
            "0.5",
            "0.5",
            "0.9",
            "[G000001|contig_1:100-400; G000002|contig_1:900-1200]",
            "rpoB: RNA polymerase"
        ]
    );
    assert_eq!(table.data[1], ["TIGR9", "n/a", "[]", "n/a: n/a"]);
    assert_eq!(table.hits["TIGR1"].len(), 2);

    let dir = tempfile::tempdir()?;
    table.write(dir.path())?;
    let tsv = std::fs::read_to_string(dir.path().join("duptable.tsv"))?;
    assert!(tsv.starts_with("#Core_gene\tCount\tRef_median\tRef_stdev\tRef_RSD\tRef_ubiquity\t[Hits_listed]\tDescription\n"));
    Ok(())
}

#[test]
fn stage_report_and_summary() -> Result<(), Report> {
    let mut stages = StageReport::new();
    stages.record("rna", StageStatus::Skipped("no RNA models".to_string()));
    stages.record("core", StageStatus::Completed);
    stages.record("phylogeny", StageStatus::Failed("ASTRAL jar not found".to_string()));
    assert_eq!(stages.failed(), ["phylogeny"]);
    assert_eq!(stages.status("core"), Some(&StageStatus::Completed));
    assert_eq!(StageStatus::Completed.to_string(), "completed");

    let summary = RunSummary { organism: "Sx".to_string(), core_genes: 3, stages, ..Default::default() };
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("summary.json");
    summary.write(&path)?;
    assert_eq!(RunSummary::read(&path)?, summary);

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(json["stages"]["stages"][0][1], serde_json::json!({"status": "skipped", "message": "no RNA models"}));
    Ok(())
}
