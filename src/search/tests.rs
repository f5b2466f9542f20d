use crate::search::models::{self, CutoffValues};
use crate::search::{parse_source_location, CoreHits, CutoffPolicy, Hit, HitTable};
use crate::utils::runlog::RunLog;

use color_eyre::eyre::{Report, Result};
use indoc::indoc;
use std::collections::BTreeMap;

fn domtbl_line(seqid: &str, model: &str, acc: &str, evalue: &str, bitscore: &str) -> String {
    format!(
        "Sx|source|contig_1|loc|10_21_1|{seqid} - 120 {model} {acc} 300 {evalue} {bitscore} 0.1 1 1 1e-52 2e-50 170.0 0.1 1 100 2 110 1 115 0.98 putative protein"
    )
}

fn write_domtbl(dir: &std::path::Path, lines: &[String]) -> Result<std::path::PathBuf, Report> {
    let path = dir.join("domrslt_test.domhr");
    let mut content = String::from("# target name accession tlen query name ...\n");
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    content.push_str("#\n# Program: hmmsearch\n");
    std::fs::write(&path, content)?;
    Ok(path)
}

#[test]
fn cutoff_policy_search_args() -> Result<(), Report> {
    assert_eq!(CutoffPolicy::Trusted.hmmsearch_args(), ["--cut_tc"]);
    assert_eq!(CutoffPolicy::Gathering.hmmsearch_args(), ["-E", "0.01"]);
    assert_eq!(CutoffPolicy::Evalue(0.001).hmmsearch_args(), ["-E", "0.001"]);

    let log = RunLog::new("test");
    assert_eq!(CutoffPolicy::parse_or_default(None, &log), CutoffPolicy::Trusted);
    assert_eq!(CutoffPolicy::parse_or_default(Some("nonsense"), &log), CutoffPolicy::Trusted);
    assert_eq!(CutoffPolicy::parse_or_default(Some("e4"), &log), CutoffPolicy::NoiseFraction(0.30));
    Ok(())
}

#[test]
fn cutoff_policy_thresholds() -> Result<(), Report> {
    let cutoffs = BTreeMap::from([
        ("TIGR1".to_string(), CutoffValues { ga: Some([50.0, 40.0]), tc: None, nc: Some([20.0, 10.0]) }),
        ("TIGR2".to_string(), CutoffValues::default()),
    ]);
    assert_eq!(CutoffPolicy::Trusted.thresholds(&cutoffs), None);

    let ga = CutoffPolicy::Gathering.thresholds(&cutoffs).unwrap_or_default();
    assert_eq!(ga["TIGR1"], 50.0);
    assert_eq!(ga["TIGR2"], 0.0);

    let e3 = CutoffPolicy::NoiseFraction(0.5).thresholds(&cutoffs).unwrap_or_default();
    assert_eq!(e3["TIGR1"], 10.0);
    Ok(())
}

#[test]
fn source_location_variants() -> Result<(), Report> {
    let (source, loc) = parse_source_location("Org|source|NZ_CP1.1|loc|5_900_1");
    assert_eq!(source, "NZ_CP1.1");
    assert_eq!(loc, ["5", "900", "1"]);

    let (source, loc) = parse_source_location("Org|source|plasmid|G000003");
    assert_eq!(source, "plasmid");
    assert_eq!(loc, ["", "", ""]);

    let (source, loc) = parse_source_location("Org|loc|5_900_-1|G000003");
    assert_eq!(source, "");
    assert_eq!(loc, ["5", "900", "-1"]);
    Ok(())
}

#[test]
fn hit_from_domtbl_line() -> Result<(), Report> {
    let hit = Hit::from_domtbl_line(&domtbl_line("G000001", "rpoB", "TIGR02013", "1.2e-50", "170.5"))?;
    assert_eq!(hit.seqid, "G000001");
    assert_eq!(hit.model, "TIGR02013");
    assert_eq!(hit.model_name, "rpoB");
    assert_eq!(hit.source, "contig_1");
    assert_eq!((hit.start.as_str(), hit.end.as_str(), hit.strand.as_str()), ("10", "21", "1"));
    assert_eq!(hit.bitscore, 170.5);
    assert_eq!(hit.description, "putative protein");
    assert_eq!(hit.label(), "G000001|contig_1:10-21");

    // models without an accession are keyed by name
    let hit = Hit::from_domtbl_line(&domtbl_line("G000001", "DUF1234", "-", "1e-5", "30"))?;
    assert_eq!(hit.model, "DUF1234");

    assert!(Hit::from_domtbl_line("too few columns").is_err());
    Ok(())
}

#[test]
fn best_hit_per_sequence() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = write_domtbl(
        dir.path(),
        &[
            domtbl_line("G000001", "rpoB", "TIGR1", "1e-50", "100.0"),
            domtbl_line("G000001", "rpoC", "TIGR2", "1e-60", "150.0"),
            // tie does not replace the best hit
            domtbl_line("G000001", "gyrB", "TIGR3", "1e-60", "150.0"),
            domtbl_line("G000002", "rpoB", "TIGR1", "1e-40", "90.0"),
        ],
    )?;

    let table = HitTable::from_domtbl(&path, None, false)?;
    assert_eq!(table.seqs.len(), 2);
    assert_eq!(table.seqs["G000001"].model, "TIGR2");
    assert_eq!(table.seqs["G000002"].model, "TIGR1");
    assert_eq!(table.by_model["TIGR1"].len(), 2);
    assert_eq!(table.data.len(), 2);
    assert_eq!(table.data[0].model, "TIGR1");

    // parsing is idempotent
    assert_eq!(HitTable::from_domtbl(&path, None, false)?, table);
    Ok(())
}

#[test]
fn zero_hits_is_empty() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = write_domtbl(dir.path(), &[])?;
    let table = HitTable::from_domtbl(&path, Some(0.1), true)?;
    assert!(table.is_empty());
    assert_eq!(table.to_json()["data"].as_array().map(|a| a.len()), Some(0));
    Ok(())
}

#[test]
fn hit_table_json_and_tsv() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = write_domtbl(dir.path(), &[domtbl_line("G000001", "vanA", "RF0001", "0.001", "200.0")])?;
    let table = HitTable::from_domtbl(&path, None, true)?;
    table.write(dir.path(), "knownhits")?;

    let json: serde_json::Value = crate::utils::read_json(&dir.path().join("knownhits.json"))?;
    assert_eq!(json["seqs"]["G000001"][0], "G000001");
    assert_eq!(json["seqs"]["G000001"][7], 200.0);
    assert_eq!(json["RF0001"]["G000001"][5], "putative protein");

    let tsv = std::fs::read_to_string(dir.path().join("knownhits.tsv"))?;
    let expected = indoc! {"
        #Model\tDescription\tSequence id\tevalue\tbitscore\tSequence description
        RF0001\tvanA\tG000001\t0.001\t200\tputative protein
    "};
    assert_eq!(tsv, expected);
    Ok(())
}

#[test]
fn core_hits_evalue_and_threshold_filter() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = write_domtbl(
        dir.path(),
        &[
            domtbl_line("G000001", "rpoB", "TIGR1", "1e-50", "100.0"),
            domtbl_line("G000002", "rpoB", "TIGR1", "1e-50", "40.0"),
            domtbl_line("G000003", "gyrB", "TIGR2", "0.5", "20.0"),
            // below the threshold of TIGR2, falls back to TIGR1
            domtbl_line("G000004", "gyrB", "TIGR2", "1e-30", "45.0"),
            domtbl_line("G000004", "rpoB", "TIGR1", "1e-20", "60.0"),
        ],
    )?;
    let thresholds = BTreeMap::from([("TIGR1".to_string(), 50.0), ("TIGR2".to_string(), 50.0)]);

    let core = CoreHits::from_domtbl(&path, Some(&thresholds))?;
    assert_eq!(core.models.len(), 1);
    assert_eq!(core.models["TIGR1"], ["G000001", "G000004"]);
    assert_eq!(core.labels("TIGR1"), ["G000001|contig_1:10-21", "G000004|contig_1:10-21"]);

    let unfiltered = CoreHits::from_domtbl(&path, None)?;
    assert_eq!(unfiltered.models["TIGR1"], ["G000001", "G000002", "G000004"]);
    assert!(!unfiltered.models.contains_key("TIGR2"));
    Ok(())
}

#[test]
fn core_hits_threshold_ties_keep_first_hit() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = write_domtbl(
        dir.path(),
        &[
            domtbl_line("G000001", "zz", "TIGR9", "1e-50", "150.0"),
            domtbl_line("G000001", "aa", "TIGR1", "1e-50", "150.0"),
            domtbl_line("G000002", "aa", "TIGR1", "1e-40", "120.0"),
            domtbl_line("G000002", "zz", "TIGR9", "1e-45", "130.0"),
        ],
    )?;
    let thresholds = BTreeMap::from([("TIGR1".to_string(), 50.0), ("TIGR9".to_string(), 50.0)]);

    let filtered = CoreHits::from_domtbl(&path, Some(&thresholds))?;
    let unfiltered = CoreHits::from_domtbl(&path, None)?;
    for core in [&filtered, &unfiltered] {
        assert_eq!(core.table.seqs["G000001"].model, "TIGR9");
        assert_eq!(core.table.seqs["G000002"].model, "TIGR9");
        assert_eq!(core.models["TIGR9"], ["G000001", "G000002"]);
        assert!(!core.models.contains_key("TIGR1"));
    }
    assert_eq!(filtered.table.hits.len(), 4);
    Ok(())
}

#[test]
fn cutoff_values_without_final_terminator() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("truncated.hmm");
    let hmm = indoc! {"
        NAME  rpoB
        ACC   TIGR02013
        TC    1210.50 1210.50;
        HMM          A        C
        //
        NAME  gyrB
        ACC   TIGR01059
        TC    640.00 640.00;
        HMM          A        C
    "};
    std::fs::write(&path, hmm)?;

    let cutoffs = models::cutoff_values(&path)?;
    assert_eq!(cutoffs.len(), 2);
    assert_eq!(cutoffs["TIGR02013"].tc, Some([1210.5, 1210.5]));
    assert_eq!(cutoffs["TIGR01059"].tc, Some([640.0, 640.0]));
    Ok(())
}

#[test]
fn cutoff_values_from_hmm() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("core.hmm");
    let hmm = indoc! {"
        HMMER3/f [3.1b2 | February 2015]
        NAME  rpoB
        ACC   TIGR02013
        DESC  DNA-directed RNA polymerase, beta subunit
        GA    1200.00 1200.00;
        TC    1210.50 1210.50;
        NC    1100.00 1100.00;
        HMM          A        C
        //
        HMMER3/f [3.1b2 | February 2015]
        NAME  orphan
        TC    25.00 20.00;
        HMM          A        C
        //
    "};
    std::fs::write(&path, hmm)?;

    let cutoffs = models::cutoff_values(&path)?;
    assert_eq!(cutoffs["TIGR02013"].tc, Some([1210.5, 1210.5]));
    assert_eq!(cutoffs["TIGR02013"].nc, Some([1100.0, 1100.0]));
    assert_eq!(cutoffs["orphan"].tc, Some([25.0, 20.0]));
    assert_eq!(cutoffs["orphan"].ga, None);

    let metadata = models::load_metadata(&path)?;
    assert_eq!(metadata["TIGR02013"].name, "rpoB");
    assert_eq!(metadata["TIGR02013"].description, "DNA-directed RNA polymerase, beta subunit");
    assert_eq!(metadata["TIGR02013"].tc, "1210.50");
    assert_eq!(metadata["TIGR02013"].function, "N/A");
    assert_eq!(metadata["orphan"].description, "N/A");
    Ok(())
}

#[test]
fn metadata_from_tsv_first_wins() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("model_metadata.tsv");
    let tsv = indoc! {"
        #model\tname\tdescription\tfunction
        TIGR02013\trpoB\tRNA polymerase\tTranscription
        TIGR02013\tduplicate\tignored\tignored
        TIGR00001\trpmI\tribosomal protein L35
    "};
    std::fs::write(&path, tsv)?;

    let metadata = models::load_metadata(&path)?;
    assert_eq!(metadata.len(), 2);
    assert_eq!(metadata["TIGR02013"].label(), "rpoB: RNA polymerase");
    assert_eq!(metadata["TIGR02013"].function, "Transcription");
    assert_eq!(metadata["TIGR00001"].function, "N/A");

    assert!(models::load_metadata(&dir.path().join("model_metadata.xml")).is_err());
    Ok(())
}
