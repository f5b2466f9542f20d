use crate::antismash::{check_log, main_output, run_antismash, AntismashConfig, LogVerdict};
use crate::utils::runlog::RunLog;

use color_eyre::eyre::{Report, Result};

#[test]
fn log_verdicts() -> Result<(), Report> {
    assert_eq!(check_log("INFO: Writing output\n"), LogVerdict::Done);
    assert_eq!(
        check_log("ValueError: Called find_genes, but genefinding disabled\n"),
        LogVerdict::NeedsGeneFinding
    );
    assert_eq!(
        check_log("ERROR: whole genome shotgun records are not supported\n"),
        LogVerdict::WgsRecord
    );
    Ok(())
}

#[test]
fn main_output_skips_regions() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    assert_eq!(main_output(dir.path())?, None);

    for name in ["NC_003888.3.region001.gbk", "NC_003888.3.cluster002.gbk", "index.html"] {
        std::fs::write(dir.path().join(name), "")?;
    }
    assert_eq!(main_output(dir.path())?, None);

    std::fs::write(dir.path().join("NC_003888.3.gbk"), "")?;
    assert_eq!(main_output(dir.path())?, Some(dir.path().join("NC_003888.3.gbk")));
    Ok(())
}

#[test]
fn missing_antismash_keeps_input() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("genome.gbk");
    std::fs::write(&input, "LOCUS\n")?;
    let config = AntismashConfig::new(&dir.path().join("run_antismash.py"));

    let output = run_antismash(&config, &input, dir.path(), &RunLog::new("test"))?;
    assert_eq!(output, input);
    assert!(!dir.path().join("aslog.txt").exists());
    Ok(())
}
