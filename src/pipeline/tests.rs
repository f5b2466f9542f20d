use crate::cli::run::RunArgs;
use crate::pipeline::{export, run_query, QueryContext};
use crate::report::{RunSummary, StageStatus};
use crate::utils::{runlog::RunLog, table::Table};

use color_eyre::eyre::{eyre, Report, Result};
use indoc::indoc;
use std::path::{Path, PathBuf};

const CORE_MODELS: &str = indoc! {"
    HMMER3/f [3.1b2 | February 2015]
    NAME  rpoB
    ACC   TIGR1
    DESC  DNA-directed RNA polymerase, beta subunit
    TC    100.00 100.00;
    HMM          A        C
    //
    HMMER3/f [3.1b2 | February 2015]
    NAME  gyrB
    ACC   TIGR2
    DESC  DNA gyrase, B subunit
    TC    100.00 100.00;
    HMM          A        C
    //
    HMMER3/f [3.1b2 | February 2015]
    NAME  recA
    ACC   TIGR3
    DESC  protein RecA
    TC    100.00 100.00;
    HMM          A        C
    //
"};

fn touch(path: &Path) -> Result<(), Report> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, "content\n")?;
    Ok(())
}

#[test]
fn stage_failures_are_recorded() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let mut ctx = QueryContext::new(dir.path(), &RunLog::new("test"));

    assert_eq!(ctx.stage("rna", |_| Ok(3)), Some(3));
    assert_eq!(ctx.stage::<usize, _>("duf", |_| Err(eyre!("hmmsearch exited with 1"))), None);
    ctx.skip("phylogeny", "phyl option unset");

    assert_eq!(ctx.stages.status("rna"), Some(&StageStatus::Completed));
    assert_eq!(ctx.stages.status("duf"), Some(&StageStatus::Failed("hmmsearch exited with 1".to_string())));
    assert_eq!(ctx.stages.failed(), ["duf"]);
    Ok(())
}

#[test]
fn missing_input_is_fatal() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let args = RunArgs { refdir: dir.path().join("reference"), ..Default::default() };

    let result = run_query(&args, &dir.path().join("missing.gbk"), dir.path(), &RunLog::new("test"));
    assert!(result.is_err());
    // folders and arguments are written before the input is checked
    assert!(dir.path().join("coregenes").is_dir());
    assert!(dir.path().join("tables").is_dir());
    let saved: RunArgs = crate::utils::read_json(&dir.path().join("arts-args.json"))?;
    assert_eq!(saved.multicpu, 1);
    Ok(())
}

#[test]
fn unreadable_genome_then_missing_models() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("Streptomyces sp. X.gbk");
    std::fs::write(&input, "not a genbank file\n")?;
    let args = RunArgs { refdir: dir.path().join("reference"), ..Default::default() };

    // the genome falls back to an empty one named after the file, the missing core models stop the run
    let error = run_query(&args, &input, dir.path(), &RunLog::new("test")).err().ok_or(eyre!("expected an error"))?;
    assert!(format!("{error:?}").contains("No core hmm models found"), "{error:?}");
    let genes = std::fs::read_to_string(dir.path().join("queryseqs.json"))?;
    assert!(genes.contains("Streptomyces_sp_X"), "{genes}");
    assert!(dir.path().join("locus_to_region.json").exists());
    Ok(())
}

#[test]
fn unreadable_genome_still_summarized() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let refdir = dir.path().join("reference");
    std::fs::create_dir_all(&refdir)?;
    std::fs::write(refdir.join("coremodels.hmm"), CORE_MODELS)?;
    let input = dir.path().join("Streptomyces sp. X.gbk");
    std::fs::write(&input, "not a genbank file\n")?;
    let results = dir.path().join("results");
    let args = RunArgs { refdir, ..Default::default() };

    // no proteins to search, the core search is skipped instead of failing in hmmsearch
    let summary = run_query(&args, &input, &results, &RunLog::new("test"))?;
    assert_eq!(summary.organism, "Streptomyces_sp_X");
    assert_eq!(summary.core_genes, 0);
    assert!(matches!(summary.stages.status("genome"), Some(StageStatus::Failed(_))));
    assert_eq!(summary.stages.status("core"), Some(&StageStatus::Completed));

    let saved = RunSummary::read(&results.join("tables").join("summary.json"))?;
    assert_eq!(saved, summary);
    Ok(())
}

#[test]
fn export_archives_and_cleans() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    for path in [
        "astMLST.tree",
        "trees/TIGR1.tree",
        "raxml/RAxML_info.TIGR1",
        "alignedcore/TIGR1.fna",
        "trimmedcore/TIGR1.fna",
        "queryseqs.faa",
        "domrslt_abc.domhr",
        "kres.hmm",
        "knownhits.domhr",
    ] {
        touch(&root.join(path))?;
    }

    export(root, &RunLog::new("test"))?;

    assert!(root.join("trees/SpeciesMLST.tree").exists());
    assert!(!root.join("astMLST.tree").exists());
    assert!(root.join("alltrees.zip").exists());
    assert!(root.join("aligned_core_genes.zip").exists());
    for removed in ["raxml", "alignedcore", "trimmedcore", "queryseqs.faa", "domrslt_abc.domhr", "kres.hmm"] {
        assert!(!root.join(removed).exists(), "{removed} was not removed");
    }
    assert!(root.join("knownhits.domhr").exists());
    Ok(())
}

#[test]
fn export_without_trees_keeps_folders() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("raxml"))?;
    std::fs::create_dir_all(dir.path().join("trees"))?;

    export(dir.path(), &RunLog::new("test"))?;
    assert!(!dir.path().join("alltrees.zip").exists());
    assert!(dir.path().join("raxml").is_dir());
    Ok(())
}

// ----------------------------------------------------------------------------
// Full run with stand-in external programs

const QUERY_GENBANK: &str = indoc! {r#"
    LOCUS       contig_1                 120 bp    DNA     linear   UNK 01-JAN-1980
    DEFINITION  Streptomyces sp. X contig_1.
    ACCESSION   contig_1
    VERSION     contig_1
    KEYWORDS    .
    SOURCE      Streptomyces sp. X
      ORGANISM  Streptomyces sp. X
                Bacteria.
    FEATURES             Location/Qualifiers
         region          1..60
                         /product="NRPS"
                         /region_number="1"
         CDS             10..21
                         /locus_tag="SX_0001"
                         /translation="MKV"
         CDS             complement(31..42)
                         /locus_tag="SX_0002"
                         /translation="MAA"
         CDS             70..81
                         /locus_tag="SX_0003"
                         /translation="MHA"
         CDS             91..102
                         /locus_tag="SX_0004"
                         /translation="MHA"
    ORIGIN
            1 atgaaagtat gaatgaaagt atgatgcaaa ttacgccgcc atcgggggct gcatgcatgc
           61 atgcatgcat gcatgcatgc atgcatgcat gcatgcatgc atgcatgcat gcatgcatgc
    //
"#};

/// TIGR1 twice in the cluster, TIGR2 and TIGR3 once outside of it.
const QUERY_HITS: [(&str, &str, &str); 4] = [
    ("10_21_1|G000001", "rpoB", "TIGR1"),
    ("31_42_-1|G000002", "rpoB", "TIGR1"),
    ("70_81_1|G000003", "gyrB", "TIGR2"),
    ("91_102_1|G000004", "recA", "TIGR3"),
];

const REFERENCE_MATRIX: &str = "#Gene\tMean\tStdev\tRSD\tUbiquity\tSalinispora_tropica\tAmycolatopsis_sp
#Singles\tTIGR1,TIGR2,TIGR3
TIGR1\t1\t0.3\t0.3\t1\t1\t1
TIGR2\t1\t0\t0\t1\t1\t1
TIGR3\t1\t0\t0\t1\t1\t1
";

#[cfg(unix)]
fn write_script(path: &Path, script: &str) -> Result<PathBuf, Report> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, script)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path.to_path_buf())
}

/// Stand-ins for hmmsearch, mafft, trimal, RAxML, java (ASTRAL) and RANGER-DTL.
///
/// Returns the RANGER-DTL executable, the others are found on the `PATH`.
#[cfg(unix)]
fn install_tools(bin: &Path, domtbl: &Path) -> Result<PathBuf, Report> {
    std::fs::create_dir_all(bin)?;
    let hmmsearch = format!(
        "#!/bin/sh\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"--domtblout\" ]; then cp \"{}\" \"$2\"; fi\n  shift\ndone\n",
        domtbl.display()
    );
    write_script(&bin.join("hmmsearch"), &hmmsearch)?;
    // the reference alignment, written to stdout
    write_script(&bin.join("mafft"), "#!/bin/sh\nfor arg; do last=\"$arg\"; done\ncat \"$last\"\n")?;
    // -automated1 -in A -out B
    write_script(&bin.join("trimal"), "#!/bin/sh\ncp \"$3\" \"$5\"\n")?;
    // -w WORKDIR -t TREE -s ALIGNMENT -n NAME, the reference tree is returned as placed
    write_script(&bin.join("raxmlHPC-SSE3"), "#!/bin/sh\ncp \"${10}\" \"$8/RAxML_labelledTree.${14}\"\n")?;
    // -Xmx -jar JAR -i INPUT -o OUTPUT
    write_script(
        &bin.join("java"),
        "#!/bin/sh\necho \"((Streptomyces_sp_X,Salinispora_tropica),Amycolatopsis_sp);\" > \"$7\"\n",
    )?;
    // S0_1 is the first query gene, S1_3 the Salinispora gene of TIGR1
    let ranger = indoc! {r#"
        #!/bin/sh
        case "$2" in
          *TIGR1.input) echo "m1 = LCA[S0_1, S1_3]: Transfer, Mapping --> S1, Recipient --> S1" > "$4" ;;
          *) : > "$4" ;;
        esac
    "#};
    write_script(&bin.join("ranger-dtl"), ranger)
}

#[cfg(unix)]
fn zip_names(path: &Path) -> Result<Vec<String>, Report> {
    let zip = zip::ZipArchive::new(std::fs::File::open(path)?)?;
    let mut names = zip.file_names().map(String::from).collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

#[cfg(unix)]
#[test]
fn full_run_with_phylogeny() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    // reference: TIGR3 has neither alignment nor tree, its gene tree is aborted
    let refdir = root.join("reference");
    std::fs::create_dir_all(refdir.join("trees"))?;
    std::fs::write(refdir.join("coremodels.hmm"), CORE_MODELS)?;
    std::fs::write(refdir.join("genematrix.txt"), REFERENCE_MATRIX)?;
    std::fs::write(refdir.join("TIGR1.fna"), ">Salinispora_tropica|A1\nATGAAAGTA\n>Amycolatopsis_sp|B1\nATGAAAGTA\n")?;
    std::fs::write(refdir.join("TIGR2.fna"), ">Salinispora_tropica|A2\nATGCATGCA\n>Amycolatopsis_sp|B2\nATGCATGCA\n")?;
    std::fs::write(
        refdir.join("trees").join("TIGR1.tree"),
        "((QUERY___Streptomyces_sp_X|G000001:0.1,QUERY___Streptomyces_sp_X|G000002:0.1):0.1,(Salinispora_tropica|A1:0.1,Amycolatopsis_sp|B1:0.2):0.1);\n",
    )?;
    std::fs::write(
        refdir.join("trees").join("TIGR2.tree"),
        "((QUERY___Streptomyces_sp_X|G000003:0.1,Salinispora_tropica|A2:0.1):0.1,Amycolatopsis_sp|B2:0.2);\n",
    )?;

    let domtbl = root.join("core.domtbl");
    let mut content = String::from("# target name accession tlen query name ...\n");
    for (target, name, acc) in QUERY_HITS {
        content.push_str(&format!(
            "Streptomyces_sp_X|source|contig_1|loc|{target} - 120 {name} {acc} 300 1e-50 150.0 0.1 1 1 1e-52 2e-50 170.0 0.1 1 100 2 110 1 115 0.98 putative protein\n"
        ));
    }
    std::fs::write(&domtbl, content)?;

    let bin = root.join("bin");
    let ranger = install_tools(&bin, &domtbl)?;
    let path = std::env::var_os("PATH").unwrap_or_default();
    let path = std::env::join_paths(std::iter::once(bin.clone()).chain(std::env::split_paths(&path)))?;
    std::env::set_var("PATH", path);

    let astral = bin.join("astral.jar");
    std::fs::write(&astral, "")?;
    let input = root.join("query.gbk");
    std::fs::write(&input, QUERY_GENBANK)?;

    let results = root.join("results");
    let args = RunArgs {
        refdir,
        astral: Some(astral),
        ranger: ranger.display().to_string(),
        ..Default::default()
    };
    let summary = run_query(&args, &input, &results, &RunLog::new("test"))?;

    assert_eq!(summary.organism, "Streptomyces_sp_X");
    assert_eq!(summary.core_genes, 3);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.proximity, 2);
    assert_eq!(summary.phylogeny, 1);
    assert_eq!(summary.multi_criteria.three_plus.iter().collect::<Vec<_>>(), ["TIGR1"]);
    for stage in ["genome", "core", "duplication", "proximity", "phylogeny", "export"] {
        assert_eq!(summary.stages.status(stage), Some(&StageStatus::Completed), "{stage}");
    }
    assert_eq!(RunSummary::read(&results.join("tables").join("summary.json"))?, summary);

    // final core table, after the phylogeny evidence was added
    let table = Table::read(&results.join("tables").join("coretable.tsv"))?;
    let flags = ["Duplication", "BGC_Proximity", "Phylogeny", "Known_target"]
        .iter()
        .map(|header| table.header_position(header))
        .collect::<Result<Vec<_>, Report>>()?;
    let row = |model: &str| -> Result<Vec<String>, Report> {
        let row = table.rows.iter().find(|row| row[0] == model).ok_or_else(|| eyre!("no row for {model}"))?;
        Ok(flags.iter().map(|i| row[*i].clone()).collect())
    };
    assert_eq!(row("TIGR1")?, ["Yes", "Yes", "Yes", "N/A"]);
    assert_eq!(row("TIGR2")?, ["No", "No", "No", "N/A"]);
    assert_eq!(row("TIGR3")?, ["No", "No", "No", "N/A"]);

    // exported archives, the aborted TIGR3 tree is absent
    assert_eq!(
        zip_names(&results.join("alltrees.zip"))?,
        ["trees/SpeciesMLST.tree", "trees/TIGR1.tree", "trees/TIGR2.tree"]
    );
    assert_eq!(zip_names(&results.join("aligned_core_genes.zip"))?, ["alignedcore/TIGR1.fna", "alignedcore/TIGR2.fna"]);
    for removed in ["raxml", "alignedcore", "trimmedcore", "astMLST.tree", "queryseqs.faa"] {
        assert!(!results.join(removed).exists(), "{removed} was not removed");
    }
    let dtl = std::fs::read_to_string(results.join("dtlresults.json"))?;
    assert!(dtl.contains("Salinispora_tropica|A1"), "{dtl}");
    Ok(())
}
