use crate::duplication::{analyze, find_duplicates, CountMatrix, DuplicationConfig, ReferenceMatrix, ReferenceRow};

use color_eyre::eyre::{Report, Result};
use indoc::indoc;
use std::collections::BTreeMap;

fn reference(mean: f64, stdev: f64, rsd: f64) -> ReferenceMatrix {
    let mut reference = ReferenceMatrix::default();
    let row = ReferenceRow { mean, stdev, rsd, ubiquity: 0.9, counts: vec![2.0, 3.0] };
    reference.models.insert("geneA".to_string(), row);
    reference
}

fn current(count: usize) -> CountMatrix {
    CountMatrix::new("Sx", BTreeMap::from([("geneA".to_string(), count)]))
}

#[test]
fn duplicate_scenario() -> Result<(), Report> {
    // mean 5, stdev 1, rsd 0.1 with limits that let the model through
    let reference = reference(5.0, 1.0, 0.1);
    let config = DuplicationConfig { max_ref_count: 5.0, min_rsd: 0.1 };
    assert!(find_duplicates(&reference, &current(2), &config).is_empty());
    assert!(find_duplicates(&reference, &current(6), &config).is_empty());
    assert_eq!(find_duplicates(&reference, &current(8), &config), ["geneA"]);

    // default limits exclude a high copy, low spread model
    assert!(find_duplicates(&reference, &current(8), &DuplicationConfig::default()).is_empty());
    Ok(())
}

#[test]
fn duplicate_flag_is_monotonic_in_mean() -> Result<(), Report> {
    let config = DuplicationConfig { max_ref_count: 10.0, min_rsd: 0.0 };
    let mut previous = true;
    for mean in [0.5, 1.0, 2.0, 3.0, 4.0, 6.0, 9.0] {
        let flagged = !find_duplicates(&reference(mean, 0.5, 0.5), &current(4), &config).is_empty();
        assert!(previous || !flagged, "flag reappeared at mean {mean}");
        previous = flagged;
    }
    assert!(!previous);
    Ok(())
}

#[test]
fn unmatched_models_are_ignored() -> Result<(), Report> {
    let reference = reference(1.0, 0.1, 0.5);
    let current = CountMatrix::new("Sx", BTreeMap::from([("geneA".to_string(), 1), ("geneZ".to_string(), 12)]));
    let result = analyze(&reference, &current, &DuplicationConfig::default());
    assert!(result.duplicates.is_empty());
    assert_eq!(result.matrix["geneZ"], [12.0]);
    assert_eq!(result.matrix["geneA"], [1.0, 1.0, 0.1, 0.5, 0.9, 2.0, 3.0]);
    Ok(())
}

#[test]
fn read_reference_matrix() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("genematrix.txt");
    let matrix = indoc! {"
        #Gene\tMean\tStdev\tRSD\tUbiquity\tOrgA\tOrgB
        #Singles\tTIGR1,TIGR2
        TIGR1\t1\t0\t0\t1\t1\t1
        TIGR2\t1.5\t0.5\t0.33\t1\t1\t2
    "};
    std::fs::write(&path, matrix)?;

    let reference = ReferenceMatrix::read(&path)?;
    assert_eq!(reference.organisms, ["OrgA", "OrgB"]);
    assert_eq!(reference.singles.iter().collect::<Vec<_>>(), ["TIGR1", "TIGR2"]);
    assert_eq!(reference.models["TIGR2"].rsd, 0.33);
    assert_eq!(reference.models["TIGR2"].counts, [1.0, 2.0]);

    std::fs::write(&path, "TIGR1\t1\tx\t0\t1\n")?;
    assert!(ReferenceMatrix::read(&path).is_err());
    Ok(())
}

#[test]
fn count_matrix_round_trip_and_singles() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("genematrix.txt");
    let counts = CountMatrix::new(
        "Sx",
        BTreeMap::from([("TIGR1".to_string(), 1), ("TIGR2".to_string(), 3), ("TIGR3".to_string(), 1)]),
    );
    counts.write(&path)?;
    assert_eq!(CountMatrix::read(&path)?, counts);

    // the query file is readable as a reference too
    let as_reference = ReferenceMatrix::read(&path)?;
    assert_eq!(as_reference.organisms, ["Sx"]);
    assert_eq!(as_reference.singles, counts.singles);

    let mut reference = ReferenceMatrix::default();
    reference.singles = ["TIGR1".to_string(), "TIGR2".to_string()].into();
    let result = analyze(&reference, &counts, &DuplicationConfig::default());
    assert_eq!(result.singles, ["TIGR1"]);
    assert_eq!(result.orgs, ["Sx"]);
    Ok(())
}
