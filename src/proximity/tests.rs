use crate::genome::ClusterRecord;
use crate::proximity::{check_proximity, overlaps, EvidenceKind};
use crate::search::models::{MetadataTable, ModelMetadata};
use crate::search::{Hit, HitTable};

use color_eyre::eyre::{Report, Result};

fn cluster(index: usize, source: &str, start: u64, end: u64) -> ClusterRecord {
    ClusterRecord { index, product: "NRPS".to_string(), source: source.to_string(), start, end }
}

fn hit(seqid: &str, model: &str, source: &str, start: u64, end: u64) -> Hit {
    Hit {
        seqid: seqid.to_string(),
        model: model.to_string(),
        model_name: model.to_lowercase(),
        source: source.to_string(),
        start: start.to_string(),
        end: end.to_string(),
        strand: "1".to_string(),
        evalue: 1e-30,
        bitscore: 100.0,
        description: String::new(),
    }
}

#[test]
fn overlap_is_symmetric() -> Result<(), Report> {
    let intervals = [(1, 5), (5, 9), (6, 6), (10, 20), (0, 100)];
    for a in intervals {
        for b in intervals {
            assert_eq!(overlaps(a, b), overlaps(b, a), "{a:?} {b:?}");
            assert_eq!(overlaps(a, b), !(a.1 < b.0 || b.1 < a.0));
        }
    }
    Ok(())
}

#[test]
fn first_cluster_wins() -> Result<(), Report> {
    let clusters = [cluster(1, "contig_1", 100, 200), cluster(2, "contig_1", 150, 300)];
    let core = HitTable::from_hits([hit("G000001", "TIGR1", "contig_1", 160, 170)], false);

    let result = check_proximity(&clusters, &[(EvidenceKind::Core, &core)], &MetadataTable::new());
    assert_eq!(result.clusters[0].hits.len(), 1);
    assert!(result.clusters[1].hits.is_empty());
    assert_eq!(result.core_hits, 1);
    assert_eq!(
        result.proximity["TIGR1"]["G000001"],
        ["cluster-1", "NRPS", "contig_1", "100", "200", "160", "170", "Core"]
    );
    Ok(())
}

#[test]
fn contigs_and_kinds_are_respected() -> Result<(), Report> {
    let clusters = [cluster(1, "contig_1", 100, 200), cluster(2, "contig_2", 100, 200)];
    let core = HitTable::from_hits(
        [hit("G000001", "TIGR1", "contig_2", 190, 260), hit("G000002", "TIGR2", "contig_1", 201, 300)],
        false,
    );
    let known = HitTable::from_hits([hit("G000003", "RF0001", "contig_1", 120, 130)], true);
    let metadata = MetadataTable::from([(
        "RF0001".to_string(),
        ModelMetadata::from_fields(&["vanA", "vancomycin resistance", "Resistance"]),
    )]);

    let result = check_proximity(
        &clusters,
        &[(EvidenceKind::Core, &core), (EvidenceKind::ResModel, &known)],
        &metadata,
    );
    assert_eq!(result.clusters[1].hits[0].seqid, "G000001");
    assert_eq!(result.clusters[0].hits.len(), 1);
    assert_eq!(
        result.clusters[0].hits[0].row(),
        ["G000003", "RF0001", "120", "130", "ResModel", "vanA: vancomycin resistance", "Resistance"]
    );
    // only core hits are proximity evidence
    assert_eq!(result.proximity.keys().collect::<Vec<_>>(), ["TIGR1"]);

    let table = result.to_table()?;
    assert_eq!(table.rows[0][..6], ["cluster-1", "NRPS", "contig_1", "100 - 200", "0", "1"]);
    assert_eq!(result.to_json()["cluster-2"]["row"][0], "cluster-2");
    Ok(())
}
