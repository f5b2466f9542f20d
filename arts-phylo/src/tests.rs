use crate::{newick, ToNewick};
use color_eyre::eyre::{Report, Result};

#[test]
fn parse_raxml_labelled_tree() -> Result<(), Report> {
    let nwk = "((Streptomyces_a|G00001:0.1[I0],Streptomyces_b|A12:0.2[I1]):0.3[I2],Bacillus_c|B7:0.4[I3]);";
    let tree = newick::parse(nwk)?;
    assert_eq!(tree.leaf_labels()?, ["Streptomyces_a|G00001", "Streptomyces_b|A12", "Bacillus_c|B7"]);
    assert_eq!(tree.to_newick()?, "((Streptomyces_a|G00001:0.1,Streptomyces_b|A12:0.2):0.3,Bacillus_c|B7:0.4);");
    Ok(())
}

#[test]
fn parse_quoted_labels() -> Result<(), Report> {
    let tree = newick::parse("('A B':1,'it''s':2);")?;
    assert_eq!(tree.leaf_labels()?, ["A B", "it's"]);
    Ok(())
}

#[test]
fn parse_rejects_malformed() -> Result<(), Report> {
    assert!(newick::parse("").is_err());
    assert!(newick::parse("((A,B);").is_err());
    assert!(newick::parse("(A,B);(C,D);").is_err());
    assert!(newick::parse("(A:x,B);").is_err());
    Ok(())
}

#[test]
fn prune_drops_empty_subtrees() -> Result<(), Report> {
    let tree = newick::parse("((A,B),(C,D),E);")?;
    let pruned = tree.prune(|label| label == "A" || label == "E")?;
    assert_eq!(pruned.to_newick()?, "(A,E);");
    assert!(tree.prune(|_| false).is_err());
    Ok(())
}

#[test]
fn clear_internal_labels_keeps_leaves() -> Result<(), Report> {
    let mut tree = newick::parse("((A,B)0.9,(C,D)1.0)root;")?;
    tree.clear_internal_labels();
    assert_eq!(tree.to_newick()?, "((A,B),(C,D));");
    Ok(())
}

#[test]
fn resolve_root_is_noop_on_binary_root() -> Result<(), Report> {
    let mut tree = newick::parse("((A,B),C);")?;
    tree.resolve_root()?;
    assert_eq!(tree.to_newick()?, "((A,B),C);");
    Ok(())
}
