//! `arts-phylo` reads, edits, and writes the rooted trees exchanged with the external
//! phylogenetics tools (RAxML, ASTRAL, RANGER-DTL).
//!
//! ```rust
//! use arts_phylo::{newick, ToNewick};
//! let tree = newick::parse("((A:1,B:2):0.5,C:3);")?;
//! assert_eq!(tree.leaf_labels()?, ["A", "B", "C"]);
//! assert_eq!(tree.to_newick()?, "((A:1,B:2):0.5,C:3);");
//! # Ok::<(), color_eyre::eyre::Report>(())
//! ```

use color_eyre::eyre::{Report, Result};

mod branch;
pub mod newick;
mod node;
mod phylogeny;
#[cfg(test)]
mod tests;

#[doc(inline)]
pub use branch::Branch;
#[doc(inline)]
pub use node::Node;
#[doc(inline)]
pub use phylogeny::{Phylogeny, Tree};

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Returns an object created from a [Newick](https://en.wikipedia.org/wiki/Newick_format) [`str`].
pub trait FromNewick {
    fn from_newick(newick: &str) -> Result<Self, Report>
    where
        Self: Sized;
}

/// Returns a [Newick](https://en.wikipedia.org/wiki/Newick_format) [`str`] created from an object.
pub trait ToNewick {
    fn to_newick(&self) -> Result<String, Report>;
}
