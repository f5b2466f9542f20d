use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::hash::Hash;

/// A [`Node`] in the [`Phylogeny`](crate::Phylogeny) graph.
///
/// Nodes carry an `id` that is unique within one tree, so that unnamed internal
/// nodes (ex. `((A,B),(C,D));`) remain distinct vertices.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Node<N> {
    /// Unique identifier within the tree.
    pub id: usize,
    /// [`Node`] label for display, empty for unnamed internal nodes.
    pub label: N,
}

#[rustfmt::skip]
impl<N> Display for Node<N> where N: Display { fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.label) } }

impl<N> Node<N> {
    /// Returns a new [`Node`].
    ///
    /// ```rust
    /// use arts_phylo::Node;
    /// let node = Node::new(0, "A");
    /// assert_eq!(node.to_string(), "A");
    /// ```
    pub fn new(id: usize, label: N) -> Self {
        Node { id, label }
    }
}
