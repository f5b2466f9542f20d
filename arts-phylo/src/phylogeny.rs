use crate::{Branch, Node, ToNewick};

use color_eyre::eyre::{eyre, Report, Result};
use itertools::Itertools;
use num_traits::AsPrimitive;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::{Dfs, IntoNodeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// A rooted tree of labelled [`Node`]s and [`Branch`]es, as read from Newick.
pub type Tree = Phylogeny<Node<String>, Branch>;

/// A [`Phylogeny`] as a directed graph of parents and children.
///
/// - The nodes (`N`) can be a wide variety of types (ex. [`str`], [`usize`], [`Node`]).
/// - The branches (`B`) must be a type that can be cast into an [`f32`] for the length.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Phylogeny<N, B> {
    /// Directed graph of parents and children. `N` are nodes and `B` are branches.
    pub graph: Graph<N, B>,
}

impl<N, B> Default for Phylogeny<N, B>
where
    N: Clone + Debug + Display + Eq + Hash + PartialEq,
    B: AsPrimitive<f32> + Debug + Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N, B> Phylogeny<N, B>
where
    N: Clone + Debug + Display + Eq + Hash + PartialEq,
    B: AsPrimitive<f32> + Debug + Display,
{
    /// Returns a new empty [`Phylogeny`] with nodes (`N`) and branches (`B`).
    ///
    /// ## Examples
    ///
    /// ```rust
    /// let mut phylo = arts_phylo::Phylogeny::new();
    /// phylo.add_branch("A", "B", 1.0)?;
    /// phylo.add_branch("A", "C", 2.0)?;
    /// # assert_eq!(phylo.get_nodes()?, [&"A", &"B", &"C"]);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn new() -> Self {
        Phylogeny { graph: Graph::new() }
    }

    /// Creates a branch (`B`) between the parent and child nodes (`N`) and returns the [`EdgeIndex`].
    ///
    /// - If the parent and child nodes don't exist yet in the phylogeny, these nodes are created.
    /// - If a branch already exists between parent and child, the branch is updated.
    /// - If the new edge will create a cycle, returns an Error.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// let mut phylo = arts_phylo::Phylogeny::new();
    /// phylo.add_branch("A", "B", 1.0)?;
    /// assert!(phylo.add_branch("B", "A", 1.0).is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn add_branch(&mut self, source: N, target: N, branch: B) -> Result<EdgeIndex, Report> {
        let parent_node_index = self.add_node(source.clone());
        let child_node_index = self.add_node(target.clone());

        // add edge between parent to child, or update existing
        let edge_index = self.graph.update_edge(parent_node_index, child_node_index, branch);

        // check if edge introduced a cycle
        if is_cyclic_directed(&self.graph) {
            Err(eyre!("New edge between {source} and {target} introduced a cycle."))?
        }

        Ok(edge_index)
    }

    /// Adds a new node (`N`) to the [`Phylogeny`] and returns the [`NodeIndex`].
    /// If the node already exists in the phylogeny, returns the existing [`NodeIndex`].
    pub fn add_node(&mut self, node: N) -> NodeIndex {
        match self.get_node_index(&node) {
            Ok(node_index) => node_index,
            Err(_) => self.graph.add_node(node),
        }
    }

    /// Returns the children of a node index, in the order they were added.
    pub fn get_children_index(&self, node_index: NodeIndex) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(node_index, Direction::Outgoing).sorted().collect()
    }

    /// Returns the children of a node (`N`), in the order they were added.
    ///
    /// ```rust
    /// let mut phylo = arts_phylo::Phylogeny::new();
    /// phylo.add_branch("A", "B", 1.0)?;
    /// phylo.add_branch("A", "C", 1.0)?;
    /// assert_eq!(phylo.get_children(&"A")?, [&"B", &"C"]);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn get_children(&self, node: &N) -> Result<Vec<&N>, Report> {
        let node_index = self.get_node_index(node)?;
        self.get_children_index(node_index).iter().map(|i| self.get_node(i)).collect()
    }

    /// Returns the parent of a node index, [`None`] for the root.
    pub fn get_parent_index(&self, node_index: NodeIndex) -> Option<NodeIndex> {
        self.graph.neighbors_directed(node_index, Direction::Incoming).next()
    }

    /// Returns the branch (`B`) leading into a node index, [`None`] for the root.
    pub fn get_parent_branch(&self, node_index: NodeIndex) -> Option<&B> {
        let parent = self.get_parent_index(node_index)?;
        let edge = self.graph.find_edge(parent, node_index)?;
        self.graph.edge_weight(edge)
    }

    /// Returns the parents of a node (`N`).
    pub fn get_parents(&self, node: &N) -> Result<Vec<&N>, Report> {
        let node_index = self.get_node_index(node)?;
        self.graph
            .neighbors_directed(node_index, Direction::Incoming)
            .sorted()
            .map(|i| self.get_node(&i))
            .collect()
    }

    pub fn get_node(&self, node_index: &NodeIndex) -> Result<&N, Report> {
        self.graph
            .node_weight(*node_index)
            .ok_or_else(|| eyre!("Failed to get node data for node index {node_index:?}"))
    }

    /// Returns all nodes (`N`) in depth-first order from the root.
    pub fn get_nodes(&self) -> Result<Vec<&N>, Report> {
        let root_index = self.get_root_index()?;
        let mut dfs = Dfs::new(&self.graph, root_index);
        let mut nodes = Vec::new();
        while let Some(node_index) = dfs.next(&self.graph) {
            nodes.push(self.get_node(&node_index)?);
        }
        Ok(nodes)
    }

    pub fn get_node_index(&self, node: &N) -> Result<NodeIndex, Report> {
        self.graph
            .node_references()
            .filter_map(|(i, n)| (*n == *node).then_some(i))
            .next()
            .ok_or_else(|| eyre!("Failed to get node index of node {node}"))
    }

    /// Returns the leaf indices, left to right.
    pub fn get_leaf_indices(&self) -> Result<Vec<NodeIndex>, Report> {
        let mut leaves = Vec::new();
        let mut stack = vec![self.get_root_index()?];
        while let Some(node_index) = stack.pop() {
            let children = self.get_children_index(node_index);
            match children.is_empty() {
                true => leaves.push(node_index),
                false => stack.extend(children.into_iter().rev()),
            }
        }
        Ok(leaves)
    }

    pub fn get_root(&self) -> Result<&N, Report> {
        let root_index = self.get_root_index()?;
        self.get_node(&root_index)
    }

    pub fn get_root_index(&self) -> Result<NodeIndex, Report> {
        if self.is_empty() {
            Err(eyre!("Failed to locate root node index in phylogeny as graph is empty."))?
        }

        // get all nodes with no parents, could be root
        let root_indices: Vec<_> = self
            .graph
            .node_indices()
            .filter(|i| 0 == self.graph.edges_directed(*i, Direction::Incoming).count())
            .collect();

        match root_indices.len() {
            0 => Err(eyre!("Failed to locate root node index in phylogeny."))?,
            1 => Ok(root_indices[0]),
            _ => Err(eyre!("Failed to locate root node index in phylogeny, multiple roots found: {root_indices:?}"))?
        }
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

// ----------------------------------------------------------------------------
// Labelled Trees
// ----------------------------------------------------------------------------

impl Tree {
    /// Returns the leaf labels, left to right.
    ///
    /// ```rust
    /// let tree = arts_phylo::newick::parse("(B,(C,A));")?;
    /// assert_eq!(tree.leaf_labels()?, ["B", "C", "A"]);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn leaf_labels(&self) -> Result<Vec<&str>, Report> {
        self.get_leaf_indices()?
            .iter()
            .map(|i| self.get_node(i).map(|n| n.label.as_str()))
            .collect()
    }

    /// Returns a new tree restricted to the leaves for which `keep` returns `true`.
    ///
    /// Internal nodes left with a single child are collapsed, and their branch lengths are
    /// summed into the surviving child. Returns an error if no leaves are kept.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use arts_phylo::{newick, ToNewick};
    /// let tree = newick::parse("((A:1,B:2):3,(C:4,D:5):6);")?;
    /// let pruned = tree.prune(|label| label != "B")?;
    /// assert_eq!(pruned.to_newick()?, "(A:4,(C:4,D:5):6);");
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn prune<F>(&self, keep: F) -> Result<Tree, Report>
    where
        F: Fn(&str) -> bool,
    {
        let root_index = self.get_root_index()?;
        let mut pruned = Tree::new();
        match self.prune_subtree(root_index, &keep, &mut pruned)? {
            Some(_) => Ok(pruned),
            None => Err(eyre!("No leaves remain after pruning the tree.")),
        }
    }

    /// Copy the kept part of a subtree into `pruned`, return its new index and the branch above it.
    fn prune_subtree<F>(
        &self,
        node_index: NodeIndex,
        keep: &F,
        pruned: &mut Tree,
    ) -> Result<Option<(NodeIndex, Branch)>, Report>
    where
        F: Fn(&str) -> bool,
    {
        let node = self.get_node(&node_index)?;
        let branch = self.get_parent_branch(node_index).copied().unwrap_or_default();
        let children = self.get_children_index(node_index);

        if children.is_empty() {
            if !keep(&node.label) {
                return Ok(None);
            }
            let new_index = pruned.graph.add_node(Node::new(pruned.graph.node_count(), node.label.clone()));
            return Ok(Some((new_index, branch)));
        }

        let mut kept = Vec::new();
        for child in children {
            if let Some(result) = self.prune_subtree(child, keep, pruned)? {
                kept.push(result);
            }
        }

        match kept.len() {
            0 => Ok(None),
            // collapse unary nodes
            1 => {
                let (child, mut child_branch) = kept[0];
                child_branch.length += branch.length;
                Ok(Some((child, child_branch)))
            }
            _ => {
                let new_index = pruned.graph.add_node(Node::new(pruned.graph.node_count(), node.label.clone()));
                for (child, child_branch) in kept {
                    pruned.graph.add_edge(new_index, child, child_branch);
                }
                Ok(Some((new_index, branch)))
            }
        }
    }

    /// Rename leaves through a lookup table, leaves missing from `names` are left unchanged.
    ///
    /// ```rust
    /// use arts_phylo::{newick, ToNewick};
    /// let mut tree = newick::parse("(A,B);")?;
    /// tree.relabel_leaves(&[("A".to_string(), "S0".to_string())].into());
    /// assert_eq!(tree.to_newick()?, "(S0,B);");
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn relabel_leaves(&mut self, names: &HashMap<String, String>) {
        let leaves: HashSet<_> = self
            .graph
            .node_indices()
            .filter(|i| self.graph.neighbors_directed(*i, Direction::Outgoing).next().is_none())
            .collect();
        for node_index in leaves {
            if let Some(node) = self.graph.node_weight_mut(node_index) {
                if let Some(name) = names.get(&node.label) {
                    node.label = name.clone();
                }
            }
        }
    }

    /// Remove the labels (ex. support values) of every internal node.
    pub fn clear_internal_labels(&mut self) {
        let internal = self
            .graph
            .node_indices()
            .filter(|i| self.graph.neighbors_directed(*i, Direction::Outgoing).next().is_some())
            .collect_vec();
        for node_index in internal {
            if let Some(node) = self.graph.node_weight_mut(node_index) {
                node.label.clear();
            }
        }
    }

    /// Make the root bifurcating by grouping all but the first child under a new node.
    ///
    /// Unrooted tools write a trifurcating root (ex. `(A,B,C);`), reconciliation needs a binary one.
    ///
    /// ```rust
    /// use arts_phylo::{newick, ToNewick};
    /// let mut tree = newick::parse("(A,B,C);")?;
    /// tree.resolve_root()?;
    /// assert_eq!(tree.to_newick()?, "(A,(B,C));");
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn resolve_root(&mut self) -> Result<(), Report> {
        let root_index = self.get_root_index()?;
        let children = self.get_children_index(root_index);
        if children.len() <= 2 {
            return Ok(());
        }

        let new_index = self.graph.add_node(Node::new(self.graph.node_count(), String::new()));
        self.graph.add_edge(root_index, new_index, Branch::new());
        for child in children.into_iter().skip(1) {
            let edge = self
                .graph
                .find_edge(root_index, child)
                .ok_or_else(|| eyre!("Failed to find the branch between the root and {child:?}"))?;
            let branch = self.graph.remove_edge(edge).unwrap_or_default();
            self.graph.add_edge(new_index, child, branch);
        }

        Ok(())
    }

    fn write_newick(&self, node_index: NodeIndex, newick: &mut String) -> Result<(), Report> {
        let children = self.get_children_index(node_index);
        if !children.is_empty() {
            newick.push('(');
            for (i, child) in children.into_iter().enumerate() {
                if i > 0 {
                    newick.push(',');
                }
                self.write_newick(child, newick)?;
            }
            newick.push(')');
        }
        newick.push_str(&self.get_node(&node_index)?.label);
        if let Some(branch) = self.get_parent_branch(node_index) {
            if branch.length != 0.0 {
                newick.push_str(&format!(":{}", branch.length));
            }
        }
        Ok(())
    }
}

impl ToNewick for Tree {
    fn to_newick(&self) -> Result<String, Report> {
        let mut newick = String::new();
        self.write_newick(self.get_root_index()?, &mut newick)?;
        newick.push(';');
        Ok(newick)
    }
}
