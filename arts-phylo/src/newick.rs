//! Read [Newick](https://en.wikipedia.org/wiki/Newick_format) strings into a [`Tree`].

use crate::{Branch, FromNewick, Node, Phylogeny, Tree};
use color_eyre::eyre::{eyre, Report, Result};
use petgraph::graph::NodeIndex;

/// Characters that end an unquoted label or branch attribute.
const DELIMITERS: [char; 7] = ['(', ')', ',', ':', ';', '[', ']'];

/// Returns a [`Tree`] parsed from a Newick string.
///
/// - Every node, named or not, becomes its own vertex with a unique [`Node::id`].
/// - Children keep their left-to-right order.
/// - Quoted labels (`'A B'`) are read verbatim and bracketed comments (`[I12]`) are skipped.
///
/// ## Arguments
///
/// - `newick` - A Newick [`str`] (ex. `"(A,B);"`)
///
/// ## Examples
///
/// Unnamed internal nodes stay separate.
///
/// ```rust
/// use arts_phylo::newick;
/// let tree = newick::parse("((A,B),(C,D));")?;
/// assert_eq!(tree.graph.node_count(), 7);
/// assert_eq!(tree.leaf_labels()?, ["A", "B", "C", "D"]);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
///
/// Branch lengths, support values and placement comments.
///
/// ```rust
/// use arts_phylo::newick;
/// let tree = newick::parse("(A:0.1[I0],B:0.2[I1])0.95:0.0[I2];")?;
/// let root = tree.get_root()?;
/// assert_eq!(root.label, "0.95");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn parse(newick: &str) -> Result<Tree, Report> {
    let mut parser = Parser { chars: newick.chars().collect(), pos: 0 };
    let mut tree = Phylogeny::new();

    parser.skip_ignored();
    if parser.peek().is_none() {
        return Err(eyre!("Newick string is empty."));
    }
    parser.subtree(&mut tree)?;

    parser.skip_ignored();
    match parser.next() {
        Some(';') | None => (),
        Some(c) => Err(eyre!("Unexpected character {c:?} at position {} of newick.", parser.pos))?,
    }
    parser.skip_ignored();
    if let Some(c) = parser.peek() {
        Err(eyre!("Trailing content after ';' at position {} of newick: {c:?}", parser.pos))?
    }

    Ok(tree)
}

impl FromNewick for Tree {
    fn from_newick(newick: &str) -> Result<Tree, Report> {
        parse(newick)
    }
}

// ----------------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------------

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Skip whitespace and `[...]` comments.
    fn skip_ignored(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '[' {
                while let Some(c) = self.next() {
                    if c == ']' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Parse one subtree, add it to the tree and return its root index plus the branch above it.
    fn subtree(&mut self, tree: &mut Tree) -> Result<(NodeIndex, Branch), Report> {
        self.skip_ignored();
        let mut children = Vec::new();

        if self.peek() == Some('(') {
            self.pos += 1;
            loop {
                children.push(self.subtree(tree)?);
                self.skip_ignored();
                match self.next() {
                    Some(',') => continue,
                    Some(')') => break,
                    Some(c) => Err(eyre!("Unexpected character {c:?} at position {} of newick.", self.pos))?,
                    None => Err(eyre!("Unbalanced parentheses in newick."))?,
                }
            }
        }

        let label = self.label()?;
        let branch = self.branch()?;

        let node_index = tree.graph.add_node(Node::new(tree.graph.node_count(), label));
        for (child, branch) in children {
            tree.graph.add_edge(node_index, child, branch);
        }

        Ok((node_index, branch))
    }

    fn label(&mut self) -> Result<String, Report> {
        self.skip_ignored();
        let label = match self.peek() {
            Some(quote) if quote == '\'' || quote == '"' => {
                self.pos += 1;
                let mut label = String::new();
                loop {
                    match self.next() {
                        // doubled quotes are an escaped quote
                        Some(c) if c == quote && self.peek() == Some(quote) => {
                            self.pos += 1;
                            label.push(c);
                        }
                        Some(c) if c == quote => break,
                        Some(c) => label.push(c),
                        None => Err(eyre!("Unterminated quoted label in newick."))?,
                    }
                }
                label
            }
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(|c| !DELIMITERS.contains(&c)) {
                    self.pos += 1;
                }
                self.chars[start..self.pos].iter().collect::<String>().trim().to_string()
            }
        };
        self.skip_ignored();
        Ok(label)
    }

    fn branch(&mut self) -> Result<Branch, Report> {
        let start = self.pos;
        while self.peek() == Some(':') {
            self.pos += 1;
            while self.peek().is_some_and(|c| !DELIMITERS.contains(&c)) {
                self.pos += 1;
            }
        }
        let attributes: String = self.chars[start..self.pos].iter().collect();
        self.skip_ignored();
        Branch::from_newick(&attributes)
    }
}
