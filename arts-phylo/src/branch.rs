use crate::FromNewick;

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fmt::{Display, Formatter};

/// A [`Branch`] in the [`Phylogeny`](crate::Phylogeny).
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Branch {
    /// [`Branch`] length (ex. 1.0).
    pub length: f32,
    /// [`Branch`] confidence (ex. 90.0).
    pub confidence: f32,
}

#[rustfmt::skip]
impl AsPrimitive<f32> for Branch { fn as_(self) -> f32 { self.length } }
#[rustfmt::skip]
impl Default for Branch { fn default() -> Self { Self::new() } }
#[rustfmt::skip]
impl Display for Branch { fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.length) } }
#[rustfmt::skip]
impl Branch { pub fn new() -> Self { Branch { length: 0.0, confidence: 0.0 } } }

impl FromNewick for Branch {
    /// Returns a [`Branch`] created from the attributes that follow a node label (`:length[:confidence]`).
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use arts_phylo::{Branch, FromNewick};
    ///
    /// assert_eq!(Branch::from_newick("")?, Branch { length: 0.0, confidence: 0.0 });
    /// assert_eq!(Branch::from_newick(":2")?, Branch { length: 2.0, confidence: 0.0 });
    /// assert_eq!(Branch::from_newick(":2:0.75")?, Branch { length: 2.0, confidence: 75.0 });
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    fn from_newick(newick: &str) -> Result<Branch, Report> {
        let attributes: Vec<_> = newick.trim().split(':').map(str::trim).collect();
        let parse = |s: &str, what: &str| -> Result<f32, Report> {
            s.parse().wrap_err_with(|| eyre!("Failed to parse branch {what} from newick: {newick:?}"))
        };
        let length = match attributes.get(1) {
            Some(s) if !s.is_empty() => parse(s, "length")?,
            _ => 0.0,
        };
        let confidence = match attributes.get(2) {
            Some(s) if !s.is_empty() => {
                let confidence = parse(s, "confidence")?;
                // if confidence is a decimal, multiple by 100
                match confidence < 1.0 {
                    true => confidence * 100.0,
                    false => confidence,
                }
            }
            _ => 0.0,
        };

        Ok(Branch { length, confidence })
    }
}
