//! Coarse-to-fine symbol mapping, loaded from a nested YAML partition.
//!
//! A mapping file nests coarse categories inside coarser ones. The outermost keys are the root
//! (coarsest) category or categories; each value is either a list of fine leaf symbols or a
//! further nested mapping. Depth of nesting equals the number of coarsening steps.
//!
//! `fine_to_coarse(d)` holds, for nesting depth `d` (0 = just below the root), the map from each
//! symbol appearing at depth `d+1` to its immediate parent at depth `d`. Projecting the original
//! (finest) grammar with `fine_to_coarse(num_levels() - 1)` yields the grammar one coarsening step
//! up; repeating with decreasing depth down to `fine_to_coarse(0)` reaches the grammar built over
//! the root categories alone.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::{ParseError, Result};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MappingSpec {
    Leaf(Vec<String>),
    Node(BTreeMap<String, MappingSpec>),
}

pub struct CtfMapping {
    /// `fine_to_coarse[d][fine] = coarse`, for d in `0..num_levels()`.
    fine_to_coarse: Vec<HashMap<String, String>>,
    /// `coarse_to_fine[d][coarse] = [fine, ...]`, for d in `0..num_levels()`.
    coarse_to_fine: Vec<HashMap<String, Vec<String>>>,
}

impl CtfMapping {
    pub fn load_file(path: &Path) -> Result<CtfMapping> {
        let text = std::fs::read_to_string(path)?;
        let spec: MappingSpec = serde_yaml::from_str(&text).map_err(|e| ParseError::MalformedMapping {
            reason: e.to_string(),
        })?;
        CtfMapping::from_spec(&spec)
    }

    pub fn from_spec(spec: &MappingSpec) -> Result<CtfMapping> {
        let root = match spec {
            MappingSpec::Node(map) => map,
            MappingSpec::Leaf(_) => {
                return Err(ParseError::MalformedMapping {
                    reason: "top-level mapping must be a nested object, not a list".to_owned(),
                })
            }
        };
        let mut fine_to_coarse = Vec::new();
        let mut coarse_to_fine = Vec::new();
        add_level(root, 0, &mut fine_to_coarse, &mut coarse_to_fine);
        if fine_to_coarse.is_empty() {
            return Err(ParseError::MalformedMapping {
                reason: "mapping has no levels".to_owned(),
            });
        }
        Ok(CtfMapping { fine_to_coarse, coarse_to_fine })
    }

    /// Number of coarsening steps encoded by this mapping (one per nesting depth).
    pub fn num_levels(&self) -> usize {
        self.fine_to_coarse.len()
    }

    pub fn fine_to_coarse(&self, depth: usize) -> &HashMap<String, String> {
        &self.fine_to_coarse[depth]
    }

    pub fn coarse_to_fine(&self, depth: usize) -> &HashMap<String, Vec<String>> {
        &self.coarse_to_fine[depth]
    }
}

fn add_level(
    node: &BTreeMap<String, MappingSpec>,
    depth: usize,
    fine_to_coarse: &mut Vec<HashMap<String, String>>,
    coarse_to_fine: &mut Vec<HashMap<String, Vec<String>>>,
) {
    if fine_to_coarse.len() <= depth {
        fine_to_coarse.resize_with(depth + 1, HashMap::new);
        coarse_to_fine.resize_with(depth + 1, HashMap::new);
    }
    for (parent, child) in node {
        match child {
            MappingSpec::Leaf(fine_symbols) => {
                for fine in fine_symbols {
                    fine_to_coarse[depth].insert(fine.clone(), parent.clone());
                }
                coarse_to_fine[depth]
                    .entry(parent.clone())
                    .or_default()
                    .extend(fine_symbols.iter().cloned());
            }
            MappingSpec::Node(inner) => {
                for fine in inner.keys() {
                    fine_to_coarse[depth].insert(fine.clone(), parent.clone());
                }
                coarse_to_fine[depth]
                    .entry(parent.clone())
                    .or_default()
                    .extend(inner.keys().cloned());
                add_level(inner, depth + 1, fine_to_coarse, coarse_to_fine);
            }
        }
    }
}

/// Projects a symbol name that may contain the `‡` (unary-chain) and `†` (n-ary binarisation)
/// composite separators, replacing each atomic component via `map`, leaving the structure intact.
pub fn project_symbol(name: &str, map: &HashMap<String, String>) -> String {
    name.split('‡')
        .map(|part| {
            part.split('†')
                .map(|atom| map.get(atom).cloned().unwrap_or_else(|| atom.to_owned()))
                .collect::<Vec<_>>()
                .join("†")
        })
        .collect::<Vec<_>>()
        .join("‡")
}
