//! The nested-list parse tree output format.

use serde::Serialize;

/// A derivation tree. Serialises (via serde, untagged) to the nested-JSON-array format: interior
/// nodes as `[symbol, left, right]`, leaves as `[preterminal, surface_token]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Tree {
    Leaf(String, String),
    Node(String, Box<Tree>, Box<Tree>),
}

impl Tree {
    pub fn leaf(symbol: impl Into<String>, word: impl Into<String>) -> Tree {
        Tree::Leaf(strip_annotation(&symbol.into()), word.into())
    }

    pub fn node(symbol: impl Into<String>, left: Tree, right: Tree) -> Tree {
        Tree::Node(strip_annotation(&symbol.into()), Box::new(left), Box::new(right))
    }

    /// Concatenates the leaves' surface tokens, left to right.
    pub fn yield_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        self.collect_yield(&mut tokens);
        tokens
    }

    fn collect_yield(&self, out: &mut Vec<String>) {
        match self {
            Tree::Leaf(_, word) => out.push(word.clone()),
            Tree::Node(_, left, right) => {
                left.collect_yield(out);
                right.collect_yield(out);
            }
        }
    }
}

/// Strips any `|`-suffixed parent annotation a binarisation pass may have left on a symbol name;
/// only the part before the first `|` is shown in tree output.
fn strip_annotation(symbol: &str) -> String {
    symbol.split('|').next().unwrap_or(symbol).to_owned()
}
