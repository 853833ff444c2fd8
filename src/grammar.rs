//! Weighted binary-normal-form grammar representation and the indexes CKY needs over it.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use log::debug;
use serde_json::Value;

use crate::error::{ParseError, Result};
use crate::symbol::{Symbol, SymbolTable};

pub const RARE: &str = "_RARE_";

/// One line of a grammar file, already tagged by its record kind.
#[derive(Clone, Debug, PartialEq)]
pub enum GrammarRecord {
    /// `["Q2", lhs, rhs1, rhs2, p]`
    Binary {
        lhs: String,
        rhs1: String,
        rhs2: String,
        prob: f64,
    },
    /// `["Q1", lhs, terminal, p]`
    Terminal {
        lhs: String,
        terminal: String,
        prob: f64,
    },
    /// `["WORDS", [w1, w2, ...]]`
    Words(Vec<String>),
}

impl GrammarRecord {
    /// Parses one JSON-lines record. Tolerates the canonical Q1/Q2/WORDS sort order but does not
    /// require it.
    pub fn parse(line: &str, line_no: usize) -> Result<GrammarRecord> {
        let bad = |reason: &str| ParseError::MalformedGrammar {
            reason: reason.to_owned(),
            line: line_no,
        };
        let value: Value = serde_json::from_str(line).map_err(|e| bad(&e.to_string()))?;
        let items = value.as_array().ok_or_else(|| bad("record is not an array"))?;
        let tag = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| bad("missing record tag"))?;
        match tag {
            "Q2" => {
                if items.len() != 5 {
                    return Err(bad("Q2 record must have 5 fields"));
                }
                let lhs = string_field(items, 1, &bad)?;
                let rhs1 = string_field(items, 2, &bad)?;
                let rhs2 = string_field(items, 3, &bad)?;
                let prob = number_field(items, 4, &bad)?;
                if prob <= 0.0 {
                    return Err(bad("probability must be strictly positive"));
                }
                Ok(GrammarRecord::Binary { lhs, rhs1, rhs2, prob })
            }
            "Q1" => {
                if items.len() != 4 {
                    return Err(bad("Q1 record must have 4 fields"));
                }
                let lhs = string_field(items, 1, &bad)?;
                let terminal = string_field(items, 2, &bad)?;
                let prob = number_field(items, 3, &bad)?;
                if prob <= 0.0 {
                    return Err(bad("probability must be strictly positive"));
                }
                Ok(GrammarRecord::Terminal { lhs, terminal, prob })
            }
            "WORDS" => {
                if items.len() != 2 {
                    return Err(bad("WORDS record must have 2 fields"));
                }
                let words = items[1]
                    .as_array()
                    .ok_or_else(|| bad("WORDS payload must be an array"))?
                    .iter()
                    .map(|w| w.as_str().map(str::to_owned))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| bad("WORDS entries must be strings"))?;
                Ok(GrammarRecord::Words(words))
            }
            other => Err(bad(&format!("unknown record tag {:?}", other))),
        }
    }

    /// Serialises back to the on-disk schema, used to write coarsened-grammar caches.
    pub fn to_json_line(&self) -> String {
        match self {
            GrammarRecord::Binary { lhs, rhs1, rhs2, prob } => {
                serde_json::to_string(&(("Q2"), lhs, rhs1, rhs2, prob)).unwrap()
            }
            GrammarRecord::Terminal { lhs, terminal, prob } => {
                serde_json::to_string(&(("Q1"), lhs, terminal, prob)).unwrap()
            }
            GrammarRecord::Words(words) => serde_json::to_string(&(("WORDS"), words)).unwrap(),
        }
    }
}

fn string_field(
    items: &[Value],
    idx: usize,
    bad: impl Fn(&str) -> ParseError,
) -> Result<String> {
    items
        .get(idx)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| bad("expected a string field"))
}

fn number_field(items: &[Value], idx: usize, bad: impl Fn(&str) -> ParseError) -> Result<f64> {
    items
        .get(idx)
        .and_then(Value::as_f64)
        .ok_or_else(|| bad("expected a numeric field"))
}

#[derive(Clone, Copy, Debug)]
pub struct BinaryRule {
    pub lhs: Symbol,
    pub rhs1: Symbol,
    pub rhs2: Symbol,
    pub logp: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct TerminalRule {
    pub lhs: Symbol,
    pub terminal: Symbol,
    pub logp: f64,
}

/// A loaded, immutable weighted grammar plus the indexes CKY and inside/outside need.
pub struct Grammar {
    symbols: SymbolTable,
    start: Symbol,
    binary_rules: Vec<BinaryRule>,
    terminal_rules: Vec<TerminalRule>,
    vocabulary: HashSet<String>,
    rare: Symbol,

    by_rhs_pair: HashMap<(Symbol, Symbol), Vec<usize>>,
    by_terminal: HashMap<Symbol, Vec<usize>>,
    first_to_seconds: HashMap<Symbol, Vec<Symbol>>,
    first_symbols: HashSet<Symbol>,
    lhs_to_binary: HashMap<Symbol, Vec<usize>>,
    rhs1_to_binary: HashMap<Symbol, Vec<usize>>,
    rhs2_to_binary: HashMap<Symbol, Vec<usize>>,
}

impl Grammar {
    pub fn load_file(path: &Path) -> Result<Grammar> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(GrammarRecord::parse(&line, idx + 1)?);
        }
        Grammar::from_records(records)
    }

    /// Builds a grammar from an in-memory record list, following the interning discipline: the
    /// start symbol first, then every symbol touched by a binary rule, then terminals and the
    /// `_RARE_` sentinel.
    ///
    /// The start symbol defaults to the LHS of the first binary rule — the right convention for
    /// a grammar loaded straight from a file, where record order is the file's literal line
    /// order. A coarsened grammar must instead pass the projected start name explicitly via
    /// [`Grammar::from_records_with_start`], since the coarsener's own record order is not
    /// meaningful (rules are grouped through a hash map keyed by projected LHS).
    pub fn from_records(records: Vec<GrammarRecord>) -> Result<Grammar> {
        Grammar::from_records_with_start(records, None)
    }

    pub fn from_records_with_start(
        records: Vec<GrammarRecord>,
        start_name: Option<&str>,
    ) -> Result<Grammar> {
        let mut symbols = SymbolTable::new();
        let mut start = start_name.map(|name| symbols.intern(name));

        let binaries: Vec<&GrammarRecord> = records
            .iter()
            .filter(|r| matches!(r, GrammarRecord::Binary { .. }))
            .collect();
        let terminals: Vec<&GrammarRecord> = records
            .iter()
            .filter(|r| matches!(r, GrammarRecord::Terminal { .. }))
            .collect();
        let mut vocabulary = HashSet::new();
        for record in &records {
            if let GrammarRecord::Words(words) = record {
                vocabulary.extend(words.iter().cloned());
            }
        }

        let mut binary_rules = Vec::with_capacity(binaries.len());
        for record in &binaries {
            if let GrammarRecord::Binary { lhs, rhs1, rhs2, prob } = record {
                if start.is_none() {
                    start = Some(symbols.intern(lhs));
                }
                let lhs = symbols.intern(lhs);
                let rhs1 = symbols.intern(rhs1);
                let rhs2 = symbols.intern(rhs2);
                binary_rules.push(BinaryRule {
                    lhs,
                    rhs1,
                    rhs2,
                    logp: prob.ln(),
                });
            }
        }

        let mut terminal_rules = Vec::with_capacity(terminals.len());
        for record in &terminals {
            if let GrammarRecord::Terminal { lhs, terminal, prob } = record {
                let lhs = symbols.intern(lhs);
                let terminal = symbols.intern(terminal);
                terminal_rules.push(TerminalRule {
                    lhs,
                    terminal,
                    logp: prob.ln(),
                });
            }
        }

        let start = start.ok_or_else(|| ParseError::MalformedGrammar {
            reason: "grammar has no binary rules; cannot determine a start symbol".to_owned(),
            line: 0,
        })?;
        let rare = symbols.intern(RARE);

        let mut by_rhs_pair: HashMap<(Symbol, Symbol), Vec<usize>> = HashMap::new();
        let mut first_to_seconds: HashMap<Symbol, Vec<Symbol>> = HashMap::new();
        let mut first_symbols = HashSet::new();
        let mut lhs_to_binary: HashMap<Symbol, Vec<usize>> = HashMap::new();
        let mut rhs1_to_binary: HashMap<Symbol, Vec<usize>> = HashMap::new();
        let mut rhs2_to_binary: HashMap<Symbol, Vec<usize>> = HashMap::new();

        for (idx, rule) in binary_rules.iter().enumerate() {
            by_rhs_pair.entry((rule.rhs1, rule.rhs2)).or_default().push(idx);
            lhs_to_binary.entry(rule.lhs).or_default().push(idx);
            rhs1_to_binary.entry(rule.rhs1).or_default().push(idx);
            rhs2_to_binary.entry(rule.rhs2).or_default().push(idx);
            first_symbols.insert(rule.rhs1);
            let seconds = first_to_seconds.entry(rule.rhs1).or_default();
            if !seconds.contains(&rule.rhs2) {
                seconds.push(rule.rhs2);
            }
        }

        let mut by_terminal: HashMap<Symbol, Vec<usize>> = HashMap::new();
        for (idx, rule) in terminal_rules.iter().enumerate() {
            by_terminal.entry(rule.terminal).or_default().push(idx);
        }

        debug!(
            "loaded grammar: {} symbols, {} binary rules, {} terminal rules",
            symbols.len(),
            binary_rules.len(),
            terminal_rules.len()
        );

        Ok(Grammar {
            symbols,
            start,
            binary_rules,
            terminal_rules,
            vocabulary,
            rare,
            by_rhs_pair,
            by_terminal,
            first_to_seconds,
            first_symbols,
            lhs_to_binary,
            rhs1_to_binary,
            rhs2_to_binary,
        })
    }

    pub fn start(&self) -> Symbol {
        self.start
    }

    pub fn rare(&self) -> Symbol {
        self.rare
    }

    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name)
    }

    pub fn name(&self, sym: Symbol) -> &str {
        self.symbols.name(sym)
    }

    /// Returns `word` if it's in the vocabulary, else the `_RARE_` sentinel string.
    pub fn normalize<'a>(&self, word: &'a str) -> &'a str {
        if self.vocabulary.contains(word) {
            word
        } else {
            RARE
        }
    }

    pub fn terminal_rules_for(&self, terminal: Symbol) -> &[usize] {
        self.by_terminal.get(&terminal).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn terminal_rule(&self, idx: usize) -> &TerminalRule {
        &self.terminal_rules[idx]
    }

    pub fn first_symbols(&self) -> &HashSet<Symbol> {
        &self.first_symbols
    }

    pub fn seconds_for(&self, rhs1: Symbol) -> &[Symbol] {
        self.first_to_seconds.get(&rhs1).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn binary_rules_for_pair(&self, rhs1: Symbol, rhs2: Symbol) -> &[usize] {
        self.by_rhs_pair
            .get(&(rhs1, rhs2))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn binary_rule(&self, idx: usize) -> &BinaryRule {
        &self.binary_rules[idx]
    }

    pub fn binary_rules(&self) -> &[BinaryRule] {
        &self.binary_rules
    }

    pub fn terminal_rules(&self) -> &[TerminalRule] {
        &self.terminal_rules
    }

    pub fn rules_with_lhs(&self, lhs: Symbol) -> &[usize] {
        self.lhs_to_binary.get(&lhs).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rules_with_rhs1(&self, rhs1: Symbol) -> &[usize] {
        self.rhs1_to_binary.get(&rhs1).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rules_with_rhs2(&self, rhs2: Symbol) -> &[usize] {
        self.rhs2_to_binary.get(&rhs2).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn vocabulary(&self) -> &HashSet<String> {
        &self.vocabulary
    }

    /// All records in the canonical Q1/Q2/WORDS order, for caching back to disk.
    pub fn to_records(&self) -> Vec<GrammarRecord> {
        let mut out = Vec::with_capacity(self.terminal_rules.len() + self.binary_rules.len() + 1);
        for rule in &self.terminal_rules {
            out.push(GrammarRecord::Terminal {
                lhs: self.name(rule.lhs).to_owned(),
                terminal: self.name(rule.terminal).to_owned(),
                prob: rule.logp.exp(),
            });
        }
        for rule in &self.binary_rules {
            out.push(GrammarRecord::Binary {
                lhs: self.name(rule.lhs).to_owned(),
                rhs1: self.name(rule.rhs1).to_owned(),
                rhs2: self.name(rule.rhs2).to_owned(),
                prob: rule.logp.exp(),
            });
        }
        out.push(GrammarRecord::Words(
            self.vocabulary.iter().cloned().collect(),
        ));
        out
    }

    /// Checks that every LHS's rule probabilities sum to 1 within `eps`. Exposed for tests; not
    /// enforced at load time since callers may legitimately load an as-yet-ungrouped fragment.
    pub fn is_normalized(&self, eps: f64) -> bool {
        let mut mass: HashMap<Symbol, f64> = HashMap::new();
        for rule in &self.binary_rules {
            *mass.entry(rule.lhs).or_insert(0.0) += rule.logp.exp();
        }
        for rule in &self.terminal_rules {
            *mass.entry(rule.lhs).or_insert(0.0) += rule.logp.exp();
        }
        mass.values().all(|p| (p - 1.0).abs() < eps)
    }
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("symbols", &self.symbols.len())
            .field("binary_rules", &self.binary_rules.len())
            .field("terminal_rules", &self.terminal_rules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_records() -> Vec<GrammarRecord> {
        vec![
            GrammarRecord::Binary { lhs: "S".into(), rhs1: "NP".into(), rhs2: "VP".into(), prob: 1.0 },
            GrammarRecord::Binary { lhs: "VP".into(), rhs1: "V".into(), rhs2: "NP".into(), prob: 1.0 },
            GrammarRecord::Binary { lhs: "NP".into(), rhs1: "Det".into(), rhs2: "N".into(), prob: 0.5 },
            GrammarRecord::Terminal { lhs: "NP".into(), terminal: "Peter".into(), prob: 0.5 },
            GrammarRecord::Terminal { lhs: "V".into(), terminal: "sees".into(), prob: 1.0 },
            GrammarRecord::Terminal { lhs: "Det".into(), terminal: "a".into(), prob: 1.0 },
            GrammarRecord::Terminal { lhs: "N".into(), terminal: "squirrel".into(), prob: 1.0 },
            GrammarRecord::Words(vec!["Peter".into(), "a".into(), "sees".into(), "squirrel".into()]),
        ]
    }

    #[test]
    fn start_symbol_is_first_binary_lhs() {
        let grammar = Grammar::from_records(toy_records()).unwrap();
        assert_eq!(grammar.name(grammar.start()), "S");
    }

    #[test]
    fn grammar_is_normalized() {
        let grammar = Grammar::from_records(toy_records()).unwrap();
        assert!(grammar.is_normalized(1e-9));
    }

    #[test]
    fn rejects_non_positive_probability() {
        let line = r#"["Q1", "N", "squirrel", 0.0]"#;
        let err = GrammarRecord::parse(line, 1).unwrap_err();
        assert!(matches!(err, ParseError::MalformedGrammar { .. }));
    }

    #[test]
    fn normalize_falls_back_to_rare() {
        let grammar = Grammar::from_records(toy_records()).unwrap();
        assert_eq!(grammar.normalize("Peter"), "Peter");
        assert_eq!(grammar.normalize("dodecahedron"), RARE);
    }
}
