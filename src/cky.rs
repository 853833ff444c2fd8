//! Probabilistic CKY: chart fill plus Viterbi backtrace, with a pluggable admission predicate.

use std::time::Instant;

use log::{debug, trace};

use crate::chart::{Backpointer, Chart, ChartItem, Origin};
use crate::error::{ParseError, Result};
use crate::grammar::Grammar;
use crate::symbol::Symbol;
use crate::tree::Tree;

/// Gates whether a candidate chart entry `(symbol, start, end)` is allowed in. Consulted only for
/// binary combinations (§4.3): diagonal terminal seeding is never pruned.
pub trait AdmissionPolicy {
    fn admit(&self, symbol: Symbol, start: usize, end: usize) -> bool;
}

pub struct AlwaysAdmit;

impl AdmissionPolicy for AlwaysAdmit {
    fn admit(&self, _symbol: Symbol, _start: usize, _end: usize) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub length: usize,
    pub seconds: f64,
    pub items_entered: usize,
    pub items_pruned: usize,
}

/// Runs probabilistic CKY over `tokens` against `grammar`, gated by `policy`.
pub fn parse(grammar: &Grammar, tokens: &[String], policy: &dyn AdmissionPolicy) -> (Chart, Stats) {
    let start_time = Instant::now();
    let n = tokens.len();
    let mut chart = Chart::new(n);
    let mut stats = Stats {
        length: n,
        ..Stats::default()
    };

    for (i, token) in tokens.iter().enumerate() {
        let normalized = grammar.normalize(token);
        let Some(terminal_symbol) = grammar.symbol(normalized) else {
            continue;
        };
        for &rule_idx in grammar.terminal_rules_for(terminal_symbol) {
            let rule = grammar.terminal_rule(rule_idx);
            let item = ChartItem {
                symbol: rule.lhs,
                score: rule.logp,
                origin: Origin::Terminal(i),
            };
            if chart.try_insert(i, i, item) {
                stats.items_entered += 1;
            }
        }
    }

    for end in 0..n {
        for start in (0..end).rev() {
            for split in start..end {
                combine(grammar, &mut chart, policy, start, split, end, &mut stats);
            }
        }
    }

    stats.seconds = start_time.elapsed().as_secs_f64();
    debug!(
        "cky: length={} entered={} pruned={} seconds={:.6}",
        stats.length, stats.items_entered, stats.items_pruned, stats.seconds
    );
    (chart, stats)
}

fn combine(
    grammar: &Grammar,
    chart: &mut Chart,
    policy: &dyn AdmissionPolicy,
    start: usize,
    split: usize,
    end: usize,
    stats: &mut Stats,
) {
    let left_symbols: Vec<Symbol> = chart.cell(start, split).keys().copied().collect();
    for rhs1 in left_symbols {
        if !grammar.first_symbols().contains(&rhs1) {
            continue;
        }
        let left_item = chart.get(start, split, rhs1).unwrap().clone();
        for &rhs2 in grammar.seconds_for(rhs1) {
            let Some(right_item) = chart.get(split + 1, end, rhs2) else {
                continue;
            };
            let right_item = right_item.clone();
            let rule_indices = grammar.binary_rules_for_pair(rhs1, rhs2);
            trace!("combine ({},{},{}) via {:?}/{:?}: {} rule(s)", start, split, end, rhs1, rhs2, rule_indices.len());
            for &rule_idx in rule_indices {
                let rule = grammar.binary_rule(rule_idx);
                let score = left_item.score + right_item.score + rule.logp;
                if !policy.admit(rule.lhs, start, end) {
                    stats.items_pruned += 1;
                    continue;
                }
                let item = ChartItem {
                    symbol: rule.lhs,
                    score,
                    origin: Origin::Binary(
                        Backpointer { start, end: split, symbol: rhs1 },
                        Backpointer { start: split + 1, end, symbol: rhs2 },
                    ),
                };
                if chart.try_insert(start, end, item) {
                    stats.items_entered += 1;
                }
            }
        }
    }
}

/// Reconstructs the Viterbi-best tree rooted at the grammar's start symbol over the whole span.
pub fn backtrace(grammar: &Grammar, chart: &Chart, tokens: &[String]) -> Result<Tree> {
    if chart.len() == 0 {
        return Err(ParseError::NoParseFound);
    }
    let root = chart
        .get(0, chart.len() - 1, grammar.start())
        .ok_or(ParseError::NoParseFound)?;
    Ok(build_tree(grammar, chart, tokens, root))
}

fn build_tree(grammar: &Grammar, chart: &Chart, tokens: &[String], item: &ChartItem) -> Tree {
    match &item.origin {
        Origin::Terminal(pos) => Tree::leaf(grammar.name(item.symbol), tokens[*pos].clone()),
        Origin::Binary(left_bp, right_bp) => {
            let left_item = chart.get(left_bp.start, left_bp.end, left_bp.symbol).expect("backpointer resolves");
            let right_item = chart.get(right_bp.start, right_bp.end, right_bp.symbol).expect("backpointer resolves");
            Tree::node(
                grammar.name(item.symbol),
                build_tree(grammar, chart, tokens, left_item),
                build_tree(grammar, chart, tokens, right_item),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, GrammarRecord};

    fn toy_grammar() -> Grammar {
        Grammar::from_records(vec![
            GrammarRecord::Binary { lhs: "S".into(), rhs1: "NP".into(), rhs2: "VP".into(), prob: 1.0 },
            GrammarRecord::Binary { lhs: "VP".into(), rhs1: "V".into(), rhs2: "NP".into(), prob: 1.0 },
            GrammarRecord::Binary { lhs: "NP".into(), rhs1: "Det".into(), rhs2: "N".into(), prob: 0.5 },
            GrammarRecord::Terminal { lhs: "NP".into(), terminal: "Peter".into(), prob: 0.5 },
            GrammarRecord::Terminal { lhs: "V".into(), terminal: "sees".into(), prob: 1.0 },
            GrammarRecord::Terminal { lhs: "Det".into(), terminal: "a".into(), prob: 1.0 },
            GrammarRecord::Terminal { lhs: "N".into(), terminal: "squirrel".into(), prob: 1.0 },
            GrammarRecord::Words(vec!["Peter".into(), "a".into(), "sees".into(), "squirrel".into()]),
        ])
        .unwrap()
    }

    #[test]
    fn scenario_a_toy_grammar_acceptance() {
        let grammar = toy_grammar();
        let tokens: Vec<String> = ["Peter", "sees", "a", "squirrel"].iter().map(|s| s.to_string()).collect();
        let (chart, stats) = parse(&grammar, &tokens, &AlwaysAdmit);
        assert!(stats.items_entered > 0);
        let tree = backtrace(&grammar, &chart, &tokens).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(
            json,
            r#"["S",["NP","Peter"],["VP",["V","sees"],["NP",["Det","a"],["N","squirrel"]]]]"#
        );
    }

    #[test]
    fn scenario_e_no_parse() {
        let grammar = toy_grammar();
        let tokens: Vec<String> = ["the", "the", "the", "the"].iter().map(|s| s.to_string()).collect();
        let (chart, _stats) = parse(&grammar, &tokens, &AlwaysAdmit);
        let result = backtrace(&grammar, &chart, &tokens);
        assert!(matches!(result, Err(ParseError::NoParseFound)));
    }

    struct DenyAll;
    impl AdmissionPolicy for DenyAll {
        fn admit(&self, _symbol: Symbol, _start: usize, _end: usize) -> bool {
            false
        }
    }

    #[test]
    fn deny_all_policy_prunes_every_binary_combination() {
        let grammar = toy_grammar();
        let tokens: Vec<String> = ["Peter", "sees", "a", "squirrel"].iter().map(|s| s.to_string()).collect();
        let (chart, stats) = parse(&grammar, &tokens, &DenyAll);
        assert!(stats.items_pruned > 0);
        assert!(!chart.has_parse(grammar.start()));
    }
}
