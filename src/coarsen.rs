//! Grammar coarsening: projects a fine grammar onto a coarser symbol alphabet.
//!
//! Two distinct fine rules can project onto the same coarse rule. Their probabilities are always
//! summed before the per-LHS renormalisation below; overwriting the accumulated mass (as the
//! reference implementation this crate's algorithm is grounded on does) silently discards
//! probability mass and is not reproduced here.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::grammar::{Grammar, GrammarRecord};
use crate::mapping::project_symbol;

#[derive(Hash, PartialEq, Eq, Clone)]
enum ProjectedRhs {
    Binary(String, String),
    Terminal(String),
}

/// Projects `grammar` through `fine_to_coarse`, returning records in the on-disk schema.
pub fn coarsen(grammar: &Grammar, fine_to_coarse: &HashMap<String, String>) -> Vec<GrammarRecord> {
    let project = |name: &str| project_symbol(name, fine_to_coarse);

    // A `BTreeMap` keyed by projected LHS keeps the emitted record order deterministic; the
    // coarsener's grouping-by-projection otherwise has no notion of "first rule" to preserve.
    let mut mass: BTreeMap<String, HashMap<ProjectedRhs, f64>> = BTreeMap::new();

    for rule in grammar.binary_rules() {
        let lhs = project(grammar.name(rule.lhs));
        let rhs1 = project(grammar.name(rule.rhs1));
        let rhs2 = project(grammar.name(rule.rhs2));
        let p = rule.logp.exp();
        *mass
            .entry(lhs)
            .or_default()
            .entry(ProjectedRhs::Binary(rhs1, rhs2))
            .or_insert(0.0) += p;
    }
    for rule in grammar.terminal_rules() {
        let lhs = project(grammar.name(rule.lhs));
        let terminal = grammar.name(rule.terminal).to_owned();
        let p = rule.logp.exp();
        *mass
            .entry(lhs)
            .or_default()
            .entry(ProjectedRhs::Terminal(terminal))
            .or_insert(0.0) += p;
    }

    let mut records = Vec::new();
    let mut terminal_records = Vec::new();
    let mut binary_records = Vec::new();

    for (lhs, rhs_mass) in &mass {
        let total: f64 = rhs_mass.values().sum();
        for (rhs, p) in rhs_mass {
            let normalized = p / total;
            match rhs {
                ProjectedRhs::Terminal(terminal) => terminal_records.push(GrammarRecord::Terminal {
                    lhs: lhs.clone(),
                    terminal: terminal.clone(),
                    prob: normalized,
                }),
                ProjectedRhs::Binary(rhs1, rhs2) => binary_records.push(GrammarRecord::Binary {
                    lhs: lhs.clone(),
                    rhs1: rhs1.clone(),
                    rhs2: rhs2.clone(),
                    prob: normalized,
                }),
            }
        }
    }

    debug!(
        "coarsened grammar: {} lhs groups, {} terminal rules, {} binary rules",
        mass.len(),
        terminal_records.len(),
        binary_records.len()
    );

    let mut words: Vec<String> = terminal_records
        .iter()
        .filter_map(|r| match r {
            GrammarRecord::Terminal { terminal, .. } => Some(terminal.clone()),
            _ => None,
        })
        .collect();
    words.sort();
    words.dedup();

    records.extend(terminal_records);
    records.extend(binary_records);
    records.push(GrammarRecord::Words(words));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

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
    fn projected_lhs_set_matches_scenario_c() {
        let grammar = toy_grammar();
        let mut map = HashMap::new();
        map.insert("S".to_owned(), "S_".to_owned());
        map.insert("VP".to_owned(), "S_".to_owned());
        map.insert("NP".to_owned(), "N_".to_owned());

        let records = coarsen(&grammar, &map);
        let projected = Grammar::from_records(records).unwrap();

        let mut lhs_names: Vec<&str> = projected
            .binary_rules()
            .iter()
            .map(|r| projected.name(r.lhs))
            .chain(projected.terminal_rules().iter().map(|r| projected.name(r.lhs)))
            .collect();
        lhs_names.sort();
        lhs_names.dedup();
        assert_eq!(lhs_names, vec!["Det", "N", "N_", "S_", "V"]);
        assert!(projected.is_normalized(1e-9));
    }

    #[test]
    fn sums_distinct_fine_rules_projecting_to_same_coarse_rule() {
        // Two distinct fine LHS symbols, each with a rule that projects to the same coarse
        // (lhs, rhs) pair, must have their probability mass added, not overwritten.
        let grammar = Grammar::from_records(vec![
            GrammarRecord::Binary { lhs: "A".into(), rhs1: "X".into(), rhs2: "Y".into(), prob: 0.4 },
            GrammarRecord::Binary { lhs: "A".into(), rhs1: "Y".into(), rhs2: "X".into(), prob: 0.6 },
            GrammarRecord::Binary { lhs: "B".into(), rhs1: "X".into(), rhs2: "Y".into(), prob: 1.0 },
            GrammarRecord::Terminal { lhs: "X".into(), terminal: "x".into(), prob: 1.0 },
            GrammarRecord::Terminal { lhs: "Y".into(), terminal: "y".into(), prob: 1.0 },
            GrammarRecord::Words(vec!["x".into(), "y".into()]),
        ])
        .unwrap();

        let mut map = HashMap::new();
        map.insert("A".to_owned(), "C".to_owned());
        map.insert("B".to_owned(), "C".to_owned());

        let records = coarsen(&grammar, &map);
        let projected = Grammar::from_records(records).unwrap();
        let c = projected.symbol("C").unwrap();
        let xy_rules: Vec<_> = projected
            .binary_rules()
            .iter()
            .filter(|r| r.lhs == c)
            .collect();
        // (X,Y) from A (0.4) and B (1.0) sum to 1.4; (Y,X) from A is 0.6. Total mass 2.0.
        let total: f64 = xy_rules.iter().map(|r| r.logp.exp()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        let xy_rule = xy_rules
            .iter()
            .find(|r| projected.name(r.rhs1) == "X" && projected.name(r.rhs2) == "Y")
            .unwrap();
        assert!((xy_rule.logp.exp() - (1.4 / 2.0)).abs() < 1e-9);
    }

    #[test]
    fn words_record_tracks_surviving_terminal_rules_not_input_vocabulary() {
        // The grammar's own vocabulary carries a word with no Q1 rule behind it; the coarsened
        // WORDS list must not inherit that stale entry, only the terminals actually emitted.
        let grammar = Grammar::from_records(vec![
            GrammarRecord::Binary { lhs: "S".into(), rhs1: "A".into(), rhs2: "A".into(), prob: 1.0 },
            GrammarRecord::Terminal { lhs: "A".into(), terminal: "x".into(), prob: 1.0 },
            GrammarRecord::Words(vec!["x".into(), "never_ruled".into()]),
        ])
        .unwrap();

        let map = HashMap::new();
        let records = coarsen(&grammar, &map);
        let words = records
            .iter()
            .find_map(|r| match r {
                GrammarRecord::Words(w) => Some(w.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(words, vec!["x".to_owned()]);
    }
}
