//! Inside/outside marginals over a completed (possibly pruned) CKY chart.
//!
//! Both recursions are gated on chart membership: a `(symbol, span)` absent from the chart
//! contributes nothing, whether it's absent because the grammar truly can't derive it there or
//! because an earlier coarse-to-fine level pruned it away. This keeps marginals consistent with
//! whatever chart they're actually computed over, at every level of the coarse-to-fine chain, not
//! just the unpruned level 0 chart.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::chart::Chart;
use crate::grammar::Grammar;
use crate::symbol::Symbol;

pub struct InsideOutside<'a> {
    grammar: &'a Grammar,
    chart: &'a Chart,
    inside_memo: RefCell<HashMap<(Symbol, usize, usize), f64>>,
    outside_memo: RefCell<HashMap<(Symbol, usize, usize), f64>>,
}

impl<'a> InsideOutside<'a> {
    pub fn new(grammar: &'a Grammar, chart: &'a Chart) -> InsideOutside<'a> {
        InsideOutside {
            grammar,
            chart,
            inside_memo: RefCell::new(HashMap::new()),
            outside_memo: RefCell::new(HashMap::new()),
        }
    }

    /// The total probability mass of all chart-present derivations of the start symbol over the
    /// whole sentence; zero means no-parse.
    pub fn total(&self) -> f64 {
        if self.chart.len() == 0 {
            return 0.0;
        }
        self.inside(self.grammar.start(), 0, self.chart.len() - 1)
    }

    pub fn inside(&self, symbol: Symbol, start: usize, end: usize) -> f64 {
        if self.chart.get(start, end, symbol).is_none() {
            return 0.0;
        }
        if let Some(&cached) = self.inside_memo.borrow().get(&(symbol, start, end)) {
            return cached;
        }
        let value = if start == end {
            self.chart.get(start, end, symbol).unwrap().score.exp()
        } else {
            let mut sum = 0.0;
            for &rule_idx in self.grammar.rules_with_lhs(symbol) {
                let rule = self.grammar.binary_rule(rule_idx);
                for split in start..end {
                    if self.chart.get(start, split, rule.rhs1).is_none() {
                        continue;
                    }
                    if self.chart.get(split + 1, end, rule.rhs2).is_none() {
                        continue;
                    }
                    sum += rule.logp.exp()
                        * self.inside(rule.rhs1, start, split)
                        * self.inside(rule.rhs2, split + 1, end);
                }
            }
            sum
        };
        self.inside_memo.borrow_mut().insert((symbol, start, end), value);
        value
    }

    pub fn outside(&self, symbol: Symbol, start: usize, end: usize) -> f64 {
        let last = self.chart.len().saturating_sub(1);
        if start == 0 && end == last {
            return if symbol == self.grammar.start() { 1.0 } else { 0.0 };
        }
        if self.chart.get(start, end, symbol).is_none() {
            return 0.0;
        }
        if let Some(&cached) = self.outside_memo.borrow().get(&(symbol, start, end)) {
            return cached;
        }
        let mut sum = 0.0;
        // `symbol` as the left child of a parent spanning (start, e), e > end.
        for &rule_idx in self.grammar.rules_with_rhs1(symbol) {
            let rule = self.grammar.binary_rule(rule_idx);
            for e in (end + 1)..=last {
                if self.chart.get(start, e, rule.lhs).is_none() {
                    continue;
                }
                if self.chart.get(end + 1, e, rule.rhs2).is_none() {
                    continue;
                }
                sum += rule.logp.exp()
                    * self.outside(rule.lhs, start, e)
                    * self.inside(rule.rhs2, end + 1, e);
            }
        }
        // `symbol` as the right child of a parent spanning (e, end), e < start.
        for &rule_idx in self.grammar.rules_with_rhs2(symbol) {
            let rule = self.grammar.binary_rule(rule_idx);
            for e in 0..start {
                if self.chart.get(e, end, rule.lhs).is_none() {
                    continue;
                }
                if self.chart.get(e, start - 1, rule.rhs1).is_none() {
                    continue;
                }
                sum += rule.logp.exp()
                    * self.outside(rule.lhs, e, end)
                    * self.inside(rule.rhs1, e, start - 1);
            }
        }
        self.outside_memo.borrow_mut().insert((symbol, start, end), sum);
        sum
    }
}
