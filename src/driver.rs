//! Coarse-to-fine driver: builds the grammar chain and chains CKY + inside/outside across levels.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use log::info;

use crate::cache::GrammarCache;
use crate::chart::Chart;
use crate::cky::{self, AdmissionPolicy, AlwaysAdmit, Stats};
use crate::coarsen::coarsen;
use crate::error::{ParseError, Result};
use crate::grammar::Grammar;
use crate::inside_outside::InsideOutside;
use crate::mapping::{project_symbol, CtfMapping};
use crate::symbol::Symbol;
use crate::tree::Tree;

pub const DEFAULT_THRESHOLD: f64 = 0.0001;

/// Projects a fine-grammar candidate symbol to its previous-level coarse counterpart and admits
/// it iff the coarse symbol's posterior marginal (relative to the previous level's chart) clears
/// the configured threshold. A fine symbol with no coarse counterpart is always admitted.
struct MarginalPolicy<'a> {
    calculator: InsideOutside<'a>,
    prev_grammar: &'a Grammar,
    cur_grammar: &'a Grammar,
    fine_to_coarse: &'a HashMap<String, String>,
    total: f64,
    threshold: f64,
    projection_cache: RefCell<HashMap<Symbol, Option<Symbol>>>,
}

impl<'a> AdmissionPolicy for MarginalPolicy<'a> {
    fn admit(&self, symbol: Symbol, start: usize, end: usize) -> bool {
        let coarse = *self
            .projection_cache
            .borrow_mut()
            .entry(symbol)
            .or_insert_with(|| {
                let name = self.cur_grammar.name(symbol);
                let projected = project_symbol(name, self.fine_to_coarse);
                self.prev_grammar.symbol(&projected)
            });
        let Some(coarse) = coarse else {
            return true;
        };
        let posterior = self.calculator.inside(coarse, start, end)
            * self.calculator.outside(coarse, start, end)
            / self.total;
        posterior > self.threshold
    }
}

/// Holds the full coarsest-to-finest grammar chain and drives a sentence through all levels.
pub struct CtfDriver {
    grammars: Vec<Grammar>,
    mapping: CtfMapping,
    threshold: f64,
}

impl CtfDriver {
    /// `finest` is the original, most detailed grammar; the chain of coarser grammars is derived
    /// from it via `mapping`, optionally consulting/populating `cache`.
    pub fn build(
        finest: Grammar,
        mapping: CtfMapping,
        threshold: f64,
        cache: Option<&GrammarCache>,
    ) -> Result<CtfDriver> {
        let levels = mapping.num_levels();
        let mut grammars: Vec<Option<Grammar>> = (0..=levels).map(|_| None).collect();
        let finest_level = levels;
        // The start symbol at each coarser level is the projection of the finest level's start
        // symbol through the composition of fine-to-coarse maps down to that level.
        let mut start_name = finest.name(finest.start()).to_owned();
        grammars[finest_level] = Some(finest);

        for depth in (0..levels).rev() {
            let finer = grammars[depth + 1].as_ref().expect("finer level already built");
            let records = if let Some(cache) = cache {
                match cache.load(depth) {
                    Some(records) => records,
                    None => {
                        let records = coarsen(finer, mapping.fine_to_coarse(depth));
                        cache.store(depth, &records)?;
                        records
                    }
                }
            } else {
                coarsen(finer, mapping.fine_to_coarse(depth))
            };
            start_name = project_symbol(&start_name, mapping.fine_to_coarse(depth));
            grammars[depth] = Some(Grammar::from_records_with_start(records, Some(&start_name))?);
        }

        Ok(CtfDriver {
            grammars: grammars.into_iter().map(|g| g.expect("every level built")).collect(),
            mapping,
            threshold,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.grammars.len()
    }

    /// Runs the full coarse-to-fine pipeline over `tokens`, returning the finest-level Viterbi
    /// tree plus per-level parse statistics.
    pub fn parse(&self, tokens: &[String]) -> Result<(Tree, Vec<Stats>)> {
        let mut stats_log = Vec::with_capacity(self.grammars.len());
        let (mut chart, stats0) = cky::parse(&self.grammars[0], tokens, &AlwaysAdmit);
        info!("ctf level 0: entered={} pruned={}", stats0.items_entered, stats0.items_pruned);
        stats_log.push(stats0);
        if !chart.has_parse(self.grammars[0].start()) {
            return Err(ParseError::NoParseFound);
        }

        for level in 1..self.grammars.len() {
            let prev_grammar = &self.grammars[level - 1];
            let calculator = InsideOutside::new(prev_grammar, &chart);
            let total = calculator.total();
            if total <= 0.0 {
                return Err(ParseError::NoParseFound);
            }
            let policy = MarginalPolicy {
                calculator,
                prev_grammar,
                cur_grammar: &self.grammars[level],
                fine_to_coarse: self.mapping.fine_to_coarse(level - 1),
                total,
                threshold: self.threshold,
                projection_cache: RefCell::new(HashMap::new()),
            };
            let (next_chart, stats): (Chart, Stats) = cky::parse(&self.grammars[level], tokens, &policy);
            info!(
                "ctf level {}: entered={} pruned={}",
                level, stats.items_entered, stats.items_pruned
            );
            stats_log.push(stats);
            if !next_chart.has_parse(self.grammars[level].start()) {
                return Err(ParseError::NoParseFound);
            }
            chart = next_chart;
        }

        let finest = &self.grammars[self.grammars.len() - 1];
        let tree = cky::backtrace(finest, &chart, tokens)?;
        Ok((tree, stats_log))
    }

    /// Parses against the finest grammar alone, with pruning switched off; used by `ckyparser`.
    pub fn parse_single_level(grammar: &Grammar, tokens: &[String]) -> Result<(Tree, Stats)> {
        let (chart, stats) = cky::parse(grammar, tokens, &AlwaysAdmit);
        let tree = cky::backtrace(grammar, &chart, tokens)?;
        Ok((tree, stats))
    }
}

pub fn load_mapping(path: &Path) -> Result<CtfMapping> {
    CtfMapping::load_file(path)
}
