//! Multilevel coarse-to-fine probabilistic CKY parsing over weighted context-free grammars.
//!
//! The pipeline: load a weighted grammar in binary normal form ([`grammar`]), optionally coarsen
//! it through a nested symbol partition ([`coarsen`], [`mapping`]) into a chain of grammars from
//! coarse to fine, parse with [`cky`], and use [`inside_outside`] marginals from one level to
//! prune the next via [`driver`].

pub mod cache;
pub mod chart;
pub mod cky;
pub mod coarsen;
pub mod driver;
pub mod error;
pub mod grammar;
pub mod inside_outside;
pub mod mapping;
pub mod symbol;
pub mod tokenize;
pub mod tree;

pub use cky::{AdmissionPolicy, AlwaysAdmit, Stats};
pub use driver::CtfDriver;
pub use error::{ParseError, Result};
pub use grammar::Grammar;
pub use mapping::CtfMapping;
pub use symbol::Symbol;
pub use tree::Tree;
