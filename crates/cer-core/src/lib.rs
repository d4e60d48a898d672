//! Relational data model and sampling primitives for the learner.
//!
//! Everything here is deterministic and single-threaded: sampling goes
//! through an explicitly seeded RNG, and all collections iterate in a
//! stable order.

#![forbid(unsafe_code)]

pub mod distribution;
pub mod error;
pub mod parse;
pub mod predicate;
pub mod rng;
pub mod rule;
pub mod schema;
pub mod state;
pub mod stats;
pub mod term;

pub use distribution::Distribution;
pub use error::{CerError, Result};
pub use parse::{parse_facts, parse_predicate, parse_rule};
pub use predicate::RelationalPredicate;
pub use rng::{mix64, derive_seed, SampleRng, SplitMix64};
pub use rule::RelationalRule;
pub use schema::{DomainRegistry, DomainSchema, PredicateSignature, QueryEngine, ValidActions};
pub use state::State;
pub use stats::RunningStats;
pub use term::Term;
