//! Rule induction: covering and specialization.
//!
//! Covering produces, per action type, the most general rule consistent
//! with every positive example seen (a relative least general
//! generalization), by intersecting the relevant-fact sets of the valid
//! action instances. Once a rule's pre-goal situation settles,
//! specialization spawns child rules: one added variant condition
//! (positive and negated), goal-constant substitutions, and numeric range
//! splits.

#![forbid(unsafe_code)]

pub mod config;
pub mod covering;
pub mod pregoal;
pub mod specialize;

pub use config::InductConfig;
pub use covering::{CoverageStage, CoveredRule, Covering};
pub use pregoal::{PreGoalState, PreGoalTracker};
pub use specialize::specialize_rule;
