//! Statistical/logical model the agent builds of its environment.
//!
//! Every observed state feeds three structures: per-predicate condition
//! beliefs (which facts co-occur with which), global invariants (facts and
//! predicate names always or never seen), and a deduplicated set of
//! background-knowledge rules (implications and equivalences mined from the
//! beliefs). Rule simplification rewrites candidate condition sets against
//! that knowledge.

#![forbid(unsafe_code)]

pub mod background;
pub mod beliefs;
pub mod invariants;
pub mod observations;
pub mod simplify;
pub mod unify;

pub use background::{BackgroundRule, NonRedundantBackgroundKnowledge};
pub use beliefs::ConditionBeliefs;
pub use invariants::InvariantObservations;
pub use observations::{AgentObservations, ScanReport};
pub use simplify::{simplify_conditions, SimplifyOutcome};
pub use unify::{unify_conjunction, unify_predicate};
