//! Rule slots, the rule arena, and the cross-entropy policy generator.
//!
//! A slot holds a weighted distribution over candidate rules for one
//! action type; the generator holds a distribution over slots. Sampling
//! a policy draws a slot order and one rule per slot; updating moves both
//! levels toward the usage frequencies of the elite samples.

#![forbid(unsafe_code)]

mod arena;
mod generator;
mod policy;
mod slot;

pub use arena::{RuleArena, RuleId, SlotId};
pub use generator::{GeneratorConfig, PolicyGenerator};
pub use policy::{Policy, PolicyItem, PolicyRule};
pub use slot::Slot;
