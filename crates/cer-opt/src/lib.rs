//! The cross-entropy optimization loop.
//!
//! A [`LearningSession`] owns a policy generator and an [`Evaluator`],
//! and alternates sampling a policy population, ranking it by return,
//! and moving the generator's distributions toward the elite samples.
//! Slot lines can be persisted and reloaded between runs.

#![forbid(unsafe_code)]

mod config;
mod evaluate;
mod optimize;
mod persist;

pub use config::OptimizerConfig;
pub use evaluate::{Evaluation, Evaluator};
pub use optimize::{LearningSession, TrainingReport};
pub use persist::{load_generator, save_generator, PROBABILITY_DELIMITER, RULE_DELIMITER};
