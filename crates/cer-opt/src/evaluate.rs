use cer_core::Result;
use cer_policy::{Policy, PolicyGenerator};

/// Outcome of evaluating one policy for one episode.
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    /// The achieved return; what elite selection ranks on.
    pub value: f64,
    /// An internally shaped reward, when the environment provides one.
    /// Reported but never used for ranking.
    pub shaped: Option<f64>,
}

impl Evaluation {
    pub fn of(value: f64) -> Self {
        Self {
            value,
            shaped: None,
        }
    }
}

/// The environment seam: runs one blocking episode under `policy`.
///
/// Implementations must be deterministic in `(policy, seed)`. The
/// generator is passed in so an episode can call back into it, the way
/// an acting agent does: `trigger_covering` when the policy leaves a
/// valid action unmatched, `form_pre_goal_state` when an action use
/// leads to the goal.
pub trait Evaluator {
    fn evaluate(
        &mut self,
        policy: &Policy,
        generator: &mut PolicyGenerator,
        seed: u64,
    ) -> Result<Evaluation>;
}
