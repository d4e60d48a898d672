use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use cer_core::{RelationalPredicate, State, Term};

use crate::config::InductConfig;
use crate::covering::intersect_bodies;

/// The situation immediately preceding a successful use of an action:
/// the relevant facts of the state/action pair, intersected across
/// successful uses. Once it stops changing it is *settled*, and drives
/// specialization.
#[derive(Debug, Clone, Default)]
pub struct PreGoalState {
    facts: BTreeSet<RelationalPredicate>,
    observations: u64,
    unchanged: u32,
    settled: bool,
}

impl PreGoalState {
    pub fn facts(&self) -> &BTreeSet<RelationalPredicate> {
        &self.facts
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Constants mentioned by the pre-goal facts: the goal-specific terms
    /// specialization may substitute for action variables.
    pub fn goal_constants(&self) -> BTreeSet<String> {
        self.facts
            .iter()
            .flat_map(|f| f.constants().into_iter().map(str::to_string))
            .collect()
    }

    /// Numeric values observed in the pre-goal for `predicate` at argument
    /// `position`, used to derive range split points.
    pub fn numeric_values(&self, predicate: &str, position: usize) -> Vec<f64> {
        self.facts
            .iter()
            .filter(|f| f.name() == predicate)
            .filter_map(|f| match f.args().get(position) {
                Some(Term::Number(n)) => Some(*n),
                _ => None,
            })
            .collect()
    }
}

/// Per-action pre-goal accumulation.
#[derive(Debug)]
pub struct PreGoalTracker {
    config: InductConfig,
    per_action: BTreeMap<String, PreGoalState>,
}

impl PreGoalTracker {
    pub fn new(config: InductConfig) -> Self {
        Self {
            config,
            per_action: BTreeMap::new(),
        }
    }

    pub fn get(&self, action: &str) -> Option<&PreGoalState> {
        self.per_action.get(action)
    }

    pub fn is_settled(&self, action: &str) -> bool {
        self.per_action
            .get(action)
            .map(|p| p.settled)
            .unwrap_or(false)
    }

    /// Record the state/action pair behind a successful action use.
    ///
    /// Facts relevant to the ground action's arguments are rewritten into
    /// the action's canonical frame and intersected into the pre-goal.
    /// Returns `true` when this recording settles the pre-goal.
    pub fn form_pre_goal_state(
        &mut self,
        state: &State,
        ground_action: &RelationalPredicate,
    ) -> bool {
        let mut to_canonical: BTreeMap<String, Term> = BTreeMap::new();
        for (position, arg) in ground_action.args().iter().enumerate() {
            if let Term::Constant(name) | Term::Variable(name) = arg {
                to_canonical
                    .entry(name.clone())
                    .or_insert_with(|| Term::canonical_variable(position));
            }
        }

        let observed: BTreeSet<RelationalPredicate> = state
            .relevant_to(ground_action.args())
            .into_iter()
            .map(|fact| {
                let args = fact
                    .args()
                    .iter()
                    .map(|arg| match arg {
                        Term::Constant(name) | Term::Variable(name) => to_canonical
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| arg.clone()),
                        other => other.clone(),
                    })
                    .collect();
                let rewritten = RelationalPredicate::new(fact.name(), args);
                if fact.is_negated() {
                    rewritten.negate()
                } else {
                    rewritten
                }
            })
            .collect();

        let pregoal = self
            .per_action
            .entry(ground_action.name().to_string())
            .or_default();
        pregoal.observations += 1;

        let changed = if pregoal.observations == 1 {
            pregoal.facts = observed;
            true
        } else {
            let next = intersect_bodies(&pregoal.facts, &observed);
            let changed = next != pregoal.facts;
            pregoal.facts = next;
            changed
        };

        if changed {
            pregoal.unchanged = 0;
            // A pre-goal that moves again is no longer settled.
            pregoal.settled = false;
        } else {
            pregoal.unchanged += 1;
        }

        let newly_settled =
            !pregoal.settled && pregoal.unchanged >= self.config.pregoal_inactivity;
        if newly_settled {
            pregoal.settled = true;
            debug!(
                action = ground_action.name(),
                facts = pregoal.facts.len(),
                "pre-goal settled"
            );
        }
        newly_settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cer_core::parse_predicate;

    fn config() -> InductConfig {
        InductConfig {
            pregoal_inactivity: 2,
            ..InductConfig::default()
        }
    }

    #[test]
    fn pre_goal_intersects_and_settles() {
        let mut tracker = PreGoalTracker::new(config());
        let action = parse_predicate("(move a b)").unwrap();
        let state = State::from_text("(clear a) (clear b) (on a c)").unwrap();

        assert!(!tracker.form_pre_goal_state(&state, &action));
        assert!(!tracker.form_pre_goal_state(&state, &action));
        // Third identical recording reaches the inactivity threshold.
        assert!(tracker.form_pre_goal_state(&state, &action));
        assert!(tracker.is_settled("move"));
    }

    #[test]
    fn change_resets_settling() {
        let mut tracker = PreGoalTracker::new(config());
        let action = parse_predicate("(move a b)").unwrap();
        let s1 = State::from_text("(clear a) (clear b) (on a c)").unwrap();
        let s2 = State::from_text("(clear a) (clear b)").unwrap();

        tracker.form_pre_goal_state(&s1, &action);
        tracker.form_pre_goal_state(&s1, &action);
        // Shrinks the pre-goal: the inactivity counter restarts.
        assert!(!tracker.form_pre_goal_state(&s2, &action));
        assert!(!tracker.is_settled("move"));
        assert!(!tracker.form_pre_goal_state(&s2, &action));
        assert!(tracker.form_pre_goal_state(&s2, &action));
        assert!(tracker.is_settled("move"));
    }

    #[test]
    fn goal_constants_come_from_unmapped_terms() {
        let mut tracker = PreGoalTracker::new(config());
        let action = parse_predicate("(move a b)").unwrap();
        // `floor` is not an action argument: it survives as a constant.
        let state = State::from_text("(clear a) (onfloor b floor)").unwrap();
        tracker.form_pre_goal_state(&state, &action);

        let pregoal = tracker.get("move").unwrap();
        assert!(pregoal.goal_constants().contains("floor"));
    }
}
