use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use cer_core::{RelationalPredicate, RelationalRule, Term};
use cer_observe::{AgentObservations, SimplifyOutcome};

use crate::config::InductConfig;
use crate::pregoal::PreGoalState;

/// Spawn the specializations of a maximally-general rule whose pre-goal
/// has settled:
///
/// (a) add one variant condition, in positive and negated form, filtered
///     through rule simplification;
/// (b) substitute an action variable with a goal-specific constant where
///     the constant is not already used by the rule;
/// (c) split numeric range conditions into halves, a quarter-overlap
///     middle, a zero-crossing pair, and pre-goal-derived cut points.
///
/// Children are deduplicated against the parent and against each other;
/// the caller deduplicates against the slot's existing rules.
pub fn specialize_rule(
    rule: &RelationalRule,
    variants: &BTreeSet<RelationalPredicate>,
    observations: &mut AgentObservations,
    pregoal: Option<&PreGoalState>,
    config: &InductConfig,
) -> Vec<RelationalRule> {
    let mut children: Vec<RelationalRule> = Vec::new();
    let mut push = |child: RelationalRule, children: &mut Vec<RelationalRule>| {
        if !child.same_rule(rule) && !children.iter().any(|c| c.same_rule(&child)) {
            children.push(child);
        }
    };

    // (a) one added variant condition, both polarities.
    for variant in variants {
        if rule.conditions().contains(variant) || rule.conditions().contains(&variant.negate()) {
            continue;
        }
        for candidate in [variant.clone(), variant.negate()] {
            let mut conditions = rule.conditions().to_vec();
            conditions.push(candidate);
            match observations.simplify_rule(&conditions) {
                SimplifyOutcome::Illegal(reason) => {
                    debug!(action = rule.action().name(), %reason, "illegal specialization");
                }
                outcome => {
                    let Some(simplified) = outcome.into_conditions(&conditions) else {
                        continue;
                    };
                    if simplified.is_empty() {
                        debug!(
                            action = rule.action().name(),
                            "specialization simplified to nothing; over-generalized"
                        );
                        continue;
                    }
                    push(rule.derive(simplified, rule.action().clone()), &mut children);
                }
            }
        }
    }

    // (b) goal-constant substitution for action variables.
    if let Some(pregoal) = pregoal {
        let used: BTreeSet<String> = rule
            .conditions()
            .iter()
            .chain(std::iter::once(rule.action()))
            .flat_map(|p| p.constants().into_iter().map(str::to_string))
            .collect();
        for variable in rule.action().variables() {
            for constant in pregoal.goal_constants() {
                if used.contains(&constant) {
                    // The goal term already appears elsewhere in the rule;
                    // binding this variable to it would conflict.
                    continue;
                }
                let mut binding = BTreeMap::new();
                binding.insert(variable.to_string(), Term::constant(constant));
                let conditions: Vec<RelationalPredicate> = rule
                    .conditions()
                    .iter()
                    .map(|c| c.substitute(&binding))
                    .collect();
                let action = rule.action().substitute(&binding);
                push(rule.derive(conditions, action), &mut children);
            }
        }
    }

    // (c) numeric range splitting.
    for (index, condition) in rule.conditions().iter().enumerate() {
        for (position, term) in condition.args().iter().enumerate() {
            let Term::Range { min, max } = *term else {
                continue;
            };
            for (lo, hi) in range_splits(min, max, condition.name(), position, pregoal) {
                if hi - lo < config.min_range_width {
                    continue;
                }
                if lo <= min && hi >= max {
                    continue; // not a proper sub-range
                }
                let mut args = condition.args().to_vec();
                args[position] = Term::Range { min: lo, max: hi };
                let replacement = RelationalPredicate::new(condition.name(), args);
                let replacement = if condition.is_negated() {
                    replacement.negate()
                } else {
                    replacement
                };
                let mut conditions = rule.conditions().to_vec();
                conditions[index] = replacement;
                push(rule.derive(conditions, rule.action().clone()), &mut children);
            }
        }
    }

    children
}

/// Candidate sub-ranges of `[min, max]`: lower and upper halves, the
/// quarter-overlap middle, a zero-crossing split when the range straddles
/// zero, and cuts at pre-goal numeric values inside the range.
fn range_splits(
    min: f64,
    max: f64,
    predicate: &str,
    position: usize,
    pregoal: Option<&PreGoalState>,
) -> Vec<(f64, f64)> {
    let mid = (min + max) / 2.0;
    let quarter = (max - min) / 4.0;
    let mut splits = vec![
        (min, mid),
        (mid, max),
        (min + quarter, max - quarter),
    ];
    if min < 0.0 && 0.0 < max {
        splits.push((min, 0.0));
        splits.push((0.0, max));
    }
    if let Some(pregoal) = pregoal {
        for value in pregoal.numeric_values(predicate, position) {
            if min < value && value < max {
                splits.push((min, value));
                splits.push((value, max));
            }
        }
    }
    splits
}

#[cfg(test)]
mod tests {
    use super::*;
    use cer_core::{parse_predicate, parse_rule, PredicateSignature, State};
    use cer_core::schema::ValidActions;

    fn observations() -> AgentObservations {
        AgentObservations::new(&[
            PredicateSignature::new("clear", vec!["object".into()]),
            PredicateSignature::new("on", vec!["object".into(), "object".into()]),
            PredicateSignature::new("highest", vec!["object".into()]),
        ])
    }

    fn variants(texts: &[&str]) -> BTreeSet<RelationalPredicate> {
        texts.iter().map(|t| parse_predicate(t).unwrap()).collect()
    }

    #[test]
    fn variant_conditions_spawn_both_polarities() {
        let rule = parse_rule("(clear ?X0) (clear ?X1) => (move ?X0 ?X1)").unwrap();
        let mut obs = observations();
        let children = specialize_rule(
            &rule,
            &variants(&["(highest ?X0)"]),
            &mut obs,
            None,
            &InductConfig::default(),
        );
        assert_eq!(children.len(), 2);
        assert!(children.iter().any(|c| {
            c.conditions()
                .contains(&parse_predicate("(highest ?X0)").unwrap())
        }));
        assert!(children.iter().any(|c| {
            c.conditions()
                .contains(&parse_predicate("(not (highest ?X0))").unwrap())
        }));
        assert!(children.iter().all(|c| c.ancestry_depth() == 1));
    }

    #[test]
    fn existing_condition_is_not_readded() {
        let rule = parse_rule("(clear ?X0) (highest ?X0) => (move ?X0 ?X1)").unwrap();
        let mut obs = observations();
        let children = specialize_rule(
            &rule,
            &variants(&["(highest ?X0)"]),
            &mut obs,
            None,
            &InductConfig::default(),
        );
        assert!(children.is_empty());
    }

    #[test]
    fn goal_constants_replace_action_variables() {
        let rule = parse_rule("(clear ?X0) (clear ?X1) => (move ?X0 ?X1)").unwrap();
        let mut obs = observations();

        let mut tracker = crate::PreGoalTracker::new(InductConfig::default());
        let action = parse_predicate("(move a b)").unwrap();
        let state = State::from_text("(clear a) (on b goalblock)").unwrap();
        tracker.form_pre_goal_state(&state, &action);
        let pregoal = tracker.get("move").unwrap();

        let children = specialize_rule(
            &rule,
            &BTreeSet::new(),
            &mut obs,
            Some(pregoal),
            &InductConfig::default(),
        );
        // ?X0 -> goalblock and ?X1 -> goalblock.
        assert_eq!(children.len(), 2);
        assert!(children.iter().any(|c| c.action().to_string() == "(move goalblock ?X1)"));
        assert!(children.iter().any(|c| c.action().to_string() == "(move ?X0 goalblock)"));
    }

    #[test]
    fn range_conditions_split_into_subranges() {
        let rule = parse_rule("(height ?X0 -2<=2) (clear ?X0) => (lift ?X0)").unwrap();
        let mut obs = observations();
        let children = specialize_rule(
            &rule,
            &BTreeSet::new(),
            &mut obs,
            None,
            &InductConfig::default(),
        );
        // Halves, quarter-overlap middle, and the zero-crossing pair; the
        // zero-crossing duplicates the halves here, so three survive.
        assert_eq!(children.len(), 3);
        let has_range = |lo: f64, hi: f64| {
            children.iter().any(|c| {
                c.conditions()
                    .iter()
                    .any(|p| p.args().contains(&Term::range(lo, hi)))
            })
        };
        assert!(has_range(-2.0, 0.0));
        assert!(has_range(0.0, 2.0));
        assert!(has_range(-1.0, 1.0));
    }

    #[test]
    fn pregoal_value_derives_extra_split() {
        let rule = parse_rule("(height ?X0 0<=4) => (lift ?X0)").unwrap();
        let mut obs = observations();

        let mut tracker = crate::PreGoalTracker::new(InductConfig::default());
        let action = parse_predicate("(lift a)").unwrap();
        let state = State::from_text("(height a 3)").unwrap();
        tracker.form_pre_goal_state(&state, &action);
        let pregoal = tracker.get("lift").unwrap();

        let children = specialize_rule(
            &rule,
            &BTreeSet::new(),
            &mut obs,
            Some(pregoal),
            &InductConfig::default(),
        );
        let has_cut = children.iter().any(|c| {
            c.conditions()
                .iter()
                .any(|p| p.args().contains(&Term::range(0.0, 3.0)))
        }) && children.iter().any(|c| {
            c.conditions()
                .iter()
                .any(|p| p.args().contains(&Term::range(3.0, 4.0)))
        });
        assert!(has_cut, "children: {children:?}");
    }
}
