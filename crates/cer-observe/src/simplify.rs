//! Condition-set simplification against learned background knowledge.
//!
//! Applied to every covering/specialization candidate before it can enter
//! a slot. Runs to a fixpoint; the result of simplifying an already
//! simplified set is the identical set.

use cer_core::RelationalPredicate;

use crate::background::NonRedundantBackgroundKnowledge;
use crate::invariants::InvariantObservations;
use crate::unify::unify_conjunction;

/// Outcome of simplifying a candidate condition set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimplifyOutcome {
    /// Already in simplest form.
    Unchanged,
    /// Rewritten to a smaller/equivalent set.
    Simplified(Vec<RelationalPredicate>),
    /// The conditions contradict learned knowledge; the rule is discarded.
    Illegal(String),
}

impl SimplifyOutcome {
    /// The simplified conditions, or `None` for illegal candidates.
    /// `original` is returned for [`SimplifyOutcome::Unchanged`].
    pub fn into_conditions(
        self,
        original: &[RelationalPredicate],
    ) -> Option<Vec<RelationalPredicate>> {
        match self {
            SimplifyOutcome::Unchanged => Some(original.to_vec()),
            SimplifyOutcome::Simplified(conditions) => Some(conditions),
            SimplifyOutcome::Illegal(_) => None,
        }
    }
}

/// Rewrite `conditions` to a fixpoint using background knowledge and
/// invariants:
///
/// 1. a condition and its direct negation together are illegal;
/// 2. a condition whose negation is a specific invariant is illegal;
/// 3. a condition implied by the rest of the set through an inference rule
///    is removed;
/// 4. a matched equivalence left-hand side is rewritten to its simpler
///    right-hand side; a single-conjunct equivalence fires only when both
///    sides are present, dropping the redundant left side.
pub fn simplify_conditions(
    conditions: &[RelationalPredicate],
    background: &NonRedundantBackgroundKnowledge,
    invariants: &InvariantObservations,
) -> SimplifyOutcome {
    let mut current: Vec<RelationalPredicate> = conditions.to_vec();
    current.sort();
    current.dedup();

    let mut changed = current.len() != conditions.len();

    loop {
        if let Some(reason) = find_contradiction(&current, invariants) {
            return SimplifyOutcome::Illegal(reason);
        }

        let mut step_changed = false;

        // Drop conditions implied by the remainder of the set.
        'removal: for index in 0..current.len() {
            let candidate = current[index].clone();
            let rest: Vec<RelationalPredicate> = current
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, c)| c.clone())
                .collect();
            for rule in background.rules() {
                if rule.is_equivalence() {
                    continue;
                }
                for binding in unify_conjunction(rule.pre(), &rest) {
                    if rule.post().substitute(&binding) == candidate {
                        current.remove(index);
                        step_changed = true;
                        break 'removal;
                    }
                }
            }
        }

        if !step_changed {
            // Rewrite a matched equivalence LHS to its simpler RHS.
            'rewrite: for rule in background.rules() {
                if !rule.is_equivalence() {
                    continue;
                }
                for binding in unify_conjunction(rule.pre(), &current) {
                    let matched: Vec<RelationalPredicate> = rule
                        .pre()
                        .iter()
                        .map(|p| p.substitute(&binding))
                        .collect();
                    if !matched.iter().all(|m| current.contains(m)) {
                        continue;
                    }
                    let replacement = rule.post().substitute(&binding);
                    // A single-conjunct equivalence fires only when both
                    // sides are present; rewriting a lone side would not
                    // shrink the set.
                    if matched.len() < 2 && !current.contains(&replacement) {
                        continue;
                    }
                    current.retain(|c| !matched.contains(c));
                    if !current.contains(&replacement) {
                        current.push(replacement);
                    }
                    current.sort();
                    step_changed = true;
                    break 'rewrite;
                }
            }
        }

        if !step_changed {
            break;
        }
        changed = true;
    }

    if changed {
        current.sort();
        current.dedup();
        SimplifyOutcome::Simplified(current)
    } else {
        SimplifyOutcome::Unchanged
    }
}

fn find_contradiction(
    conditions: &[RelationalPredicate],
    invariants: &InvariantObservations,
) -> Option<String> {
    for (i, a) in conditions.iter().enumerate() {
        for b in conditions.iter().skip(i + 1) {
            if a.contradicts(b) {
                return Some(format!("requires both {a} and {b}"));
            }
        }
        if a.is_negated() && invariants.is_specific_invariant(&a.negate()) {
            return Some(format!("{a} contradicts the invariant {}", a.negate()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundRule;
    use cer_core::{parse_facts, parse_predicate, State};

    fn conds(text: &str) -> Vec<RelationalPredicate> {
        parse_facts(text).unwrap()
    }

    fn bk_with_implication() -> NonRedundantBackgroundKnowledge {
        let mut bk = NonRedundantBackgroundKnowledge::new();
        bk.insert(BackgroundRule::implication(
            conds("(on ?X0 ?X1)"),
            parse_predicate("(above ?X0 ?X1)").unwrap(),
        ));
        bk
    }

    #[test]
    fn removes_implied_condition() {
        let bk = bk_with_implication();
        let inv = InvariantObservations::default();
        let outcome = simplify_conditions(&conds("(on a b) (above a b) (clear a)"), &bk, &inv);
        let SimplifyOutcome::Simplified(result) = outcome else {
            panic!("expected simplification, got {outcome:?}");
        };
        assert_eq!(result, conds("(clear a) (on a b)"));
    }

    #[test]
    fn simplification_is_idempotent() {
        let bk = bk_with_implication();
        let inv = InvariantObservations::default();
        let first = simplify_conditions(&conds("(on a b) (above a b) (clear a)"), &bk, &inv);
        let SimplifyOutcome::Simplified(once) = first else {
            panic!("expected simplification");
        };
        // Fixpoint: a second application changes nothing.
        assert_eq!(simplify_conditions(&once, &bk, &inv), SimplifyOutcome::Unchanged);
    }

    #[test]
    fn direct_contradiction_is_illegal() {
        let bk = NonRedundantBackgroundKnowledge::new();
        let inv = InvariantObservations::default();
        let outcome = simplify_conditions(&conds("(on a b) (not (on a b))"), &bk, &inv);
        assert!(matches!(outcome, SimplifyOutcome::Illegal(_)));
    }

    #[test]
    fn negating_an_invariant_is_illegal() {
        let bk = NonRedundantBackgroundKnowledge::new();
        let mut inv = InvariantObservations::new(vec!["floor".to_string()]);
        inv.scan(&State::from_text("(floor f)").unwrap());
        let outcome = simplify_conditions(&conds("(not (floor f)) (clear a)"), &bk, &inv);
        assert!(matches!(outcome, SimplifyOutcome::Illegal(_)));
    }

    #[test]
    fn equivalence_rewrites_complex_side_to_simple() {
        let mut bk = NonRedundantBackgroundKnowledge::new();
        bk.insert(BackgroundRule::equivalence(
            conds("(on ?X0 ?X1) (nothing_on ?X0)"),
            parse_predicate("(top ?X0 ?X1)").unwrap(),
        ));
        let inv = InvariantObservations::default();
        let outcome =
            simplify_conditions(&conds("(on a b) (nothing_on a) (clear c)"), &bk, &inv);
        let SimplifyOutcome::Simplified(result) = outcome else {
            panic!("expected simplification");
        };
        assert_eq!(result, conds("(clear c) (top a b)"));
    }

    #[test]
    fn single_predicate_equivalence_drops_the_redundant_side() {
        let mut bk = NonRedundantBackgroundKnowledge::new();
        bk.insert(BackgroundRule::equivalence(
            conds("(on ?X0 ?X1)"),
            parse_predicate("(above ?X0 ?X1)").unwrap(),
        ));
        let inv = InvariantObservations::default();
        let outcome =
            simplify_conditions(&conds("(on a b) (above a b) (clear a)"), &bk, &inv);
        let SimplifyOutcome::Simplified(result) = outcome else {
            panic!("expected simplification, got {outcome:?}");
        };
        assert_eq!(result, conds("(above a b) (clear a)"));
    }

    #[test]
    fn lone_equivalence_side_is_left_alone() {
        let mut bk = NonRedundantBackgroundKnowledge::new();
        bk.insert(BackgroundRule::equivalence(
            conds("(on ?X0 ?X1)"),
            parse_predicate("(above ?X0 ?X1)").unwrap(),
        ));
        let inv = InvariantObservations::default();
        // Neither side is redundant while the other is absent.
        let outcome = simplify_conditions(&conds("(clear a) (on a b)"), &bk, &inv);
        assert_eq!(outcome, SimplifyOutcome::Unchanged);
        let outcome = simplify_conditions(&conds("(above a b) (clear a)"), &bk, &inv);
        assert_eq!(outcome, SimplifyOutcome::Unchanged);
    }

    #[test]
    fn untouched_set_reports_unchanged() {
        let bk = NonRedundantBackgroundKnowledge::new();
        let inv = InvariantObservations::default();
        let outcome = simplify_conditions(&conds("(clear a) (on a b)"), &bk, &inv);
        assert_eq!(outcome, SimplifyOutcome::Unchanged);
    }
}
