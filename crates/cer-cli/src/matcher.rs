use std::collections::BTreeMap;

use cer_core::{parse_facts, QueryEngine, RelationalPredicate, Result, State, Term};

/// Naive backtracking matcher over ground states.
///
/// Positive conditions are solved first by trying every fact of the same
/// name and arity; negated conditions are then negation-as-failure checks
/// against the surviving bindings. Numeric range arguments match any fact
/// whose number falls inside the range. Good enough for the demo domain
/// and tests; production domains plug in their own engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveMatcher;

impl NaiveMatcher {
    pub fn match_conjunction(
        &self,
        state: &State,
        conjunction: &[RelationalPredicate],
    ) -> Vec<BTreeMap<String, Term>> {
        let (negated, positive): (Vec<_>, Vec<_>) =
            conjunction.iter().partition(|c| c.is_negated());

        let mut solutions = vec![BTreeMap::new()];
        for condition in positive {
            let mut extended = Vec::new();
            for binding in &solutions {
                for fact in state.facts() {
                    if let Some(next) = match_fact(condition, fact, binding) {
                        if !extended.contains(&next) {
                            extended.push(next);
                        }
                    }
                }
            }
            solutions = extended;
            if solutions.is_empty() {
                return solutions;
            }
        }

        solutions
            .into_iter()
            .filter(|binding| {
                negated.iter().all(|condition| {
                    let grounded = condition.substitute(binding);
                    !state
                        .facts()
                        .iter()
                        .any(|fact| match_fact(&grounded, fact, binding).is_some())
                })
            })
            .collect()
    }
}

/// Extend `binding` so that `condition` (negation flag ignored) matches
/// the ground `fact`, or `None` when it cannot.
fn match_fact(
    condition: &RelationalPredicate,
    fact: &RelationalPredicate,
    binding: &BTreeMap<String, Term>,
) -> Option<BTreeMap<String, Term>> {
    if condition.name() != fact.name() || condition.arity() != fact.arity() || fact.is_negated() {
        return None;
    }
    let mut next = binding.clone();
    for (pattern, ground) in condition.args().iter().zip(fact.args()) {
        match pattern {
            Term::Variable(name) => match next.get(name) {
                Some(bound) if bound != ground => return None,
                Some(_) => {}
                None => {
                    next.insert(name.clone(), ground.clone());
                }
            },
            Term::Constant(_) | Term::Number(_) => {
                if pattern != ground {
                    return None;
                }
            }
            Term::Range { .. } => match ground {
                Term::Number(value) if pattern.covers_number(*value) => {}
                _ => return None,
            },
        }
    }
    Some(next)
}

impl QueryEngine for NaiveMatcher {
    fn holds(&self, state: &State, conjunction: &str) -> Result<bool> {
        Ok(!self.bindings(state, conjunction)?.is_empty())
    }

    fn bindings(
        &self,
        state: &State,
        conjunction: &str,
    ) -> Result<Vec<BTreeMap<String, Term>>> {
        let conditions = parse_facts(conjunction)?;
        Ok(self.match_conjunction(state, &conditions))
    }
}
