//! First-order matching of condition patterns against condition sets.
//!
//! Background-knowledge rules are stated over canonical variables; applying
//! them to a candidate rule means finding consistent bindings from pattern
//! variables to the candidate's terms. This is one-way matching (pattern
//! variables bind, candidate terms never do), which is all rule rewriting
//! needs.

use std::collections::BTreeMap;

use cer_core::{RelationalPredicate, Term};

/// Try to bind `pattern` onto `target`, extending `bindings`.
///
/// Names, arity, and negation must match exactly. Pattern variables bind to
/// the corresponding target term (consistently across positions); any other
/// pattern term must equal the target term.
pub fn unify_predicate(
    pattern: &RelationalPredicate,
    target: &RelationalPredicate,
    bindings: &BTreeMap<String, Term>,
) -> Option<BTreeMap<String, Term>> {
    if pattern.name() != target.name()
        || pattern.arity() != target.arity()
        || pattern.is_negated() != target.is_negated()
    {
        return None;
    }
    let mut extended = bindings.clone();
    for (p, t) in pattern.args().iter().zip(target.args()) {
        match p {
            Term::Variable(name) => match extended.get(name) {
                Some(bound) if bound != t => return None,
                Some(_) => {}
                None => {
                    extended.insert(name.clone(), t.clone());
                }
            },
            other if other == t => {}
            _ => return None,
        }
    }
    Some(extended)
}

/// All bindings under which every predicate of `pattern` matches some
/// predicate of `conditions`. Pattern predicates may match the same
/// condition; conjunction matching is existential per conjunct.
pub fn unify_conjunction(
    pattern: &[RelationalPredicate],
    conditions: &[RelationalPredicate],
) -> Vec<BTreeMap<String, Term>> {
    let mut partial = vec![BTreeMap::new()];
    for conjunct in pattern {
        let mut next = Vec::new();
        for bindings in &partial {
            for target in conditions {
                if let Some(extended) = unify_predicate(conjunct, target, bindings) {
                    if !next.contains(&extended) {
                        next.push(extended);
                    }
                }
            }
        }
        if next.is_empty() {
            return Vec::new();
        }
        partial = next;
    }
    partial
}
