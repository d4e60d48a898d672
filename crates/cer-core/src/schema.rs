use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CerError, Result};
use crate::predicate::RelationalPredicate;
use crate::state::State;
use crate::term::Term;

/// Declared signature of a predicate or action: a name plus one type name
/// per argument position.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PredicateSignature {
    pub name: String,
    pub arg_types: Vec<String>,
}

impl PredicateSignature {
    pub fn new(name: impl Into<String>, arg_types: Vec<String>) -> Self {
        Self {
            name: name.into(),
            arg_types,
        }
    }

    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }
}

/// Ground instances of the actions valid in a state: action name mapped to
/// the set of argument tuples it can currently take.
pub type ValidActions = BTreeMap<String, Vec<Vec<Term>>>;

/// Read-only domain contract consumed by the induction engine.
///
/// The engine never mutates the schema; environments implement this once
/// and register a constructor in a [`DomainRegistry`].
pub trait DomainSchema {
    /// Declared state predicates.
    fn predicates(&self) -> &[PredicateSignature];

    /// Declared action predicates.
    fn actions(&self) -> &[PredicateSignature];

    /// Type hierarchy: the parent predicate of `predicate`, if any.
    fn parent_of(&self, predicate: &str) -> Option<&str>;

    /// Goal test for a state.
    fn is_goal(&self, state: &State) -> bool;

    /// Enumerate the ground actions valid in `state`.
    fn valid_actions(&self, state: &State) -> ValidActions;

    /// Signature lookup across predicates and actions.
    fn signature_of(&self, name: &str) -> Option<&PredicateSignature> {
        self.predicates()
            .iter()
            .chain(self.actions().iter())
            .find(|s| s.name == name)
    }
}

/// The external fact/pattern matcher, consumed through the textual
/// conjunction-of-predicates protocol.
///
/// The learner treats this as a black box: it asserts a state and asks
/// whether a conjunction holds, or for the variable bindings that satisfy
/// it. A naive in-repo matcher backs the demo domain and tests; production
/// domains plug in their own engine.
pub trait QueryEngine {
    /// Does the conjunction (whitespace-separated tuples) hold in `state`?
    fn holds(&self, state: &State, conjunction: &str) -> Result<bool>;

    /// All variable bindings under which the conjunction holds in `state`.
    fn bindings(&self, state: &State, conjunction: &str)
        -> Result<Vec<BTreeMap<String, Term>>>;

    /// Ground instances of `rule_conditions` that fire in `state`, applied
    /// to `action`: one ground action tuple per satisfying binding.
    fn fire(
        &self,
        state: &State,
        rule_conditions: &str,
        action: &RelationalPredicate,
    ) -> Result<Vec<RelationalPredicate>> {
        let mut fired = Vec::new();
        for binding in self.bindings(state, rule_conditions)? {
            let ground = action.substitute(&binding);
            if !fired.contains(&ground) {
                fired.push(ground);
            }
        }
        Ok(fired)
    }
}

type SchemaCtor = Box<dyn Fn() -> Box<dyn DomainSchema>>;

/// Explicit domain registry: identifier to constructor, resolved at
/// configuration time. Replaces by-name reflection.
#[derive(Default)]
pub struct DomainRegistry {
    ctors: BTreeMap<String, SchemaCtor>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        ctor: impl Fn() -> Box<dyn DomainSchema> + 'static,
    ) {
        self.ctors.insert(name.into(), Box::new(ctor));
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn DomainSchema>> {
        self.ctors
            .get(name)
            .map(|ctor| ctor())
            .ok_or_else(|| CerError::UnknownDomain(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSchema;

    impl DomainSchema for NullSchema {
        fn predicates(&self) -> &[PredicateSignature] {
            &[]
        }
        fn actions(&self) -> &[PredicateSignature] {
            &[]
        }
        fn parent_of(&self, _predicate: &str) -> Option<&str> {
            None
        }
        fn is_goal(&self, _state: &State) -> bool {
            false
        }
        fn valid_actions(&self, _state: &State) -> ValidActions {
            ValidActions::new()
        }
    }

    #[test]
    fn registry_resolves_registered_names() {
        let mut registry = DomainRegistry::new();
        registry.register("null", || Box::new(NullSchema));
        assert!(registry.create("null").is_ok());
        assert!(matches!(
            registry.create("missing"),
            Err(CerError::UnknownDomain(_))
        ));
    }
}
