use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::Result;
use crate::parse::parse_facts;
use crate::predicate::RelationalPredicate;
use crate::term::Term;

/// One observed environment state: a set of ground facts, indexed by the
/// terms they mention so relevant-fact queries are cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    facts: Vec<RelationalPredicate>,
    // term rendering -> indices of facts mentioning it
    by_term: BTreeMap<String, BTreeSet<usize>>,
}

impl State {
    pub fn new(mut facts: Vec<RelationalPredicate>) -> Self {
        facts.sort();
        facts.dedup();
        let mut by_term: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        for (index, fact) in facts.iter().enumerate() {
            for arg in fact.args() {
                by_term.entry(arg.to_string()).or_default().insert(index);
            }
        }
        Self { facts, by_term }
    }

    pub fn from_text(text: &str) -> Result<Self> {
        Ok(Self::new(parse_facts(text)?))
    }

    pub fn facts(&self) -> &[RelationalPredicate] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn contains(&self, fact: &RelationalPredicate) -> bool {
        self.facts.binary_search(fact).is_ok()
    }

    /// Distinct predicate names present in this state.
    pub fn fact_names(&self) -> BTreeSet<&str> {
        self.facts.iter().map(|f| f.name()).collect()
    }

    /// Facts mentioning any of `terms` in any argument position.
    pub fn relevant_to(&self, terms: &[Term]) -> Vec<&RelationalPredicate> {
        let mut indices = BTreeSet::new();
        for term in terms {
            if let Some(found) = self.by_term.get(&term.to_string()) {
                indices.extend(found.iter().copied());
            }
        }
        indices.into_iter().map(|i| &self.facts[i]).collect()
    }

    /// The full fact set as an owned set, for invariant intersection.
    pub fn fact_set(&self) -> BTreeSet<RelationalPredicate> {
        self.facts.iter().cloned().collect()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fact) in self.facts.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{fact}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevant_facts_share_a_term() {
        let state = State::from_text("(on a b) (clear a) (clear c) (highest c)").unwrap();
        let relevant = state.relevant_to(&[Term::constant("a")]);
        assert_eq!(relevant.len(), 2);
        assert!(relevant.iter().all(|f| f.shares_term(&[Term::constant("a")])));
    }

    #[test]
    fn states_deduplicate_facts() {
        let state = State::from_text("(on a b) (on a b)").unwrap();
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn display_round_trips() {
        let state = State::from_text("(clear a) (on a b)").unwrap();
        assert_eq!(State::from_text(&state.to_string()).unwrap(), state);
    }
}
