use std::collections::BTreeSet;

use cer_core::{RelationalPredicate, State};

/// Global invariants mined across every observed state.
///
/// *Specific* invariants are exact ground facts present in every state
/// (running intersection of fact sets). *General* invariants are predicate
/// names present in every state regardless of arguments. The *never seen*
/// set holds declared predicate names with no observation yet; a fact with
/// such a name appearing is the staleness signal that forces re-covering.
#[derive(Debug, Clone, Default)]
pub struct InvariantObservations {
    scans: u64,
    specific: BTreeSet<RelationalPredicate>,
    general: BTreeSet<String>,
    never_seen: BTreeSet<String>,
}

impl InvariantObservations {
    /// Seed the never-seen set with every declared predicate name.
    pub fn new(declared: impl IntoIterator<Item = String>) -> Self {
        Self {
            scans: 0,
            specific: BTreeSet::new(),
            general: BTreeSet::new(),
            never_seen: declared.into_iter().collect(),
        }
    }

    pub fn scans(&self) -> u64 {
        self.scans
    }

    /// Fold one state into the running intersections.
    ///
    /// Returns `true` when a previously never-seen predicate appeared:
    /// the existing rule set predates this predicate and is stale.
    pub fn scan(&mut self, state: &State) -> bool {
        self.scans += 1;

        let names: BTreeSet<String> = state.fact_names().iter().map(|n| n.to_string()).collect();
        let mut stale = false;
        for name in &names {
            if self.never_seen.remove(name) && self.scans > 1 {
                stale = true;
            }
        }

        if self.scans == 1 {
            self.specific = state.fact_set();
            self.general = names;
        } else {
            self.specific.retain(|fact| state.contains(fact));
            self.general.retain(|name| names.contains(name));
        }
        stale
    }

    /// Ground facts true in every observed state.
    pub fn specific_invariants(&self) -> &BTreeSet<RelationalPredicate> {
        &self.specific
    }

    /// Predicate names true (with some arguments) in every observed state.
    pub fn general_invariants(&self) -> &BTreeSet<String> {
        &self.general
    }

    /// Declared predicates with no observation yet.
    pub fn never_seen(&self) -> &BTreeSet<String> {
        &self.never_seen
    }

    pub fn is_specific_invariant(&self, fact: &RelationalPredicate) -> bool {
        self.specific.contains(fact)
    }
}
