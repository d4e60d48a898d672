use std::collections::BTreeSet;

use cer_core::RelationalPredicate;

/// Co-occurrence beliefs for one predicate (or one negated argument
/// structure).
///
/// Facts are recorded relative to the subject predicate's own arguments,
/// canonicalized to `?X0..?Xn`, so observations of `(on a b)` and
/// `(on c d)` feed the same tables. Three tiers:
///
/// - *always true*: held in every observation so far (running intersection)
/// - *occasionally true*: held in some but not all observations
/// - *never true*: known to the universe of relative facts but false in
///   every observation so far
#[derive(Debug, Clone, Default)]
pub struct ConditionBeliefs {
    observations: u64,
    always_true: BTreeSet<RelationalPredicate>,
    occasionally_true: BTreeSet<RelationalPredicate>,
    never_true: BTreeSet<RelationalPredicate>,
    /// Every relative fact ever seen for this subject.
    universe: BTreeSet<RelationalPredicate>,
}

impl ConditionBeliefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Record one observation: the canonicalized facts that held alongside
    /// the subject. Everything in the known universe but absent from
    /// `true_facts` counts as false for this observation.
    pub fn note(&mut self, true_facts: BTreeSet<RelationalPredicate>) {
        self.observations += 1;

        if self.observations == 1 {
            self.always_true = true_facts.clone();
            self.universe = true_facts;
            return;
        }

        // Facts newly discovered this observation were false in every
        // earlier one, so they enter as occasional, never always.
        for fact in &true_facts {
            if !self.universe.contains(fact) {
                self.occasionally_true.insert(fact.clone());
            }
        }
        self.universe.extend(true_facts.iter().cloned());

        // Shrink the always set; demote dropped facts to occasional.
        let demoted: Vec<RelationalPredicate> = self
            .always_true
            .iter()
            .filter(|f| !true_facts.contains(*f))
            .cloned()
            .collect();
        for fact in demoted {
            self.always_true.remove(&fact);
            self.occasionally_true.insert(fact);
        }

        // A never-true fact that shows up is promoted to occasional.
        let promoted: Vec<RelationalPredicate> = self
            .never_true
            .iter()
            .filter(|f| true_facts.contains(*f))
            .cloned()
            .collect();
        for fact in promoted {
            self.never_true.remove(&fact);
            self.occasionally_true.insert(fact);
        }

        // Universe members absent now and never seen true become never-true
        // candidates, unless already classified.
        for fact in &self.universe {
            if !true_facts.contains(fact)
                && !self.always_true.contains(fact)
                && !self.occasionally_true.contains(fact)
            {
                self.never_true.insert(fact.clone());
            }
        }
    }

    pub fn always_true(&self) -> &BTreeSet<RelationalPredicate> {
        &self.always_true
    }

    pub fn occasionally_true(&self) -> &BTreeSet<RelationalPredicate> {
        &self.occasionally_true
    }

    pub fn never_true(&self) -> &BTreeSet<RelationalPredicate> {
        &self.never_true
    }

    /// Variant facts: relative facts that are not invariant across
    /// observations. These are the candidate conditions specialization
    /// adds to a rule.
    pub fn variants(&self) -> &BTreeSet<RelationalPredicate> {
        &self.occasionally_true
    }
}
