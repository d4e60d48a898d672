use cer_core::rng::SampleRng;
use cer_core::Distribution;

use crate::arena::RuleId;

/// One action type's rule distribution.
///
/// Slots compete with each other through the generator's slot
/// distribution; within a slot, rules compete for the single draw the
/// slot gets per sampled policy. A `fixed` slot no longer admits rules
/// and keeps its weights through updates.
#[derive(Debug)]
pub struct Slot {
    action: String,
    rules: Distribution<RuleId>,
    fixed: bool,
    snapshot: Option<Vec<f64>>,
}

impl Slot {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            rules: Distribution::new(),
            fixed: false,
            snapshot: None,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, id: RuleId) -> bool {
        self.rules.contains(&id)
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    /// Admit a rule at the mean of the current probabilities, so a
    /// newcomer neither drowns out nor is drowned out by the incumbents.
    /// Returns `false` when the rule is already present and duplicates
    /// are not allowed, or when the slot is fixed.
    pub fn add_new_rule(&mut self, id: RuleId, allow_duplicates: bool) -> bool {
        if self.fixed {
            return false;
        }
        if !allow_duplicates && self.rules.contains(&id) {
            return false;
        }
        self.rules.add_at_mean(id);
        true
    }

    pub fn remove_rule(&mut self, id: RuleId) -> bool {
        self.rules.remove(&id).is_some()
    }

    pub fn sample_rule<R: SampleRng>(&self, rng: &mut R) -> Option<RuleId> {
        self.rules.sample(rng).copied()
    }

    pub fn most_likely_rule(&self) -> Option<RuleId> {
        self.rules.most_likely().copied()
    }

    pub fn rules(&self) -> &Distribution<RuleId> {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut Distribution<RuleId> {
        &mut self.rules
    }

    /// Freeze for greedy evaluation: snapshot the weights, then zero
    /// everything below the mean and split the mass among the rest.
    /// Unfreezing restores the snapshot; a stale snapshot (the rule set
    /// changed while frozen) is silently discarded.
    pub fn freeze(&mut self, frozen: bool) {
        if frozen {
            self.snapshot = Some(self.rules.weights());
            self.rules.binarize_below_mean();
        } else if let Some(snapshot) = self.snapshot.take() {
            self.rules.restore_weights(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::RuleId;
    use cer_core::rng::SplitMix64;

    fn ids(n: usize) -> Vec<RuleId> {
        // RuleId construction goes through an arena in real use; tests
        // fabricate ids by inserting placeholder rules.
        let mut arena = crate::RuleArena::new();
        (0..n)
            .map(|i| {
                arena.insert(
                    cer_core::parse_rule(&format!("(clear ?X{i}) => (move ?X0 ?X1)")).unwrap(),
                    None,
                )
            })
            .collect()
    }

    #[test]
    fn first_rule_enters_with_full_weight() {
        let ids = ids(1);
        let mut slot = Slot::new("move");
        assert!(slot.add_new_rule(ids[0], false));
        assert_eq!(slot.rules().weight_of(&ids[0]), Some(1.0));
    }

    #[test]
    fn duplicates_are_rejected_unless_allowed() {
        let ids = ids(1);
        let mut slot = Slot::new("move");
        slot.add_new_rule(ids[0], false);
        assert!(!slot.add_new_rule(ids[0], false));
        assert!(slot.add_new_rule(ids[0], true));
        assert_eq!(slot.len(), 2);
    }

    #[test]
    fn fixed_slot_admits_nothing() {
        let ids = ids(2);
        let mut slot = Slot::new("move");
        slot.add_new_rule(ids[0], false);
        slot.set_fixed(true);
        assert!(!slot.add_new_rule(ids[1], false));
        assert_eq!(slot.len(), 1);
    }

    #[test]
    fn freeze_binarizes_and_restores() {
        let ids = ids(3);
        let mut slot = Slot::new("move");
        for id in &ids {
            slot.add_new_rule(*id, false);
        }
        let mut counts = std::collections::HashMap::new();
        counts.insert(ids[0], 9.0);
        counts.insert(ids[1], 1.0);
        slot.rules_mut().update_towards(&counts, 10.0, 1.0);

        slot.freeze(true);
        assert_eq!(slot.rules().weight_of(&ids[0]), Some(1.0));
        assert_eq!(slot.rules().weight_of(&ids[2]), Some(0.0));

        slot.freeze(false);
        assert!((slot.rules().weight_of(&ids[0]).unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn sampling_draws_only_member_rules() {
        let ids = ids(4);
        let mut slot = Slot::new("move");
        for id in &ids {
            slot.add_new_rule(*id, false);
        }
        let mut rng = SplitMix64::new(7);
        for _ in 0..100 {
            let drawn = slot.sample_rule(&mut rng).unwrap();
            assert!(ids.contains(&drawn));
        }
    }
}
