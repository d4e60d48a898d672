use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::predicate::RelationalPredicate;
use crate::stats::RunningStats;

/// Token separating a rule's condition conjunction from its action in the
/// textual protocol.
pub const RULE_INFIX: &str = "=>";

/// A relational if-then rule: a conjunction of condition predicates and
/// exactly one action predicate.
///
/// Conditions are kept sorted and deduplicated so rule equality is
/// condition-set equality. Mutation lineage (parent/children) and slot
/// assignment live in the rule arena, not here.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelationalRule {
    conditions: Vec<RelationalPredicate>,
    action: RelationalPredicate,
    /// Distance from the maximally general ancestor this rule descends from.
    ancestry_depth: u32,
    /// Online mean/variance of achieved returns.
    stats: RunningStats,
    /// Times this rule appeared in a sampled policy.
    uses: u64,
}

impl RelationalRule {
    pub fn new(mut conditions: Vec<RelationalPredicate>, action: RelationalPredicate) -> Self {
        conditions.sort();
        conditions.dedup();
        Self {
            conditions,
            action,
            ancestry_depth: 0,
            stats: RunningStats::default(),
            uses: 0,
        }
    }

    /// A child rule one specialization step below `self`.
    pub fn derive(&self, conditions: Vec<RelationalPredicate>, action: RelationalPredicate) -> Self {
        let mut child = Self::new(conditions, action);
        child.ancestry_depth = self.ancestry_depth + 1;
        child
    }

    pub fn conditions(&self) -> &[RelationalPredicate] {
        &self.conditions
    }

    pub fn action(&self) -> &RelationalPredicate {
        &self.action
    }

    pub fn ancestry_depth(&self) -> u32 {
        self.ancestry_depth
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    pub fn uses(&self) -> u64 {
        self.uses
    }

    pub fn note_use(&mut self) {
        self.uses += 1;
    }

    pub fn note_return(&mut self, value: f64) {
        self.stats.update(value);
    }

    /// The condition conjunction as a set, for set-equality comparisons.
    pub fn condition_set(&self) -> BTreeSet<&RelationalPredicate> {
        self.conditions.iter().collect()
    }

    /// True when both rules have the same action and the same condition set.
    pub fn same_rule(&self, other: &Self) -> bool {
        self.action == other.action && self.conditions == other.conditions
    }

    /// Minimality: every variable of the action appears in at least one
    /// condition. Maximally general rules (covering output before any
    /// specialization) are exempt; callers pass `maximally_general` for
    /// those.
    pub fn is_minimal(&self, maximally_general: bool) -> bool {
        if maximally_general {
            return true;
        }
        self.action.variables().iter().all(|v| {
            self.conditions
                .iter()
                .any(|c| c.variables().contains(v))
        })
    }

    /// Replace the condition conjunction, preserving lineage bookkeeping.
    pub fn with_conditions(&self, mut conditions: Vec<RelationalPredicate>) -> Self {
        conditions.sort();
        conditions.dedup();
        Self {
            conditions,
            action: self.action.clone(),
            ancestry_depth: self.ancestry_depth,
            stats: self.stats.clone(),
            uses: self.uses,
        }
    }
}

impl PartialEq for RelationalRule {
    fn eq(&self, other: &Self) -> bool {
        self.same_rule(other)
    }
}

impl Eq for RelationalRule {}

impl fmt::Display for RelationalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cond in &self.conditions {
            write!(f, "{cond} ")?;
        }
        write!(f, "{RULE_INFIX} {}", self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn pred(name: &str, args: &[&str]) -> RelationalPredicate {
        RelationalPredicate::new(
            name,
            args.iter()
                .map(|a| {
                    if a.starts_with('?') {
                        Term::variable(*a)
                    } else {
                        Term::constant(*a)
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn conditions_are_sorted_and_deduplicated() {
        let rule = RelationalRule::new(
            vec![pred("on", &["?X", "?Y"]), pred("clear", &["?X"]), pred("clear", &["?X"])],
            pred("move", &["?X", "?Y"]),
        );
        assert_eq!(rule.conditions().len(), 2);
        assert_eq!(rule.conditions()[0].name(), "clear");
    }

    #[test]
    fn equality_ignores_condition_order() {
        let a = RelationalRule::new(
            vec![pred("clear", &["?X"]), pred("on", &["?X", "?Y"])],
            pred("move", &["?X", "?Y"]),
        );
        let b = RelationalRule::new(
            vec![pred("on", &["?X", "?Y"]), pred("clear", &["?X"])],
            pred("move", &["?X", "?Y"]),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn minimality_requires_action_variables_in_conditions() {
        let minimal = RelationalRule::new(
            vec![pred("clear", &["?X"]), pred("clear", &["?Y"])],
            pred("move", &["?X", "?Y"]),
        );
        assert!(minimal.is_minimal(false));

        let dangling = RelationalRule::new(vec![pred("clear", &["?X"])], pred("move", &["?X", "?Y"]));
        assert!(!dangling.is_minimal(false));
        assert!(dangling.is_minimal(true));
    }

    #[test]
    fn derive_increments_ancestry_depth() {
        let parent = RelationalRule::new(vec![pred("clear", &["?X"])], pred("pick", &["?X"]));
        let child = parent.derive(
            vec![pred("clear", &["?X"]), pred("small", &["?X"])],
            pred("pick", &["?X"]),
        );
        assert_eq!(child.ancestry_depth(), 1);
    }

    #[test]
    fn renders_with_infix() {
        let rule = RelationalRule::new(vec![pred("clear", &["?X"])], pred("pick", &["?X"]));
        assert_eq!(rule.to_string(), "(clear ?X) => (pick ?X)");
    }
}
