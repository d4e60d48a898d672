use std::collections::BTreeSet;
use std::fmt;

use cer_core::{RelationalPredicate, RelationalRule};

/// Index of a rule in the [`RuleArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(usize);

impl RuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Index of a slot in the policy generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug)]
struct RuleEntry {
    rule: RelationalRule,
    parent: Option<RuleId>,
    children: BTreeSet<RuleId>,
    slot: Option<SlotId>,
}

/// Flat storage for every rule the generator has ever created.
///
/// Mutation lineage is kept as id sets rather than references, so parents
/// and children never form ownership cycles and a rule can be looked up,
/// compared, or rewritten in place without touching its relatives.
#[derive(Debug, Default)]
pub struct RuleArena {
    entries: Vec<RuleEntry>,
}

impl RuleArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a rule, linking it below `parent` when given.
    pub fn insert(&mut self, rule: RelationalRule, parent: Option<RuleId>) -> RuleId {
        let id = RuleId(self.entries.len());
        self.entries.push(RuleEntry {
            rule,
            parent,
            children: BTreeSet::new(),
            slot: None,
        });
        if let Some(parent) = parent {
            self.entries[parent.0].children.insert(id);
        }
        id
    }

    pub fn get(&self, id: RuleId) -> &RelationalRule {
        &self.entries[id.0].rule
    }

    pub fn get_mut(&mut self, id: RuleId) -> &mut RelationalRule {
        &mut self.entries[id.0].rule
    }

    /// The id of an arena rule equal to `rule` (same action, same
    /// condition set), if one exists.
    pub fn find(&self, rule: &RelationalRule) -> Option<RuleId> {
        self.entries
            .iter()
            .position(|e| e.rule.same_rule(rule))
            .map(RuleId)
    }

    pub fn assign_slot(&mut self, id: RuleId, slot: SlotId) {
        self.entries[id.0].slot = Some(slot);
    }

    pub fn slot_of(&self, id: RuleId) -> Option<SlotId> {
        self.entries[id.0].slot
    }

    pub fn parent_of(&self, id: RuleId) -> Option<RuleId> {
        self.entries[id.0].parent
    }

    pub fn children_of(&self, id: RuleId) -> &BTreeSet<RuleId> {
        &self.entries[id.0].children
    }

    /// Rewrite a rule's conditions in place, preserving its id, lineage,
    /// and slot weight. Used when covering further generalizes an RLGG.
    pub fn replace_conditions(&mut self, id: RuleId, conditions: Vec<RelationalPredicate>) {
        let entry = &mut self.entries[id.0];
        entry.rule = entry.rule.with_conditions(conditions);
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &RelationalRule)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (RuleId(i), &e.rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cer_core::parse_rule;

    #[test]
    fn lineage_links_both_directions() {
        let mut arena = RuleArena::new();
        let parent_rule = parse_rule("(clear ?X0) => (pick ?X0)").unwrap();
        let child_rule = parse_rule("(clear ?X0) (small ?X0) => (pick ?X0)").unwrap();

        let parent = arena.insert(parent_rule, None);
        let child = arena.insert(child_rule, Some(parent));

        assert_eq!(arena.parent_of(child), Some(parent));
        assert!(arena.children_of(parent).contains(&child));
        assert_eq!(arena.parent_of(parent), None);
    }

    #[test]
    fn find_matches_by_condition_set() {
        let mut arena = RuleArena::new();
        let id = arena.insert(
            parse_rule("(clear ?X0) (on ?X0 ?Y0) => (pick ?X0)").unwrap(),
            None,
        );
        // Same conditions in a different textual order.
        let probe = parse_rule("(on ?X0 ?Y0) (clear ?X0) => (pick ?X0)").unwrap();
        assert_eq!(arena.find(&probe), Some(id));
        assert_eq!(arena.find(&parse_rule("(clear ?X0) => (pick ?X0)").unwrap()), None);
    }

    #[test]
    fn replace_conditions_keeps_identity() {
        let mut arena = RuleArena::new();
        let id = arena.insert(
            parse_rule("(clear ?X0) (highest ?X0) => (pick ?X0)").unwrap(),
            None,
        );
        arena.assign_slot(id, SlotId(3));
        let shrunk = parse_rule("(clear ?X0) => (pick ?X0)").unwrap();
        arena.replace_conditions(id, shrunk.conditions().to_vec());
        assert_eq!(arena.get(id).conditions().len(), 1);
        assert_eq!(arena.slot_of(id), Some(SlotId(3)));
    }
}
