//! Blocks-world demo domain: the classic stack/unstack environment,
//! small enough to learn in seconds but rich enough to exercise covering,
//! pre-goal settling, and specialization end to end.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use cer_core::rng::{SampleRng, SplitMix64};
use cer_core::{
    DomainSchema, PredicateSignature, RelationalPredicate, Result, State, Term, ValidActions,
};
use cer_opt::{Evaluation, Evaluator};
use cer_policy::{Policy, PolicyGenerator};

use crate::matcher::NaiveMatcher;

const GOAL_REWARD: f64 = 20.0;
const STEP_COST: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    /// One single tower.
    Stack,
    /// Every block on the floor.
    Unstack,
}

/// Block name mapped to what it rests on; `None` means the floor.
pub type Layout = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone)]
pub struct BlocksWorld {
    blocks: Vec<String>,
    goal: GoalKind,
    predicates: Vec<PredicateSignature>,
    actions: Vec<PredicateSignature>,
}

impl BlocksWorld {
    pub fn new(count: usize, goal: GoalKind) -> Self {
        let block = vec!["block".to_string()];
        let two_blocks = vec!["block".to_string(), "block".to_string()];
        Self {
            blocks: (0..count).map(|i| format!("b{i}")).collect(),
            goal,
            predicates: vec![
                PredicateSignature::new("on", two_blocks.clone()),
                PredicateSignature::new("onfloor", block.clone()),
                PredicateSignature::new("clear", block.clone()),
                PredicateSignature::new("highest", block.clone()),
            ],
            actions: vec![
                PredicateSignature::new("move", two_blocks),
                PredicateSignature::new("tofloor", block),
            ],
        }
    }

    pub fn goal(&self) -> GoalKind {
        self.goal
    }

    /// Drop each block onto the floor or onto a currently clear block.
    pub fn random_layout<R: SampleRng>(&self, rng: &mut R) -> Layout {
        let mut layout = Layout::new();
        let mut clear: Vec<String> = Vec::new();
        for block in &self.blocks {
            let choice = rng.next_index(clear.len() + 1);
            if choice == clear.len() {
                layout.insert(block.clone(), None);
            } else {
                let support = clear.remove(choice);
                layout.insert(block.clone(), Some(support));
            }
            clear.push(block.clone());
        }
        layout
    }

    fn is_clear(layout: &Layout, block: &str) -> bool {
        !layout
            .values()
            .any(|support| support.as_deref() == Some(block))
    }

    fn height(layout: &Layout, block: &str) -> usize {
        let mut height = 1;
        let mut current = block;
        while let Some(Some(support)) = layout.get(current) {
            height += 1;
            current = support;
        }
        height
    }

    pub fn state_of(&self, layout: &Layout) -> State {
        let mut facts = Vec::new();
        let mut max_height = 0;
        for (block, support) in layout {
            match support {
                Some(support) => facts.push(RelationalPredicate::new(
                    "on",
                    vec![Term::constant(block), Term::constant(support)],
                )),
                None => facts.push(RelationalPredicate::new(
                    "onfloor",
                    vec![Term::constant(block)],
                )),
            }
            if Self::is_clear(layout, block) {
                facts.push(RelationalPredicate::new(
                    "clear",
                    vec![Term::constant(block)],
                ));
            }
            max_height = max_height.max(Self::height(layout, block));
        }
        for block in layout.keys() {
            if Self::height(layout, block) == max_height {
                facts.push(RelationalPredicate::new(
                    "highest",
                    vec![Term::constant(block)],
                ));
            }
        }
        State::new(facts)
    }

    pub fn is_goal_layout(&self, layout: &Layout) -> bool {
        let on_floor = layout.values().filter(|s| s.is_none()).count();
        match self.goal {
            GoalKind::Stack => on_floor == 1,
            GoalKind::Unstack => on_floor == layout.len(),
        }
    }

    /// Apply a ground action; invalid actions leave the layout untouched.
    pub fn apply(&self, layout: &mut Layout, action: &RelationalPredicate) -> bool {
        let constant = |index: usize| -> Option<String> {
            action.args().get(index)?.as_constant().map(str::to_string)
        };
        match action.name() {
            "move" => {
                let (Some(block), Some(target)) = (constant(0), constant(1)) else {
                    return false;
                };
                if block == target
                    || !Self::is_clear(layout, &block)
                    || !Self::is_clear(layout, &target)
                {
                    return false;
                }
                layout.insert(block, Some(target));
                true
            }
            "tofloor" => {
                let Some(block) = constant(0) else {
                    return false;
                };
                if !Self::is_clear(layout, &block) || layout.get(&block) == Some(&None) {
                    return false;
                }
                layout.insert(block, None);
                true
            }
            _ => false,
        }
    }
}

impl DomainSchema for BlocksWorld {
    fn predicates(&self) -> &[PredicateSignature] {
        &self.predicates
    }

    fn actions(&self) -> &[PredicateSignature] {
        &self.actions
    }

    fn parent_of(&self, _predicate: &str) -> Option<&str> {
        None
    }

    fn is_goal(&self, state: &State) -> bool {
        let on_floor = state
            .facts()
            .iter()
            .filter(|f| f.name() == "onfloor")
            .count();
        match self.goal {
            GoalKind::Stack => on_floor == 1,
            GoalKind::Unstack => on_floor == self.blocks.len(),
        }
    }

    fn valid_actions(&self, state: &State) -> ValidActions {
        let clear: Vec<&Term> = state
            .facts()
            .iter()
            .filter(|f| f.name() == "clear")
            .map(|f| &f.args()[0])
            .collect();
        let on_floor: Vec<&Term> = state
            .facts()
            .iter()
            .filter(|f| f.name() == "onfloor")
            .map(|f| &f.args()[0])
            .collect();

        let mut moves = Vec::new();
        for block in &clear {
            for target in &clear {
                if block != target {
                    moves.push(vec![(*block).clone(), (*target).clone()]);
                }
            }
        }
        let drops: Vec<Vec<Term>> = clear
            .iter()
            .filter(|block| !on_floor.contains(*block))
            .map(|block| vec![(*block).clone()])
            .collect();

        let mut valid = ValidActions::new();
        if !moves.is_empty() {
            valid.insert("move".to_string(), moves);
        }
        if !drops.is_empty() {
            valid.insert("tofloor".to_string(), drops);
        }
        valid
    }
}

/// Runs blocks-world episodes under a sampled policy.
#[derive(Debug)]
pub struct BlocksEvaluator {
    world: BlocksWorld,
    matcher: NaiveMatcher,
    max_steps: usize,
}

impl BlocksEvaluator {
    pub fn new(world: BlocksWorld, max_steps: usize) -> Self {
        Self {
            world,
            matcher: NaiveMatcher,
            max_steps,
        }
    }

    /// The first policy rule whose conditions match and whose ground
    /// action is currently valid decides the step; otherwise a random
    /// valid action keeps the episode exploring.
    fn select_action<R: SampleRng>(
        &self,
        policy: &Policy,
        state: &State,
        valid: &ValidActions,
        rng: &mut R,
    ) -> Option<RelationalPredicate> {
        for entry in policy.rules() {
            for binding in self.matcher.match_conjunction(state, entry.rule.conditions()) {
                let ground = entry.rule.action().substitute(&binding);
                if is_valid(valid, &ground) {
                    return Some(ground);
                }
            }
        }
        random_valid(valid, rng)
    }
}

fn is_valid(valid: &ValidActions, ground: &RelationalPredicate) -> bool {
    valid
        .get(ground.name())
        .is_some_and(|instances| instances.iter().any(|args| args == ground.args()))
}

fn random_valid<R: SampleRng>(
    valid: &ValidActions,
    rng: &mut R,
) -> Option<RelationalPredicate> {
    let total: usize = valid.values().map(Vec::len).sum();
    if total == 0 {
        return None;
    }
    let mut index = rng.next_index(total);
    for (name, instances) in valid {
        if index < instances.len() {
            return Some(RelationalPredicate::new(name, instances[index].clone()));
        }
        index -= instances.len();
    }
    None
}

impl Evaluator for BlocksEvaluator {
    fn evaluate(
        &mut self,
        policy: &Policy,
        generator: &mut PolicyGenerator,
        seed: u64,
    ) -> Result<Evaluation> {
        let mut rng = SplitMix64::new(seed);
        let mut layout = self.world.random_layout(&mut rng);
        if self.world.is_goal_layout(&layout) {
            return Ok(Evaluation::of(GOAL_REWARD));
        }

        let mut total = 0.0;
        for step in 0..self.max_steps {
            let state = self.world.state_of(&layout);
            let valid = self.world.valid_actions(&state);

            // New rules are created only when the policy leaves a valid
            // action type unmatched; otherwise covering just refines.
            let uncovered = valid
                .iter()
                .any(|(name, instances)| !instances.is_empty() && !policy.covers_action(name));
            generator.trigger_covering(&state, &valid, uncovered)?;

            let Some(ground) = self.select_action(policy, &state, &valid, &mut rng) else {
                break;
            };
            self.world.apply(&mut layout, &ground);
            total += STEP_COST;
            trace!(step, action = %ground, "blocks step");

            if self.world.is_goal_layout(&layout) {
                generator.form_pre_goal_state(&state, &ground);
                total += GOAL_REWARD;
                break;
            }
        }
        Ok(Evaluation::of(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tower_of_three() -> (BlocksWorld, Layout) {
        // b2 on b1 on b0 on the floor.
        let world = BlocksWorld::new(3, GoalKind::Unstack);
        let mut layout = Layout::new();
        layout.insert("b0".into(), None);
        layout.insert("b1".into(), Some("b0".into()));
        layout.insert("b2".into(), Some("b1".into()));
        (world, layout)
    }

    #[test]
    fn state_facts_describe_the_layout() {
        let (world, layout) = tower_of_three();
        let state = world.state_of(&layout);
        assert!(state.contains(&cer_core::parse_predicate("(on b2 b1)").unwrap()));
        assert!(state.contains(&cer_core::parse_predicate("(onfloor b0)").unwrap()));
        assert!(state.contains(&cer_core::parse_predicate("(clear b2)").unwrap()));
        assert!(state.contains(&cer_core::parse_predicate("(highest b2)").unwrap()));
        assert!(!state.contains(&cer_core::parse_predicate("(clear b0)").unwrap()));
    }

    #[test]
    fn valid_actions_respect_clear_and_floor() {
        let (world, layout) = tower_of_three();
        let state = world.state_of(&layout);
        let valid = world.valid_actions(&state);
        // Only b2 is clear: no move targets, one tofloor.
        assert!(!valid.contains_key("move"));
        assert_eq!(valid["tofloor"].len(), 1);
        assert_eq!(valid["tofloor"][0], vec![Term::constant("b2")]);
    }

    #[test]
    fn applying_actions_reaches_the_goal() {
        let (world, mut layout) = tower_of_three();
        assert!(!world.is_goal_layout(&layout));
        let drop2 = cer_core::parse_predicate("(tofloor b2)").unwrap();
        let drop1 = cer_core::parse_predicate("(tofloor b1)").unwrap();
        assert!(world.apply(&mut layout, &drop2));
        assert!(world.apply(&mut layout, &drop1));
        assert!(world.is_goal_layout(&layout));
        // Re-dropping a floor block is invalid.
        assert!(!world.apply(&mut layout, &drop1));
    }

    #[test]
    fn random_layouts_are_deterministic_per_seed() {
        let world = BlocksWorld::new(5, GoalKind::Stack);
        let mut a = SplitMix64::new(17);
        let mut b = SplitMix64::new(17);
        assert_eq!(world.random_layout(&mut a), world.random_layout(&mut b));
    }

    #[test]
    fn goal_test_matches_layout_goal() {
        let world = BlocksWorld::new(2, GoalKind::Stack);
        let state = State::from_text("(onfloor b0) (on b1 b0) (clear b1) (highest b1)").unwrap();
        assert!(world.is_goal(&state));
        let spread = State::from_text("(onfloor b0) (onfloor b1) (clear b0) (clear b1)").unwrap();
        assert!(!world.is_goal(&spread));
    }
}
