use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use cer_core::rng::SampleRng;
use cer_core::schema::ValidActions;
use cer_core::{
    Distribution, PredicateSignature, RelationalPredicate, RelationalRule, Result, State,
};
use cer_induct::{specialize_rule, CoverageStage, Covering, InductConfig, PreGoalTracker};
use cer_observe::AgentObservations;

use crate::arena::{RuleArena, RuleId, SlotId};
use crate::policy::{Policy, PolicyRule};
use crate::slot::Slot;

/// Generator tunables on top of the induction thresholds.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    pub induct: InductConfig,
    /// Slot probabilities below this are treated as zero when sampling.
    pub slot_epsilon: f64,
    /// Top rules per slot re-specialized after each distribution update.
    pub resample_top: usize,
    /// Fraction of a slot's uniform share below which a rule is destroyed
    /// after an update. The action's covering rule is never pruned.
    pub prune_fraction: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            induct: InductConfig::default(),
            slot_epsilon: 1e-4,
            resample_top: 1,
            prune_fraction: 0.1,
        }
    }
}

/// The cross-entropy policy generator.
///
/// Owns the rule arena, one slot per discovered action type, a slot
/// distribution over the slots, and the observation/induction state that
/// feeds new rules into the slots. Rules move through three mutually
/// exclusive bookkeeping sets per action: covered but still generalizing,
/// maximally general awaiting a settled pre-goal, and already specialized
/// for the current pre-goal.
#[derive(Debug)]
pub struct PolicyGenerator {
    config: GeneratorConfig,
    slots: Vec<Slot>,
    slot_dist: Distribution<SlotId>,
    slot_by_action: BTreeMap<String, SlotId>,
    arena: RuleArena,
    observations: AgentObservations,
    covering: Covering,
    pregoals: PreGoalTracker,
    /// The one evolving covering rule per action.
    rlgg_ids: BTreeMap<String, RuleId>,
    covered: BTreeMap<String, BTreeSet<RuleId>>,
    lgg: BTreeMap<String, BTreeSet<RuleId>>,
    mutated: BTreeMap<String, BTreeSet<RuleId>>,
    frozen: bool,
    restart: bool,
    last_change: f64,
}

impl PolicyGenerator {
    pub fn new(signatures: &[PredicateSignature], config: GeneratorConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            slot_dist: Distribution::new(),
            slot_by_action: BTreeMap::new(),
            arena: RuleArena::new(),
            observations: AgentObservations::new(signatures),
            covering: Covering::new(config.induct),
            pregoals: PreGoalTracker::new(config.induct),
            rlgg_ids: BTreeMap::new(),
            covered: BTreeMap::new(),
            lgg: BTreeMap::new(),
            mutated: BTreeMap::new(),
            frozen: false,
            restart: false,
            last_change: f64::INFINITY,
        }
    }

    pub fn arena(&self) -> &RuleArena {
        &self.arena
    }

    pub fn observations(&self) -> &AgentObservations {
        &self.observations
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.index()]
    }

    pub fn slots(&self) -> impl Iterator<Item = (SlotId, &Slot)> {
        self.slots.iter().enumerate().map(|(i, s)| (SlotId(i), s))
    }

    pub fn slot_for_action(&self, action: &str) -> Option<SlotId> {
        self.slot_by_action.get(action).copied()
    }

    /// The largest rule count across slots; population sizing scales on it.
    pub fn max_slot_size(&self) -> usize {
        self.slots.iter().map(Slot::len).max().unwrap_or(0)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Total absolute weight change of the most recent update.
    pub fn last_change(&self) -> f64 {
        self.last_change
    }

    pub fn is_converged(&self, threshold: f64) -> bool {
        self.last_change < threshold
    }

    /// Every action type is covered and every covering rule has reached
    /// its least general generalization.
    pub fn is_settled(&self) -> bool {
        !self.slots.is_empty()
            && self
                .slots
                .iter()
                .all(|s| self.covering.stage(s.action()) == CoverageStage::Lgg)
    }

    /// True when a stale-observation signal arrived since the last call;
    /// reading clears it. The optimizer discards its partial population
    /// and re-covers.
    pub fn take_restart(&mut self) -> bool {
        std::mem::replace(&mut self.restart, false)
    }

    fn ensure_slot(&mut self, action: &str) -> SlotId {
        if let Some(&id) = self.slot_by_action.get(action) {
            return id;
        }
        let id = SlotId(self.slots.len());
        self.slots.push(Slot::new(action));
        self.slot_dist.add_at_mean(id);
        self.slot_by_action.insert(action.to_string(), id);
        debug!(action, slot = %id, "created slot");
        id
    }

    /// Sample a fresh policy.
    ///
    /// Unfrozen, slots are visited in an order drawn without replacement
    /// from the slot distribution and each visited slot contributes one
    /// drawn rule (none when the slot's probability is effectively zero).
    /// Frozen, slots are visited in fixed most-likely order and contribute
    /// their most likely rule. Either way the covering rule of every known
    /// action is appended when missing, so an unlucky draw never looks
    /// like an uncovered action.
    pub fn generate_policy<R: SampleRng>(&mut self, rng: &mut R) -> Policy {
        let mut drawn: Vec<(SlotId, RuleId)> = Vec::new();
        if self.frozen {
            for (&slot_id, weight) in self.slot_dist.ordered_by_weight() {
                if weight < self.config.slot_epsilon {
                    continue;
                }
                let slot = &self.slots[slot_id.index()];
                if let Some(rule_id) = slot.most_likely_rule() {
                    if slot.rules().weight_of(&rule_id).unwrap_or(0.0) > 0.0 {
                        drawn.push((slot_id, rule_id));
                    }
                }
            }
        } else {
            let mut remaining = self.slot_dist.clone();
            while let Some(slot_id) = remaining.sample_with_removal(rng) {
                if self.slot_dist.weight_of(&slot_id).unwrap_or(0.0) < self.config.slot_epsilon {
                    continue;
                }
                if let Some(rule_id) = self.slots[slot_id.index()].sample_rule(rng) {
                    drawn.push((slot_id, rule_id));
                }
            }
        }

        let mut policy = Policy::new();
        for (slot_id, rule_id) in drawn {
            self.arena.get_mut(rule_id).note_use();
            policy.push_rule(PolicyRule {
                slot: slot_id,
                id: rule_id,
                rule: self.arena.get(rule_id).clone(),
                appended: false,
            });
        }

        let fallbacks: Vec<(String, RuleId)> = self
            .rlgg_ids
            .iter()
            .map(|(action, &id)| (action.clone(), id))
            .collect();
        for (action, id) in fallbacks {
            let rule = self.arena.get(id).clone();
            if policy.contains_rule(&rule) {
                continue;
            }
            let Some(&slot_id) = self.slot_by_action.get(&action) else {
                continue;
            };
            self.arena.get_mut(id).note_use();
            policy.push_rule(PolicyRule {
                slot: slot_id,
                id,
                rule,
                appended: true,
            });
        }
        policy
    }

    /// Fold one observed state into the observation tables and the
    /// per-action covering rules. New rules are created only when
    /// `create_new_rules` is set; refinement of existing covering rules
    /// always happens in place, keeping their slot weights. Returns the
    /// ids of newly created rules, or the scan's schema error when a fact
    /// violates its declared signature.
    pub fn trigger_covering(
        &mut self,
        state: &State,
        valid: &ValidActions,
        create_new_rules: bool,
    ) -> Result<Vec<RuleId>> {
        let report = self.observations.scan_state(state, valid)?;
        if report.stale {
            self.restart = true;
            debug!("never-seen predicate appeared; restart requested");
        }

        let covered = self.covering.cover_state(state, valid);
        let mut added = Vec::new();
        for result in covered {
            let action = result.rule.action().name().to_string();
            let id = match self.rlgg_ids.get(&action).copied() {
                Some(id) => {
                    if result.refined {
                        self.arena
                            .replace_conditions(id, result.rule.conditions().to_vec());
                        debug!(
                            action = %action,
                            conditions = result.rule.conditions().len(),
                            "covering rule generalized"
                        );
                    }
                    id
                }
                None => {
                    if !create_new_rules {
                        continue;
                    }
                    let id = self.arena.insert(result.rule.clone(), None);
                    let slot_id = self.ensure_slot(&action);
                    self.slots[slot_id.index()].add_new_rule(id, false);
                    self.arena.assign_slot(id, slot_id);
                    self.rlgg_ids.insert(action.clone(), id);
                    self.covered.entry(action.clone()).or_default().insert(id);
                    added.push(id);
                    debug!(action = %action, rule = %id, "covering created rule");
                    id
                }
            };

            if result.newly_lgg {
                if let Some(set) = self.covered.get_mut(&action) {
                    set.remove(&id);
                }
                let settled = self.pregoals.is_settled(&action);
                self.mutate_rule(id);
                if settled {
                    self.mutated.entry(action.clone()).or_default().insert(id);
                } else {
                    self.lgg.entry(action.clone()).or_default().insert(id);
                }
                self.assert_disjoint(&action);
            }
        }
        Ok(added)
    }

    /// Record the state/action pair behind a successful action use. When
    /// this settles the action's pre-goal, every maximally-general rule of
    /// the action not yet specialized for it is specialized now. A pre-goal
    /// that moves again returns its rules to the awaiting set.
    pub fn form_pre_goal_state(
        &mut self,
        state: &State,
        ground_action: &RelationalPredicate,
    ) -> bool {
        let action = ground_action.name().to_string();
        let newly_settled = self.pregoals.form_pre_goal_state(state, ground_action);

        if !self.pregoals.is_settled(&action) {
            if let Some(ids) = self.mutated.remove(&action) {
                self.lgg.entry(action.clone()).or_default().extend(ids);
            }
        }

        if newly_settled {
            let pending: Vec<RuleId> = self
                .lgg
                .get(&action)
                .into_iter()
                .flatten()
                .copied()
                .collect();
            for id in pending {
                self.mutate_rule(id);
                if let Some(set) = self.lgg.get_mut(&action) {
                    set.remove(&id);
                }
                self.mutated.entry(action.clone()).or_default().insert(id);
            }
            self.assert_disjoint(&action);
        }
        newly_settled
    }

    /// Specialize one rule and admit the new children to its slot.
    fn mutate_rule(&mut self, id: RuleId) -> usize {
        let parent = self.arena.get(id).clone();
        let action = parent.action().name().to_string();
        let variants = self.covering.variant_conditions(&action);
        let pregoal = if self.pregoals.is_settled(&action) {
            self.pregoals.get(&action).cloned()
        } else {
            None
        };

        let children = specialize_rule(
            &parent,
            &variants,
            &mut self.observations,
            pregoal.as_ref(),
            &self.config.induct,
        );

        let mut created = 0;
        for child in children {
            if self.arena.find(&child).is_some() {
                continue;
            }
            if !child.is_minimal(false) {
                continue;
            }
            let child_id = self.arena.insert(child, Some(id));
            let slot_id = self.ensure_slot(&action);
            if self.slots[slot_id.index()].add_new_rule(child_id, false) {
                self.arena.assign_slot(child_id, slot_id);
                created += 1;
            }
        }
        if created > 0 {
            debug!(action = %action, parent = %id, created, "rule specialized");
        }
        created
    }

    /// The two-level cross-entropy update: the slot distribution moves
    /// toward the elite slot-usage frequencies, then each used slot's rule
    /// distribution moves toward its elite rule-usage frequencies. Returns
    /// the summed absolute weight change.
    pub fn update_distributions(
        &mut self,
        elite_count: usize,
        slot_counts: &HashMap<SlotId, f64>,
        rule_counts: &HashMap<RuleId, f64>,
        step_size: f64,
    ) -> f64 {
        let mut change = self
            .slot_dist
            .update_towards(slot_counts, elite_count as f64, step_size);

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_fixed() {
                continue;
            }
            let total = slot_counts.get(&SlotId(index)).copied().unwrap_or(0.0);
            if total <= 0.0 {
                continue;
            }
            let filtered: HashMap<RuleId, f64> = rule_counts
                .iter()
                .filter(|(id, _)| slot.contains(**id))
                .map(|(id, count)| (*id, *count))
                .collect();
            change += slot.rules_mut().update_towards(&filtered, total, step_size);
        }

        self.last_change = change;
        debug!(change, "distributions updated");
        change
    }

    /// Re-specialize the current top rules of every slot, so the search
    /// keeps refining around whatever the update just favored, then prune
    /// the rules the update left with a negligible share.
    pub fn post_update_operations(&mut self) {
        let mut tops: Vec<RuleId> = Vec::new();
        for slot in &self.slots {
            for (id, _) in slot
                .rules()
                .ordered_by_weight()
                .into_iter()
                .take(self.config.resample_top)
            {
                tops.push(*id);
            }
        }
        for id in tops {
            self.mutate_rule(id);
        }
        self.prune_slots();
    }

    /// Destroy rules whose probability fell below the configured fraction
    /// of their slot's uniform share. The action's covering rule survives
    /// regardless of weight, as does a slot's last remaining rule.
    fn prune_slots(&mut self) {
        for index in 0..self.slots.len() {
            if self.slots[index].is_fixed() || self.slots[index].len() <= 1 {
                continue;
            }
            let keep = self.rlgg_ids.get(self.slots[index].action()).copied();
            let floor = self.config.prune_fraction / self.slots[index].len() as f64;
            let doomed: Vec<RuleId> = self.slots[index]
                .rules()
                .iter()
                .filter(|(id, weight)| *weight < floor && Some(**id) != keep)
                .map(|(&id, _)| id)
                .collect();
            for id in doomed {
                self.slots[index].remove_rule(id);
                debug!(slot = %SlotId(index), rule = %id, "pruned low-weight rule");
            }
        }
    }

    /// Freeze or unfreeze every slot for greedy best-policy extraction.
    pub fn freeze(&mut self, frozen: bool) {
        self.frozen = frozen;
        for slot in &mut self.slots {
            slot.freeze(frozen);
        }
    }

    /// Fold one evaluated policy's return into the stats of every rule it
    /// contained.
    pub fn record_return(&mut self, policy: &Policy, value: f64) {
        for rule in policy.rules() {
            self.arena.get_mut(rule.id).note_return(value);
        }
    }

    /// Per-slot rule/probability pairs, for persistence.
    pub fn slot_snapshot(&self) -> Vec<(String, Vec<(RelationalRule, f64)>)> {
        self.slots
            .iter()
            .map(|slot| {
                let rules = slot
                    .rules()
                    .iter()
                    .map(|(&id, weight)| (self.arena.get(id).clone(), weight))
                    .collect();
                (slot.action().to_string(), rules)
            })
            .collect()
    }

    /// Rebuild one slot from persisted rule/probability pairs. Weights are
    /// normalized after loading.
    pub fn load_slot(&mut self, action: &str, rules: Vec<(RelationalRule, f64)>) {
        let slot_id = self.ensure_slot(action);
        for (rule, weight) in rules {
            let id = match self.arena.find(&rule) {
                Some(id) => id,
                None => self.arena.insert(rule, None),
            };
            self.arena.assign_slot(id, slot_id);
            let slot = &mut self.slots[slot_id.index()];
            if !slot.contains(id) {
                slot.rules_mut().add(id, weight);
            }
        }
        self.slots[slot_id.index()].rules_mut().normalize();
    }

    fn assert_disjoint(&self, action: &str) {
        debug_assert!(
            {
                let empty = BTreeSet::new();
                let covered = self.covered.get(action).unwrap_or(&empty);
                let lgg = self.lgg.get(action).unwrap_or(&empty);
                let mutated = self.mutated.get(action).unwrap_or(&empty);
                covered.is_disjoint(lgg)
                    && covered.is_disjoint(mutated)
                    && lgg.is_disjoint(mutated)
            },
            "bookkeeping sets overlap for {action}"
        );
    }
}
