use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use cer_core::schema::ValidActions;
use cer_core::{RelationalPredicate, RelationalRule, State, Term};
use cer_observe::ConditionBeliefs;

use crate::config::InductConfig;

/// Per-action progress through the induction state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageStage {
    /// No rule yet.
    Uncovered,
    /// A covering rule exists but may still generalize further.
    Covered,
    /// The body has been stable long enough: maximally general.
    Lgg,
}

/// A rule produced or refined by one covering pass.
#[derive(Debug, Clone)]
pub struct CoveredRule {
    pub rule: RelationalRule,
    /// The body changed this pass (new rule or further generalization).
    pub refined: bool,
    /// This pass promoted the rule to maximally general.
    pub newly_lgg: bool,
}

#[derive(Debug)]
struct ActionCoverage {
    action: RelationalPredicate,
    body: BTreeSet<RelationalPredicate>,
    observations: u64,
    unchanged: u32,
    stage: CoverageStage,
    /// Co-occurrence beliefs over the action's relevant conditions; the
    /// variants feed specialization.
    beliefs: ConditionBeliefs,
}

/// The covering algorithm: one RLGG per action type, shrunk by
/// intersection on every observation.
#[derive(Debug)]
pub struct Covering {
    config: InductConfig,
    per_action: BTreeMap<String, ActionCoverage>,
}

impl Covering {
    pub fn new(config: InductConfig) -> Self {
        Self {
            config,
            per_action: BTreeMap::new(),
        }
    }

    pub fn stage(&self, action: &str) -> CoverageStage {
        self.per_action
            .get(action)
            .map(|c| c.stage)
            .unwrap_or(CoverageStage::Uncovered)
    }

    /// Variant (not-always-true) conditions observed for `action`,
    /// canonicalized to the action's variables. Specialization candidates.
    pub fn variant_conditions(&self, action: &str) -> BTreeSet<RelationalPredicate> {
        self.per_action
            .get(action)
            .map(|c| c.beliefs.variants().clone())
            .unwrap_or_default()
    }

    /// The current maximally-general body for `action`, if covered.
    pub fn current_rule(&self, action: &str) -> Option<RelationalRule> {
        let coverage = self.per_action.get(action)?;
        Some(RelationalRule::new(
            coverage.body.iter().cloned().collect(),
            coverage.action.clone(),
        ))
    }

    /// Fold one state's valid actions into the per-action RLGGs.
    ///
    /// For every valid instance, the facts sharing a term with the
    /// instance's arguments are rewritten to the action's canonical
    /// variables and intersected into the running body: the largest rule
    /// body consistent with all positive examples seen so far.
    pub fn cover_state(&mut self, state: &State, valid: &ValidActions) -> Vec<CoveredRule> {
        let mut covered = Vec::new();
        for (name, instances) in valid {
            if instances.is_empty() {
                continue;
            }
            if let Some(result) = self.cover_action(state, name, instances) {
                covered.push(result);
            }
        }
        covered
    }

    fn cover_action(
        &mut self,
        state: &State,
        name: &str,
        instances: &[Vec<Term>],
    ) -> Option<CoveredRule> {
        let mut instance_bodies = Vec::new();
        for args in instances {
            instance_bodies.push(instance_body(state, args));
        }
        let mut merged = instance_bodies.pop()?;
        for body in instance_bodies {
            merged = intersect_bodies(&merged, &body);
        }

        let arity = instances[0].len();
        let action = RelationalPredicate::new(
            name,
            (0..arity).map(Term::canonical_variable).collect(),
        );

        let coverage = self
            .per_action
            .entry(name.to_string())
            .or_insert_with(|| ActionCoverage {
                action,
                body: merged.clone(),
                observations: 0,
                unchanged: 0,
                stage: CoverageStage::Uncovered,
                beliefs: ConditionBeliefs::new(),
            });
        coverage.observations += 1;
        coverage.beliefs.note(merged.iter().cloned().collect());

        let refined = if coverage.observations == 1 {
            true
        } else {
            let next = intersect_bodies(&coverage.body, &merged);
            let changed = next != coverage.body;
            coverage.body = next;
            changed
        };

        if refined {
            coverage.unchanged = 0;
        } else {
            coverage.unchanged += 1;
        }

        let was_lgg = coverage.stage == CoverageStage::Lgg;
        coverage.stage = if coverage.unchanged >= self.config.lgg_inactivity {
            CoverageStage::Lgg
        } else {
            CoverageStage::Covered
        };
        let newly_lgg = !was_lgg && coverage.stage == CoverageStage::Lgg;

        if refined || newly_lgg {
            debug!(
                action = name,
                body = coverage.body.len(),
                unchanged = coverage.unchanged,
                "covering pass"
            );
        }

        Some(CoveredRule {
            rule: RelationalRule::new(
                coverage.body.iter().cloned().collect(),
                coverage.action.clone(),
            ),
            refined,
            newly_lgg,
        })
    }
}

/// Relevant facts for one action instance, rewritten into the action's
/// canonical frame: argument terms become `?X0..?Xn`, other constants
/// become anonymous `?Y` variables so bodies from different instances can
/// intersect.
fn instance_body(state: &State, args: &[Term]) -> BTreeSet<RelationalPredicate> {
    let mut to_canonical: BTreeMap<String, Term> = BTreeMap::new();
    for (position, arg) in args.iter().enumerate() {
        if let Term::Constant(name) | Term::Variable(name) = arg {
            to_canonical
                .entry(name.clone())
                .or_insert_with(|| Term::canonical_variable(position));
        }
    }

    let mut anonymous = 0usize;
    let mut body = BTreeSet::new();
    for fact in state.relevant_to(args) {
        let rewritten_args: Vec<Term> = fact
            .args()
            .iter()
            .map(|arg| match arg {
                Term::Constant(name) | Term::Variable(name) => {
                    if let Some(canonical) = to_canonical.get(name) {
                        canonical.clone()
                    } else {
                        let var = Term::Variable(format!("?Y{anonymous}"));
                        anonymous += 1;
                        to_canonical.insert(name.clone(), var.clone());
                        var
                    }
                }
                other => other.clone(),
            })
            .collect();
        let rewritten = RelationalPredicate::new(fact.name(), rewritten_args);
        body.insert(if fact.is_negated() {
            rewritten.negate()
        } else {
            rewritten
        });
    }
    body
}

/// Intersection of two bodies, with numeric hulls: conditions equal up to
/// one numeric argument merge into a range covering both observations
/// instead of being dropped.
pub(crate) fn intersect_bodies(
    a: &BTreeSet<RelationalPredicate>,
    b: &BTreeSet<RelationalPredicate>,
) -> BTreeSet<RelationalPredicate> {
    let mut merged: BTreeSet<RelationalPredicate> = a.intersection(b).cloned().collect();
    for fact_a in a {
        if merged.contains(fact_a) {
            continue;
        }
        for fact_b in b {
            if let Some(hull) = numeric_hull(fact_a, fact_b) {
                merged.insert(hull);
                break;
            }
        }
    }
    merged
}

/// If `a` and `b` differ only in numeric arguments, the fact whose numeric
/// arguments are widened to cover both. Otherwise `None`.
fn numeric_hull(
    a: &RelationalPredicate,
    b: &RelationalPredicate,
) -> Option<RelationalPredicate> {
    if a.name() != b.name() || a.arity() != b.arity() || a.is_negated() != b.is_negated() {
        return None;
    }
    let mut widened = Vec::with_capacity(a.arity());
    let mut any_numeric = false;
    for (ta, tb) in a.args().iter().zip(b.args()) {
        if ta == tb {
            widened.push(ta.clone());
            continue;
        }
        let extent = |t: &Term| match *t {
            Term::Number(n) => Some((n, n)),
            Term::Range { min, max } => Some((min, max)),
            _ => None,
        };
        let (amin, amax) = extent(ta)?;
        let (bmin, bmax) = extent(tb)?;
        any_numeric = true;
        widened.push(Term::Range {
            min: amin.min(bmin),
            max: amax.max(bmax),
        });
    }
    if !any_numeric {
        return None;
    }
    let hull = RelationalPredicate::new(a.name(), widened);
    Some(if a.is_negated() { hull.negate() } else { hull })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_move(pairs: &[(&str, &str)]) -> ValidActions {
        let mut valid = ValidActions::new();
        valid.insert(
            "move".to_string(),
            pairs
                .iter()
                .map(|(a, b)| vec![Term::constant(*a), Term::constant(*b)])
                .collect(),
        );
        valid
    }

    #[test]
    fn covering_uses_only_action_relevant_facts() {
        let mut covering = Covering::new(InductConfig::default());
        let state = State::from_text("(on a b) (clear a) (clear b) (far x y)").unwrap();
        let covered = covering.cover_state(&state, &valid_move(&[("a", "b")]));
        assert_eq!(covered.len(), 1);
        let rule = &covered[0].rule;
        // Action terms map to ?X0/?X1; (far x y) shares neither term.
        assert!(rule.conditions().iter().all(|c| c.name() != "far"));
        assert!(!rule.conditions().is_empty());
    }

    #[test]
    fn repeated_observations_intersect_the_body() {
        let mut covering = Covering::new(InductConfig::default());
        let s1 = State::from_text("(on a b) (clear a) (clear b) (highest a)").unwrap();
        covering.cover_state(&s1, &valid_move(&[("a", "b")]));

        // Second example lacks `highest`: the body must shrink.
        let s2 = State::from_text("(on c d) (clear c) (clear d)").unwrap();
        let covered = covering.cover_state(&s2, &valid_move(&[("c", "d")]));
        let rule = &covered[0].rule;
        assert!(covered[0].refined);
        assert!(rule.conditions().iter().all(|c| c.name() != "highest"));
    }

    #[test]
    fn stability_promotes_to_lgg() {
        let config = InductConfig {
            lgg_inactivity: 2,
            ..InductConfig::default()
        };
        let mut covering = Covering::new(config);
        let state = State::from_text("(clear a) (clear b)").unwrap();
        let valid = valid_move(&[("a", "b")]);

        covering.cover_state(&state, &valid);
        assert_eq!(covering.stage("move"), CoverageStage::Covered);
        covering.cover_state(&state, &valid);
        assert_eq!(covering.stage("move"), CoverageStage::Covered);
        let covered = covering.cover_state(&state, &valid);
        assert!(covered[0].newly_lgg);
        assert_eq!(covering.stage("move"), CoverageStage::Lgg);
    }

    #[test]
    fn multiple_instances_intersect_within_one_state() {
        let mut covering = Covering::new(InductConfig::default());
        let state =
            State::from_text("(on a b) (clear a) (clear b) (clear c) (clear d)").unwrap();
        // Two valid instances; only `clear` holds for both argument pairs.
        let covered = covering.cover_state(&state, &valid_move(&[("a", "b"), ("c", "d")]));
        let rule = &covered[0].rule;
        assert!(rule.conditions().iter().all(|c| c.name() == "clear"));
    }

    #[test]
    fn numeric_arguments_widen_to_ranges() {
        let a: BTreeSet<RelationalPredicate> =
            [cer_core::parse_predicate("(height ?X0 2)").unwrap()].into();
        let b: BTreeSet<RelationalPredicate> =
            [cer_core::parse_predicate("(height ?X0 5)").unwrap()].into();
        let merged = intersect_bodies(&a, &b);
        assert_eq!(merged.len(), 1);
        let hull = merged.iter().next().unwrap();
        assert_eq!(hull.args()[1], Term::range(2.0, 5.0));
    }

    #[test]
    fn variants_accumulate_for_specialization() {
        let mut covering = Covering::new(InductConfig::default());
        let s1 = State::from_text("(clear a) (clear b) (highest a)").unwrap();
        covering.cover_state(&s1, &valid_move(&[("a", "b")]));
        let s2 = State::from_text("(clear a) (clear b)").unwrap();
        covering.cover_state(&s2, &valid_move(&[("a", "b")]));

        let variants = covering.variant_conditions("move");
        assert!(variants
            .contains(&cer_core::parse_predicate("(highest ?X0)").unwrap()));
    }
}
