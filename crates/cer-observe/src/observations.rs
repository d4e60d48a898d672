use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use cer_core::schema::ValidActions;
use cer_core::{PredicateSignature, RelationalPredicate, Result, State, Term};

use crate::background::{BackgroundRule, NonRedundantBackgroundKnowledge};
use crate::beliefs::ConditionBeliefs;
use crate::invariants::InvariantObservations;
use crate::simplify::{simplify_conditions, SimplifyOutcome};

/// Result of folding one state into the observations.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// A previously never-seen predicate appeared; existing rules are stale
    /// and covering must re-trigger.
    pub stale: bool,
    /// Relevant facts per valid action instance, keyed by action name, in
    /// the same order as the instances in the scanned `ValidActions`.
    pub action_relevant: BTreeMap<String, Vec<Vec<RelationalPredicate>>>,
}

/// The agent's accumulated model of its environment.
///
/// Owned by the learning session and passed explicitly to induction and
/// optimization; there is no global instance.
#[derive(Debug, Default)]
pub struct AgentObservations {
    /// Co-occurrence beliefs per predicate name.
    beliefs: BTreeMap<String, ConditionBeliefs>,
    /// Beliefs about what holds when a fact is absent, keyed by the absent
    /// fact's argument structure.
    negated_beliefs: BTreeMap<String, ConditionBeliefs>,
    invariants: InvariantObservations,
    background: NonRedundantBackgroundKnowledge,
    background_stale: bool,
    /// Every ground fact ever observed, for absence tracking.
    seen_facts: BTreeSet<RelationalPredicate>,
    /// Canonical head per predicate name (fixes arity for synthesis).
    heads: BTreeMap<String, RelationalPredicate>,
    /// Declared signatures, checked against every scanned fact.
    declared: BTreeMap<String, PredicateSignature>,
}

impl AgentObservations {
    pub fn new(declared: &[PredicateSignature]) -> Self {
        Self {
            invariants: InvariantObservations::new(
                declared.iter().map(|s| s.name.clone()),
            ),
            declared: declared
                .iter()
                .map(|s| (s.name.clone(), s.clone()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn invariants(&self) -> &InvariantObservations {
        &self.invariants
    }

    pub fn beliefs_for(&self, predicate: &str) -> Option<&ConditionBeliefs> {
        self.beliefs.get(predicate)
    }

    pub fn negated_beliefs_for(&self, structure: &str) -> Option<&ConditionBeliefs> {
        self.negated_beliefs.get(structure)
    }

    /// Index one observed state: co-occurrence recording for every fact,
    /// absence recording for known facts missing from the state, invariant
    /// mining, and relevant-fact gathering for every valid action instance.
    /// A fact violating its declared signature aborts the scan before any
    /// table is touched.
    pub fn scan_state(
        &mut self,
        state: &State,
        valid_actions: &ValidActions,
    ) -> Result<ScanReport> {
        for fact in state.facts() {
            if let Some(signature) = self.declared.get(fact.name()) {
                fact.check_signature(signature)?;
            }
        }

        let stale = self.invariants.scan(state);
        if stale {
            debug!(scans = self.invariants.scans(), "unseen predicate appeared; rules are stale");
        }

        for fact in state.facts() {
            let (head, _) = fact.canonicalize();
            self.heads.entry(fact.name().to_string()).or_insert(head);

            let relative = self.relative_facts(state, fact);
            self.beliefs
                .entry(fact.name().to_string())
                .or_default()
                .note(relative);
        }

        // Facts known from earlier states but absent now feed the negated
        // table: what holds while this fact is false.
        let absent: Vec<RelationalPredicate> = self
            .seen_facts
            .iter()
            .filter(|f| !state.contains(f))
            .cloned()
            .collect();
        for fact in absent {
            let relative = self.relative_facts(state, &fact);
            self.negated_beliefs
                .entry(fact.argument_structure())
                .or_default()
                .note(relative);
        }

        self.seen_facts.extend(state.facts().iter().cloned());
        self.background_stale = true;

        let mut action_relevant = BTreeMap::new();
        for (action, instances) in valid_actions {
            let per_instance: Vec<Vec<RelationalPredicate>> = instances
                .iter()
                .map(|args| {
                    state
                        .relevant_to(args)
                        .into_iter()
                        .cloned()
                        .collect()
                })
                .collect();
            action_relevant.insert(action.clone(), per_instance);
        }

        Ok(ScanReport {
            stale,
            action_relevant,
        })
    }

    /// Facts of `state` sharing a term with `fact`, excluding `fact`
    /// itself, with `fact`'s own arguments rewritten to canonical
    /// variables.
    fn relative_facts(
        &self,
        state: &State,
        fact: &RelationalPredicate,
    ) -> BTreeSet<RelationalPredicate> {
        let (_, inverse) = fact.canonicalize();
        // inverse maps canonical var -> original term; invert it.
        let to_canonical: BTreeMap<String, Term> = inverse
            .iter()
            .filter_map(|(canonical, term)| match term {
                Term::Constant(name) => {
                    Some((name.clone(), Term::Variable(canonical.clone())))
                }
                Term::Variable(name) => {
                    Some((name.clone(), Term::Variable(canonical.clone())))
                }
                Term::Number(_) | Term::Range { .. } => None,
            })
            .collect();

        state
            .relevant_to(fact.args())
            .into_iter()
            .filter(|f| *f != fact)
            .map(|f| rewrite_terms(f, &to_canonical))
            .collect()
    }

    /// Background knowledge, resynthesized from the belief tables when
    /// observations changed since the last call.
    pub fn background_knowledge(&mut self) -> &NonRedundantBackgroundKnowledge {
        if self.background_stale {
            self.background = self.synthesize_background();
            self.background_stale = false;
            debug!(rules = self.background.len(), "background knowledge resynthesized");
        }
        &self.background
    }

    fn synthesize_background(&self) -> NonRedundantBackgroundKnowledge {
        let mut bk = NonRedundantBackgroundKnowledge::new();

        // head => G for every always-true co-occurrence; upgraded to an
        // equivalence when the reverse direction also holds.
        let mut pairs: BTreeSet<(RelationalPredicate, RelationalPredicate)> = BTreeSet::new();
        for (name, beliefs) in &self.beliefs {
            // Beliefs from a single observation are speculation, not
            // knowledge; wait for corroboration.
            if beliefs.observations() < 2 {
                continue;
            }
            let Some(head) = self.heads.get(name) else {
                continue;
            };
            for always in beliefs.always_true() {
                if always.name() == head.name() {
                    continue;
                }
                pairs.insert((head.clone(), always.clone()));
            }
            for never in beliefs.never_true() {
                if never.name() == head.name() {
                    continue;
                }
                pairs.insert((head.clone(), never.negate()));
            }
        }

        // ¬F => G rules from the negated table.
        for (structure, beliefs) in &self.negated_beliefs {
            if beliefs.observations() < 2 {
                continue;
            }
            let Some(name) = structure.split('/').next() else {
                continue;
            };
            let Some(head) = self.heads.get(name) else {
                continue;
            };
            for always in beliefs.always_true() {
                if always.name() != head.name() {
                    pairs.insert((head.negate(), always.clone()));
                }
            }
        }

        for (pre, post) in &pairs {
            let reverse_holds = pairs.contains(&(post.clone(), pre.clone()));
            if reverse_holds {
                // Mutual implication: one equivalence, oriented with the
                // smaller predicate as the RHS. Only the pair whose `pre`
                // orders first inserts, so the mirror is not duplicated.
                if pre < post {
                    bk.insert(BackgroundRule::equivalence(vec![post.clone()], pre.clone()));
                }
            } else {
                bk.insert(BackgroundRule::implication(vec![pre.clone()], post.clone()));
            }
        }
        bk
    }

    /// Simplify a candidate condition set against current knowledge.
    pub fn simplify_rule(&mut self, conditions: &[RelationalPredicate]) -> SimplifyOutcome {
        self.background_knowledge();
        simplify_conditions(conditions, &self.background, &self.invariants)
    }
}

fn rewrite_terms(
    fact: &RelationalPredicate,
    to_canonical: &BTreeMap<String, Term>,
) -> RelationalPredicate {
    let args = fact
        .args()
        .iter()
        .map(|arg| match arg {
            Term::Constant(name) | Term::Variable(name) => to_canonical
                .get(name)
                .cloned()
                .unwrap_or_else(|| arg.clone()),
            other => other.clone(),
        })
        .collect();
    let rewritten = RelationalPredicate::new(fact.name(), args);
    if fact.is_negated() {
        rewritten.negate()
    } else {
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cer_core::parse_predicate;

    fn sig(name: &str, arity: usize) -> PredicateSignature {
        PredicateSignature::new(name, vec!["object".to_string(); arity])
    }

    fn declared() -> Vec<PredicateSignature> {
        vec![sig("on", 2), sig("clear", 1), sig("highest", 1), sig("above", 2)]
    }

    fn scan(obs: &mut AgentObservations, text: &str) -> ScanReport {
        obs.scan_state(&State::from_text(text).unwrap(), &ValidActions::new())
            .unwrap()
    }

    #[test]
    fn co_occurrence_builds_always_sets() {
        let mut obs = AgentObservations::new(&declared());
        scan(&mut obs, "(on a b) (above a b) (clear a)");
        scan(&mut obs, "(on c d) (above c d) (clear c)");

        let beliefs = obs.beliefs_for("on").expect("beliefs for on");
        assert!(beliefs
            .always_true()
            .contains(&parse_predicate("(above ?X0 ?X1)").unwrap()));
        assert!(beliefs
            .always_true()
            .contains(&parse_predicate("(clear ?X0)").unwrap()));
    }

    #[test]
    fn synthesis_produces_equivalence_for_mutual_implication() {
        let mut obs = AgentObservations::new(&declared());
        scan(&mut obs, "(on a b) (above a b)");
        scan(&mut obs, "(on c d) (above c d)");

        let bk = obs.background_knowledge();
        let equivalences: Vec<_> = bk.rules().filter(|r| r.is_equivalence()).collect();
        assert_eq!(equivalences.len(), 1, "rules: {:?}", bk.rules().collect::<Vec<_>>());
    }

    #[test]
    fn relevant_facts_follow_action_arguments() {
        let mut obs = AgentObservations::new(&declared());
        let state = State::from_text("(on a b) (clear a) (clear c) (highest c)").unwrap();
        let mut valid = ValidActions::new();
        valid.insert(
            "move".to_string(),
            vec![vec![Term::constant("a"), Term::constant("b")]],
        );
        let report = obs.scan_state(&state, &valid).unwrap();
        let relevant = &report.action_relevant["move"][0];
        assert!(relevant.iter().all(|f| {
            f.shares_term(&[Term::constant("a")]) || f.shares_term(&[Term::constant("b")])
        }));
        assert_eq!(relevant.len(), 2);
    }

    #[test]
    fn declared_signature_violations_abort_the_scan() {
        let mut obs = AgentObservations::new(&declared());
        // `on` is declared binary.
        let state = State::from_text("(on a) (clear a)").unwrap();
        let err = obs
            .scan_state(&state, &ValidActions::new())
            .unwrap_err();
        assert!(matches!(err, cer_core::CerError::SchemaMismatch { .. }));
        // Nothing was recorded.
        assert!(obs.beliefs_for("clear").is_none());
        assert_eq!(obs.invariants().scans(), 0);
    }

    #[test]
    fn absence_feeds_negated_beliefs() {
        let mut obs = AgentObservations::new(&declared());
        scan(&mut obs, "(on a b) (clear a)");
        // `(on a b)` gone; `(clear a)` holds while it is absent.
        scan(&mut obs, "(clear a) (clear b)");
        scan(&mut obs, "(clear a) (clear b)");

        let negated = obs.negated_beliefs_for("on/b,b").expect("negated table entry");
        assert!(negated
            .always_true()
            .contains(&parse_predicate("(clear ?X0)").unwrap()));
    }
}
