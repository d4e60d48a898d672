//! The induced covering rule for an action may only mention conditions
//! sharing a term with the action's arguments, and must keep shrinking
//! toward the least general generalization as examples accumulate.

use std::collections::BTreeSet;

use cer_core::schema::ValidActions;
use cer_core::{State, Term};
use cer_induct::{CoverageStage, Covering, InductConfig};

fn move_action(pairs: &[(&str, &str)]) -> ValidActions {
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
fn covering_minimality() {
    let mut covering = Covering::new(InductConfig::default());
    let state = State::from_text("(on a b) (clear a) (clear b)").unwrap();
    let covered = covering.cover_state(&state, &move_action(&[("a", "b")]));

    assert_eq!(covered.len(), 1);
    let rule = &covered[0].rule;
    let action_vars: BTreeSet<&str> = ["?X0", "?X1"].into();
    for condition in rule.conditions() {
        let vars = condition.variables();
        assert!(
            vars.iter().any(|v| action_vars.contains(v)),
            "condition {condition} references no action term"
        );
    }
    // All three facts touch `a` or `b`, so all three survive covering.
    assert_eq!(rule.conditions().len(), 3);
}

#[test]
fn lgg_reached_through_successive_generalization() {
    let config = InductConfig {
        lgg_inactivity: 2,
        ..InductConfig::default()
    };
    let mut covering = Covering::new(config);

    let scenarios = [
        "(on a b) (clear a) (clear b) (highest a)",
        "(on c d) (clear c) (clear d)",
        "(on e f) (clear e) (clear f)",
        "(on g h) (clear g) (clear h)",
    ];
    let instances = [("a", "b"), ("c", "d"), ("e", "f"), ("g", "h")];

    let mut last = None;
    for (text, pair) in scenarios.iter().zip(instances) {
        let state = State::from_text(text).unwrap();
        let covered = covering.cover_state(&state, &move_action(&[pair]));
        last = Some(covered.into_iter().next().unwrap());
    }

    let last = last.unwrap();
    assert!(last.newly_lgg);
    assert_eq!(covering.stage("move"), CoverageStage::Lgg);
    // `highest` appeared in one example only and cannot survive.
    assert!(last.rule.conditions().iter().all(|c| c.name() != "highest"));
}
