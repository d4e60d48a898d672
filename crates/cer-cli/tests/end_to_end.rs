//! Whole-loop test: covering, pre-goal settling, specialization, and the
//! cross-entropy updates, driven by real blocks-world episodes.

use cer_cli::blocks::{BlocksEvaluator, BlocksWorld, GoalKind};
use cer_core::DomainSchema;
use cer_opt::{load_generator, save_generator, LearningSession, OptimizerConfig};
use cer_policy::{GeneratorConfig, PolicyGenerator};

fn session(goal: GoalKind, seed: u64) -> LearningSession<BlocksEvaluator> {
    let world = BlocksWorld::new(3, goal);
    let signatures = world.predicates().to_vec();
    let optimizer = OptimizerConfig {
        max_episodes: 600,
        episodes_per_policy: 1,
        population_constant: 5,
        elite_fraction: 0.2,
        convergence_threshold: 0.05,
        ..OptimizerConfig::default()
    };
    let evaluator = BlocksEvaluator::new(world, 20);
    LearningSession::new(
        &signatures,
        GeneratorConfig::default(),
        optimizer,
        evaluator,
        seed,
    )
}

#[test]
fn training_covers_both_actions_and_settles() {
    let mut session = session(GoalKind::Unstack, 7);
    let report = session.run();

    assert!(report.episodes > 0);
    assert!(report.iterations > 0);

    let generator = session.generator();
    assert!(generator.slot_for_action("tofloor").is_some());
    assert!(generator.slot_for_action("move").is_some());
    assert!(generator.is_settled());

    // Greedy extraction yields a deterministic policy over both actions.
    let best = session.best_policy();
    assert!(best.covers_action("tofloor"));
    assert!(best.covers_action("move"));
}

#[test]
fn trained_generator_survives_persistence() {
    let mut session = session(GoalKind::Stack, 21);
    session.run();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("generator.txt");
    save_generator(session.generator(), &path).unwrap();

    let world = BlocksWorld::new(3, GoalKind::Stack);
    let mut restored =
        PolicyGenerator::new(world.predicates(), GeneratorConfig::default());
    load_generator(&path, &mut restored).unwrap();

    assert_eq!(restored.num_slots(), session.generator().num_slots());
    for (_, slot) in session.generator().slots() {
        let restored_slot = restored
            .slot_for_action(slot.action())
            .map(|id| restored.slot(id))
            .expect("slot survives the round trip");
        assert_eq!(restored_slot.len(), slot.len());
    }
}
