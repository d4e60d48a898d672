use std::collections::HashMap;

use tracing::{debug, info, warn};

use cer_core::rng::{derive_seed, SplitMix64};
use cer_core::{PredicateSignature, RunningStats};
use cer_policy::{GeneratorConfig, Policy, PolicyGenerator, RuleId, SlotId};

use crate::config::OptimizerConfig;
use crate::evaluate::Evaluator;

/// One evaluated policy awaiting elite selection.
#[derive(Debug)]
pub(crate) struct Sample {
    pub(crate) policy: Policy,
    pub(crate) value: f64,
    /// Position within the population; later samples win ranking ties, so
    /// recent draws are preferred under equal returns.
    pub(crate) order: usize,
}

/// What a finished run looked like.
#[derive(Debug)]
pub struct TrainingReport {
    pub episodes: usize,
    pub iterations: usize,
    pub last_change: f64,
    pub converged: bool,
    /// Returns achieved by elite samples across all iterations.
    pub elite_returns: RunningStats,
}

/// The owning context for one learning run: generator, evaluator, RNG,
/// and episode accounting. Dropping the session discards all learned
/// state unless it was persisted first.
#[derive(Debug)]
pub struct LearningSession<E> {
    config: OptimizerConfig,
    generator: PolicyGenerator,
    evaluator: E,
    rng: SplitMix64,
    run_seed: u64,
    episodes: usize,
}

impl<E: Evaluator> LearningSession<E> {
    pub fn new(
        signatures: &[PredicateSignature],
        generator_config: GeneratorConfig,
        config: OptimizerConfig,
        evaluator: E,
        seed: u64,
    ) -> Self {
        Self {
            config,
            generator: PolicyGenerator::new(signatures, generator_config),
            evaluator,
            rng: SplitMix64::new(seed),
            run_seed: seed,
            episodes: 0,
        }
    }

    pub fn generator(&self) -> &PolicyGenerator {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut PolicyGenerator {
        &mut self.generator
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Sample-evaluate-update until convergence or the episode budget.
    pub fn run(&mut self) -> TrainingReport {
        self.preliminary_phase();

        let mut iterations = 0;
        let mut elite_returns = RunningStats::default();
        let mut converged = false;

        'iteration: while self.episodes < self.config.max_episodes && !converged {
            let population = self.population_size();
            let mut samples: Vec<Sample> = Vec::with_capacity(population);

            for order in 0..population {
                if self.episodes >= self.config.max_episodes {
                    break;
                }
                let policy = self.generator.generate_policy(&mut self.rng);
                let Some(value) = self.evaluate_policy(&policy) else {
                    continue;
                };
                self.generator.record_return(&policy, value);
                samples.push(Sample {
                    policy,
                    value,
                    order,
                });
                if self.generator.take_restart() {
                    debug!("rules went stale; discarding partial population");
                    continue 'iteration;
                }
            }
            if samples.is_empty() {
                continue;
            }

            let elite_count = self.elite_count(samples.len());
            rank_samples(&mut samples);
            samples.truncate(elite_count);
            for sample in &samples {
                elite_returns.update(sample.value);
            }

            let (slot_counts, rule_counts) =
                tally(&samples, self.config.value_weighted_counts);
            let change = self.generator.update_distributions(
                elite_count,
                &slot_counts,
                &rule_counts,
                self.config.step_size,
            );
            self.generator.post_update_operations();
            iterations += 1;
            info!(
                iterations,
                episodes = self.episodes,
                change,
                elite_mean = elite_returns.mean(),
                "iteration complete"
            );
            converged = self.generator.is_converged(self.config.convergence_threshold);
        }

        TrainingReport {
            episodes: self.episodes,
            iterations,
            last_change: self.generator.last_change(),
            converged,
            elite_returns,
        }
    }

    /// Run episodes without distribution updates until every action type
    /// is covered and all covering rules are maximally general. Policies
    /// here exist only to drive the agent through states worth covering.
    fn preliminary_phase(&mut self) {
        let mut used = 0;
        while used < self.config.max_preliminary_episodes && !self.generator.is_settled() {
            let policy = self.generator.generate_policy(&mut self.rng);
            let seed = derive_seed(self.run_seed, self.episodes as u64);
            self.episodes += 1;
            used += 1;
            if let Err(error) = self
                .evaluator
                .evaluate(&policy, &mut self.generator, seed)
            {
                warn!(%error, "preliminary episode failed");
            }
            self.generator.take_restart();
        }
        debug!(
            episodes = used,
            settled = self.generator.is_settled(),
            "preliminary covering finished"
        );
    }

    /// Average return over the configured episodes per policy, or `None`
    /// when any episode errors; the sample is then dropped.
    fn evaluate_policy(&mut self, policy: &Policy) -> Option<f64> {
        let mut stats = RunningStats::default();
        for _ in 0..self.config.episodes_per_policy.max(1) {
            let seed = derive_seed(self.run_seed, self.episodes as u64);
            self.episodes += 1;
            match self.evaluator.evaluate(policy, &mut self.generator, seed) {
                Ok(evaluation) => stats.update(evaluation.value),
                Err(error) => {
                    warn!(%error, "episode failed; dropping sample");
                    return None;
                }
            }
        }
        Some(stats.mean())
    }

    fn population_size(&self) -> usize {
        let base = self
            .generator
            .max_slot_size()
            .max(self.generator.num_slots())
            .max(1);
        self.config.population_constant * base
    }

    fn elite_count(&self, population: usize) -> usize {
        ((population as f64 * self.config.elite_fraction).ceil() as usize).clamp(1, population)
    }

    /// Greedy extraction: freeze the generator, take the deterministic
    /// most-likely policy, unfreeze.
    pub fn best_policy(&mut self) -> Policy {
        self.generator.freeze(true);
        let policy = self.generator.generate_policy(&mut self.rng);
        self.generator.freeze(false);
        policy
    }
}

/// Descending by value; ties go to the later (more recent) sample.
pub(crate) fn rank_samples(samples: &mut [Sample]) {
    samples.sort_by(|a, b| b.value.total_cmp(&a.value).then(b.order.cmp(&a.order)));
}

/// Per-slot and per-rule usage counts over the elite samples. Only rules
/// drawn from distributions count; appended fallbacks do not. With value
/// weighting, each elite contributes a weight linear in its return,
/// scaled so the weights still sum to the elite count.
pub(crate) fn tally(
    elites: &[Sample],
    value_weighted: bool,
) -> (HashMap<SlotId, f64>, HashMap<RuleId, f64>) {
    let weights: Vec<f64> = if value_weighted && elites.len() > 1 {
        let max = elites.iter().map(|s| s.value).fold(f64::NEG_INFINITY, f64::max);
        let min = elites.iter().map(|s| s.value).fold(f64::INFINITY, f64::min);
        let span = max - min;
        let raw: Vec<f64> = elites
            .iter()
            .map(|s| {
                if span > 0.0 {
                    0.5 + 0.5 * (s.value - min) / span
                } else {
                    1.0
                }
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        let scale = elites.len() as f64 / sum;
        raw.into_iter().map(|w| w * scale).collect()
    } else {
        vec![1.0; elites.len()]
    };

    let mut slot_counts = HashMap::new();
    let mut rule_counts = HashMap::new();
    for (sample, weight) in elites.iter().zip(weights) {
        for rule in sample.policy.sampled_rules() {
            *slot_counts.entry(rule.slot).or_insert(0.0) += weight;
            *rule_counts.entry(rule.id).or_insert(0.0) += weight;
        }
    }
    (slot_counts, rule_counts)
}
