/// Optimization loop tunables.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    /// Population size multiplier: samples per iteration is this times
    /// the larger of the biggest slot's rule count and the slot count,
    /// never less than this constant itself.
    pub population_constant: usize,
    /// Fraction of the population kept as elites.
    pub elite_fraction: f64,
    /// Step size of the incremental distribution update, in (0, 1].
    pub step_size: f64,
    /// Episodes averaged per sampled policy.
    pub episodes_per_policy: usize,
    /// Total weight change below which the generator counts as converged.
    pub convergence_threshold: f64,
    /// Hard episode budget.
    pub max_episodes: usize,
    /// Episode cap for the preliminary covering phase.
    pub max_preliminary_episodes: usize,
    /// Weight elite counts by a linear function of the elite's return
    /// instead of counting each elite once.
    pub value_weighted_counts: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_constant: 10,
            elite_fraction: 0.1,
            step_size: 0.6,
            episodes_per_policy: 3,
            convergence_threshold: 0.01,
            max_episodes: 10_000,
            max_preliminary_episodes: 100,
            value_weighted_counts: false,
        }
    }
}
