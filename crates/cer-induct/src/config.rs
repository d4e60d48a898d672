/// Tunables for covering and specialization.
///
/// The inactivity thresholds are empirical: how many consecutive
/// observations without change before a structure is considered converged.
/// They are configuration, not semantics; domains with noisy relevant-fact
/// sets want larger values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InductConfig {
    /// Consecutive covering observations without a body change before a
    /// covered rule is declared maximally general (LGG).
    pub lgg_inactivity: u32,

    /// Consecutive pre-goal recordings without change before the pre-goal
    /// is considered settled and specialization may fire.
    pub pregoal_inactivity: u32,

    /// Smallest width a numeric sub-range may have after splitting;
    /// narrower candidates are discarded.
    pub min_range_width: f64,
}

impl Default for InductConfig {
    fn default() -> Self {
        Self {
            lgg_inactivity: 3,
            pregoal_inactivity: 5,
            min_range_width: 1e-6,
        }
    }
}
