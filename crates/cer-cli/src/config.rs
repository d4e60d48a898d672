use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::blocks::GoalKind;

/// Training settings, loadable from a YAML file. Every field has a
/// default, so an empty file (or none at all) trains stack-of-five.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainSettings {
    /// Registered domain name.
    pub domain: String,
    pub seed: u64,
    pub blocks: usize,
    pub goal: GoalKind,
    /// Step cap per episode.
    pub max_steps: usize,

    pub population_constant: usize,
    pub elite_fraction: f64,
    pub step_size: f64,
    pub episodes_per_policy: usize,
    pub convergence_threshold: f64,
    pub max_episodes: usize,
    pub value_weighted_counts: bool,

    /// Where to persist the trained generator.
    pub generator_file: Option<PathBuf>,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            domain: "blocksworld".to_string(),
            seed: 0,
            blocks: 5,
            goal: GoalKind::Stack,
            max_steps: 30,
            population_constant: 10,
            elite_fraction: 0.1,
            step_size: 0.6,
            episodes_per_policy: 3,
            convergence_threshold: 0.01,
            max_episodes: 5_000,
            value_weighted_counts: false,
            generator_file: None,
        }
    }
}

impl TrainSettings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(settings)
    }
}
