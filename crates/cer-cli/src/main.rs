//! Training CLI for the relational cross-entropy learner.
//!
//! - `cer train` - learn a policy on a registered domain
//! - `cer show`  - print a persisted generator's slots

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use cer_core::{DomainRegistry, PredicateSignature};
use cer_opt::{load_generator, save_generator, LearningSession, OptimizerConfig};
use cer_policy::{GeneratorConfig, PolicyGenerator};

use cer_cli::blocks::{BlocksEvaluator, BlocksWorld};
use cer_cli::config::TrainSettings;

#[derive(Parser)]
#[command(name = "cer")]
#[command(about = "Relational cross-entropy reinforcement learner", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a policy
    Train {
        /// YAML settings file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the run seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override where the trained generator is saved
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the slots of a persisted generator
    Show {
        /// Generator file written by `cer train`
        generator: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Train {
            config,
            seed,
            output,
        } => {
            let mut settings = TrainSettings::load(config.as_deref())?;
            if let Some(seed) = seed {
                settings.seed = seed;
            }
            if output.is_some() {
                settings.generator_file = output;
            }
            train(&settings)
        }
        Commands::Show { generator } => show(&generator),
    }
}

fn registry(settings: &TrainSettings) -> DomainRegistry {
    let mut registry = DomainRegistry::new();
    let blocks = settings.blocks;
    let goal = settings.goal;
    registry.register("blocksworld", move || Box::new(BlocksWorld::new(blocks, goal)));
    registry
}

fn train(settings: &TrainSettings) -> Result<()> {
    let schema = registry(settings).create(&settings.domain)?;
    let signatures: Vec<PredicateSignature> = schema.predicates().to_vec();

    let optimizer = OptimizerConfig {
        population_constant: settings.population_constant,
        elite_fraction: settings.elite_fraction,
        step_size: settings.step_size,
        episodes_per_policy: settings.episodes_per_policy,
        convergence_threshold: settings.convergence_threshold,
        max_episodes: settings.max_episodes,
        value_weighted_counts: settings.value_weighted_counts,
        ..OptimizerConfig::default()
    };
    let evaluator = BlocksEvaluator::new(
        BlocksWorld::new(settings.blocks, settings.goal),
        settings.max_steps,
    );
    let mut session = LearningSession::new(
        &signatures,
        GeneratorConfig::default(),
        optimizer,
        evaluator,
        settings.seed,
    );

    tracing::info!(
        domain = %settings.domain,
        blocks = settings.blocks,
        goal = ?settings.goal,
        seed = settings.seed,
        "training"
    );
    let report = session.run();
    tracing::info!(
        episodes = report.episodes,
        iterations = report.iterations,
        converged = report.converged,
        elite_mean = report.elite_returns.mean(),
        "training finished"
    );

    let best = session.best_policy();
    println!("best policy:");
    println!("{best}");

    if let Some(path) = &settings.generator_file {
        save_generator(session.generator(), path)?;
        tracing::info!(path = %path.display(), "generator saved");
    }
    Ok(())
}

fn show(path: &PathBuf) -> Result<()> {
    let settings = TrainSettings::default();
    let schema = registry(&settings).create(&settings.domain)?;
    let mut generator =
        PolicyGenerator::new(schema.predicates(), GeneratorConfig::default());
    load_generator(path, &mut generator)?;

    for (_, slot) in generator.slots() {
        println!("slot `{}`:", slot.action());
        for (&id, weight) in slot.rules().iter() {
            println!("  {:.4}  {}", weight, generator.arena().get(id));
        }
    }
    Ok(())
}
