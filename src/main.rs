use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ql_snake::config::{RunMode, Settings};
use ql_snake::modes::{EvaluateMode, TrainMode, VisualizeMode};
use ql_snake::rl::StateRepresentation;
use ql_snake::shutdown::shutdown_flag;

#[derive(Parser)]
#[command(name = "ql_snake")]
#[command(version, about = "Tabular Q-learning agent for Snake")]
struct Cli {
    /// What to do: learn, measure the stored policy, or watch it play
    #[arg(long, env = "SNAKE_MODE", value_enum)]
    mode: Option<RunMode>,

    /// State representation, which also selects the table directory
    #[arg(long = "state", env = "SNAKE_STATE", value_enum)]
    state: Option<StateRepresentation>,

    /// Stop after the episode in which this many steps were taken
    #[arg(long, env = "SNAKE_STEPS")]
    steps: Option<u64>,

    /// Stop after this many episodes
    #[arg(long, env = "SNAKE_EPISODES")]
    episodes: Option<u64>,

    /// Seed for food placement and exploration
    #[arg(long, env = "SNAKE_SEED")]
    seed: Option<u64>,

    /// Directory holding the per-representation Q-tables
    #[arg(long, env = "SNAKE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Draw the board in the terminal while training or evaluating
    #[arg(long, env = "SNAKE_VISUALS")]
    visuals: bool,

    /// JSON settings file; flags override its values
    #[arg(long, env = "SNAKE_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_settings(self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };

        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(state) = self.state {
            settings.state_representation = state;
        }
        if let Some(steps) = self.steps {
            settings.budget.max_steps = Some(steps);
        }
        if let Some(episodes) = self.episodes {
            settings.budget.max_episodes = Some(episodes);
        }
        if let Some(seed) = self.seed {
            settings.seed = Some(seed);
        }
        if let Some(dir) = self.data_dir {
            settings.data_dir = dir;
        }
        if self.visuals {
            settings.visuals = true;
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn init_tracing(settings: &Settings) {
    // The board view owns stderr while it runs
    let default_filter = if settings.uses_terminal() {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Cli::parse().into_settings()?;
    init_tracing(&settings);
    let stop = shutdown_flag().context("Failed to install signal handlers")?;

    match settings.mode {
        RunMode::Train if settings.visuals => {
            VisualizeMode::learning(&settings)?.run(&stop).await?;
        }
        RunMode::Train => {
            tokio::task::spawn_blocking(move || TrainMode::new(settings)?.run(&stop))
                .await
                .context("Training task failed")??;
        }
        RunMode::Evaluate if !settings.visuals => {
            let summary =
                tokio::task::spawn_blocking(move || EvaluateMode::new(settings)?.run(&stop))
                    .await
                    .context("Evaluation task failed")??;

            println!("{}", "=".repeat(60));
            println!("Evaluation Results");
            println!("{}", "=".repeat(60));
            println!("{summary}");
        }
        RunMode::Evaluate | RunMode::Visualize => {
            VisualizeMode::new(&settings)?.run(&stop).await?;
        }
    }

    Ok(())
}
