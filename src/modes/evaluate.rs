//! Evaluation mode
//!
//! Plays the stored policy greedily without updating it and reports how it
//! scored. The table on disk is only read.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use super::EpisodeOutcome;
use crate::config::Settings;
use crate::game::{GameEngine, GameState};
use crate::rl::{AgentMode, QAgent, StateEncoder};

/// Aggregate results of an evaluation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationSummary {
    pub episodes: u64,
    pub total_score: u64,
    pub max_score: u32,
    /// `None` until an episode finishes
    pub min_score: Option<u32>,
    pub total_steps: u64,
}

impl EvaluationSummary {
    pub fn record(&mut self, score: u32, steps: u64) {
        self.episodes += 1;
        self.total_score += u64::from(score);
        self.total_steps += steps;
        self.max_score = self.max_score.max(score);
        self.min_score = Some(self.min_score.map_or(score, |min| min.min(score)));
    }

    pub fn average_score(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.total_score as f64 / self.episodes as f64
        }
    }

    pub fn average_steps(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.total_steps as f64 / self.episodes as f64
        }
    }
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Episodes: {}", self.episodes)?;
        writeln!(f, "Average score: {:.2}", self.average_score())?;
        writeln!(f, "Max score: {}", self.max_score)?;
        writeln!(f, "Min score: {}", self.min_score.unwrap_or(0))?;
        writeln!(f, "Total steps: {}", self.total_steps)?;
        write!(f, "Average steps per episode: {:.1}", self.average_steps())
    }
}

/// Greedy play of a stored Q-table
pub struct EvaluateMode {
    engine: GameEngine,
    encoder: Box<dyn StateEncoder>,
    agent: QAgent,
    summary: EvaluationSummary,
    episode_reward: f64,
    episode_length: u64,
    settings: Settings,
}

impl EvaluateMode {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let seed = settings.resolve_seed();
        let engine = GameEngine::seeded(settings.game.clone(), seed)
            .context("Failed to build the game board")?;
        let encoder = settings.state_representation.encoder();

        let mut agent = QAgent::seeded(
            settings.learning.clone(),
            encoder.name(),
            AgentMode::Evaluate,
            seed.wrapping_add(1),
        );
        let path = settings.qvalues_path();
        agent
            .load(&path)
            .with_context(|| format!("Failed to load Q-table from {:?}", path))?;
        tracing::info!(states = agent.table_len(), path = ?path, seed, "Q-table loaded");
        if agent.table_len() == 0 {
            tracing::warn!(path = ?path, "no stored Q-table, evaluating an untrained policy");
        }

        Ok(Self {
            engine,
            encoder,
            agent,
            summary: EvaluationSummary::default(),
            episode_reward: 0.0,
            episode_length: 0,
            settings,
        })
    }

    /// Play until the budget is spent or `stop` is set
    ///
    /// An episode cut short by `stop` is not counted.
    pub fn run(mut self, stop: &AtomicBool) -> Result<EvaluationSummary> {
        tracing::info!(representation = %self.settings.state_representation, "evaluating");

        while !stop.load(Ordering::Relaxed)
            && !self
                .settings
                .budget
                .exhausted(self.summary.total_steps, self.summary.episodes)
        {
            self.step();
        }

        Ok(self.summary)
    }

    /// Make one greedy move
    ///
    /// A finished game is replaced by a fresh one first. Returns the episode
    /// totals when the move ends the game.
    pub fn step(&mut self) -> Option<EpisodeOutcome> {
        if !self.engine.state().is_alive {
            self.start_episode();
        }

        let key = self.encoder.encode(self.engine.state());
        let action = self.agent.select_action(&key, false);
        let result = self.engine.step(action);
        self.episode_reward += result.reward;
        self.episode_length += 1;

        let reason = result.reason?;
        let score = self.engine.state().score;
        self.summary.record(score, self.episode_length);
        tracing::debug!(
            episode = self.summary.episodes,
            score,
            steps = self.episode_length,
            "episode finished"
        );
        Some(EpisodeOutcome {
            reward: self.episode_reward,
            length: self.episode_length,
            score,
            reason,
        })
    }

    /// Start a new game, abandoning any episode in progress
    pub fn start_episode(&mut self) {
        self.engine.reset();
        self.episode_reward = 0.0;
        self.episode_length = 0;
    }

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn agent(&self) -> &QAgent {
        &self.agent
    }

    pub fn summary(&self) -> &EvaluationSummary {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Direction, GameConfig};
    use crate::rl::{QTable, StateKey, load_table, save_table};
    use tempfile::TempDir;

    #[test]
    fn test_summary_statistics() {
        let mut summary = EvaluationSummary::default();
        assert_eq!(summary.average_score(), 0.0);
        assert_eq!(summary.min_score, None);

        summary.record(4, 100);
        summary.record(0, 20);
        summary.record(8, 180);

        assert_eq!(summary.episodes, 3);
        assert_eq!(summary.max_score, 8);
        assert_eq!(summary.min_score, Some(0));
        assert!((summary.average_score() - 4.0).abs() < 1e-9);
        assert!((summary.average_steps() - 100.0).abs() < 1e-9);

        let text = summary.to_string();
        assert!(text.contains("Episodes: 3"));
        assert!(text.contains("Average score: 4.00"));
        assert!(text.contains("Total steps: 300"));
    }

    #[test]
    fn test_evaluation_leaves_table_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings {
            game: GameConfig::new(5, 5),
            data_dir: dir.path().to_path_buf(),
            seed: Some(11),
            ..Default::default()
        };
        settings.game.max_steps_since_food = 30;
        settings.budget.max_episodes = Some(20);

        let mut table = QTable::new();
        table.set(&StateKey::new("basic:-,-,0000,1"), Direction::Up, 0.5);
        table.set(&StateKey::new("basic:R,U,1000,0"), Direction::Right, 2.0);
        let path = settings.qvalues_path();
        save_table(&table, &path).unwrap();
        let written = std::fs::read(&path).unwrap();

        let summary = EvaluateMode::new(settings)
            .unwrap()
            .run(&AtomicBool::new(false))
            .unwrap();

        assert_eq!(summary.episodes, 20);
        assert_eq!(load_table(&path, "basic").unwrap(), table);
        assert_eq!(std::fs::read(&path).unwrap(), written);
    }

    #[test]
    fn test_missing_table_evaluates_untrained_policy() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings {
            game: GameConfig::new(4, 4),
            data_dir: dir.path().to_path_buf(),
            seed: Some(2),
            ..Default::default()
        };
        settings.budget.max_episodes = Some(3);
        let path = settings.qvalues_path();

        let summary = EvaluateMode::new(settings)
            .unwrap()
            .run(&AtomicBool::new(false))
            .unwrap();

        assert_eq!(summary.episodes, 3);
        assert!(!path.exists());
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let mut settings = Settings::default();
        settings.game.initial_snake_length = 0;

        assert!(EvaluateMode::new(settings).is_err());
    }

    #[test]
    fn test_stop_mid_episode_is_not_counted() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            game: GameConfig::new(6, 6),
            data_dir: dir.path().to_path_buf(),
            seed: Some(4),
            ..Default::default()
        };

        // The untrained policy heads left from the centre; two moves are safe
        let mut mode = EvaluateMode::new(settings).unwrap();
        assert_eq!(mode.step(), None);
        assert_eq!(mode.step(), None);

        let summary = mode.run(&AtomicBool::new(true)).unwrap();
        assert_eq!(summary, EvaluationSummary::default());
    }
}
