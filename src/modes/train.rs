//! Training mode for the Q-learning agent
//!
//! Plays episodes with an exploring agent, applies one Bellman update per
//! step, and keeps the persisted Q-table current. The table is written every
//! `save_interval` episodes, whenever an episode sets a new highscore (as a
//! separate snapshot), and once more when the run ends for any reason,
//! including an interrupt. Each finished episode is also appended to the
//! representation's `history.jsonl` series.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//!
//! use ql_snake::config::Settings;
//! use ql_snake::modes::TrainMode;
//!
//! let mut settings = Settings::default();
//! settings.budget.max_episodes = Some(1000);
//!
//! let stop = AtomicBool::new(false);
//! let stats = TrainMode::new(settings)?.run(&stop)?;
//! println!("{}", stats.format_summary());
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::game::{GameEngine, GameState, TerminationReason};
use crate::metrics::{EpisodeLog, EpisodeRecord, TrainingStats};
use crate::rl::{AgentMode, PersistenceError, QAgent, StateEncoder, save_table};

/// Training cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Write the Q-table every N episodes
    pub save_interval: u64,

    /// Log training progress every N episodes
    pub log_frequency: u64,

    /// Episodes in the rolling statistics window
    pub stats_window: usize,

    /// Write a snapshot of the table whenever the highscore improves
    pub save_highscores: bool,

    /// Append every finished episode to the history series
    pub write_history: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            save_interval: 1000,
            log_frequency: 100,
            stats_window: 100,
            save_highscores: true,
            write_history: true,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.save_interval == 0 {
            return Err("save_interval must be at least 1".to_string());
        }
        if self.log_frequency == 0 {
            return Err("log_frequency must be at least 1".to_string());
        }
        if self.stats_window == 0 {
            return Err("stats_window must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Agent wrapper that flushes the Q-table when it goes out of scope
///
/// Dereferences to the wrapped [`QAgent`]. Call [`CheckpointGuard::finish`]
/// to perform the final save with its error reported; if the guard is
/// dropped without it (early return, panic unwinding) the save still
/// happens and a failure is logged.
pub struct CheckpointGuard {
    agent: QAgent,
    path: PathBuf,
    armed: bool,
}

impl CheckpointGuard {
    pub fn new(agent: QAgent, path: PathBuf) -> Self {
        Self {
            agent,
            path,
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the table now
    pub fn checkpoint(&self) -> Result<(), PersistenceError> {
        self.agent.save(&self.path)
    }

    /// Final save; the guard does nothing further once dropped
    pub fn finish(mut self) -> Result<(), PersistenceError> {
        self.armed = false;
        self.checkpoint()
    }
}

impl Deref for CheckpointGuard {
    type Target = QAgent;

    fn deref(&self) -> &QAgent {
        &self.agent
    }
}

impl DerefMut for CheckpointGuard {
    fn deref_mut(&mut self) -> &mut QAgent {
        &mut self.agent
    }
}

impl Drop for CheckpointGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.checkpoint() {
            Ok(()) => tracing::info!(path = ?self.path, "Q-table flushed"),
            Err(e) => tracing::error!(error = %e, "failed to flush Q-table"),
        }
    }
}

/// Totals of one finished episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeOutcome {
    pub reward: f64,
    pub length: u64,
    pub score: u32,
    pub reason: TerminationReason,
}

/// Training mode for the Q-learning agent
///
/// Drive it to completion with [`TrainMode::run`], or one move at a time
/// with [`TrainMode::step`] and [`TrainMode::finish`] when something else
/// (the live board view) owns the loop.
pub struct TrainMode {
    engine: GameEngine,
    encoder: Box<dyn StateEncoder>,
    agent: CheckpointGuard,
    stats: TrainingStats,
    history: Option<EpisodeLog>,
    episode_reward: f64,
    episode_length: u64,
    settings: Settings,
}

impl TrainMode {
    /// Build the engine and agent and load any existing table
    ///
    /// Fails when the settings are invalid, or the stored table is unreadable
    /// or belongs to another representation.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let seed = settings.resolve_seed();
        let engine = GameEngine::seeded(settings.game.clone(), seed)
            .context("Failed to build the game board")?;
        let encoder = settings.state_representation.encoder();

        let mut agent = QAgent::seeded(
            settings.learning.clone(),
            encoder.name(),
            AgentMode::Train,
            seed.wrapping_add(1),
        );
        let path = settings.qvalues_path();
        agent
            .load(&path)
            .with_context(|| format!("Failed to load Q-table from {:?}", path))?;
        tracing::info!(states = agent.table_len(), path = ?path, seed, "Q-table loaded");

        let history = if settings.train.write_history {
            open_history(&settings.history_path())
        } else {
            None
        };

        Ok(Self {
            engine,
            encoder,
            agent: CheckpointGuard::new(agent, path),
            stats: TrainingStats::new(settings.train.stats_window),
            history,
            episode_reward: 0.0,
            episode_length: 0,
            settings,
        })
    }

    /// Run the training loop until the budget is spent or `stop` is set
    ///
    /// An episode interrupted by `stop` is abandoned and not recorded. The
    /// table is saved before returning in every case.
    pub fn run(mut self, stop: &AtomicBool) -> Result<TrainingStats> {
        self.print_header();

        while !stop.load(Ordering::Relaxed) && !self.budget_exhausted() {
            self.step();
        }
        if self.engine.state().is_alive && self.episode_length > 0 {
            tracing::info!(steps = self.episode_length, "training interrupted mid-episode");
        }

        self.finish()
    }

    /// Make one exploring move and learn from it
    ///
    /// A finished game is replaced by a fresh one first. When the move ends
    /// the game, the episode is recorded, epsilon advances, any due saves
    /// happen, and the episode totals are returned.
    pub fn step(&mut self) -> Option<EpisodeOutcome> {
        if !self.engine.state().is_alive {
            self.start_episode();
        }

        let key = self.encoder.encode(self.engine.state());
        let action = self.agent.select_action(&key, true);
        let result = self.engine.step(action);
        let next_key = self.encoder.encode(self.engine.state());
        self.agent
            .update(&key, action, result.reward, &next_key, result.done);

        self.episode_reward += result.reward;
        self.episode_length += 1;

        let reason = result.reason?;
        let outcome = EpisodeOutcome {
            reward: self.episode_reward,
            length: self.episode_length,
            score: self.engine.state().score,
            reason,
        };
        self.finish_episode(&outcome);
        Some(outcome)
    }

    /// Start a new game, abandoning any episode in progress
    pub fn start_episode(&mut self) {
        self.engine.reset();
        self.episode_reward = 0.0;
        self.episode_length = 0;
    }

    pub fn budget_exhausted(&self) -> bool {
        self.settings
            .budget
            .exhausted(self.stats.total_steps(), self.stats.total_episodes())
    }

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn agent(&self) -> &QAgent {
        &self.agent
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    /// Final save and report
    pub fn finish(self) -> Result<TrainingStats> {
        let TrainMode {
            agent,
            stats,
            mut history,
            ..
        } = self;

        if let Some(log) = history.as_mut() {
            match log.flush() {
                Ok(()) => println!("Episode history: {:?}", log.path()),
                Err(e) => tracing::warn!(error = %e, "failed to flush episode history"),
            }
        }

        let path = agent.path().to_path_buf();
        agent
            .finish()
            .with_context(|| format!("Failed to save Q-table to {:?}", path))?;

        println!("\nTraining complete!");
        println!("Q-table saved to: {:?}", path);
        println!("\nFinal Statistics:");
        println!("{}", stats.format_summary());

        Ok(stats)
    }

    fn finish_episode(&mut self, outcome: &EpisodeOutcome) {
        let improved = self.stats.record_episode(
            outcome.reward,
            outcome.length,
            outcome.score,
            outcome.reason,
        );
        self.agent.end_episode();
        self.log_episode(outcome);

        let episode = self.stats.total_episodes();
        if improved {
            self.save_highscore(outcome.score);
        }
        if episode % self.settings.train.log_frequency == 0 {
            self.print_progress(outcome);
        }
        if episode % self.settings.train.save_interval == 0 {
            self.save_checkpoint();
        }
    }

    /// Append to the episode series; a failed write disables it
    fn log_episode(&mut self, outcome: &EpisodeOutcome) {
        let Some(log) = self.history.as_mut() else {
            return;
        };
        let record = EpisodeRecord::latest(
            &self.stats,
            outcome.reward,
            outcome.length,
            outcome.score,
            outcome.reason,
        );
        if let Err(e) = log.append(&record) {
            tracing::warn!(error = %e, path = ?log.path(), "episode history write failed, disabling it");
            self.history = None;
        }
    }

    /// Periodic save; a failed write is logged and training continues
    fn save_checkpoint(&mut self) {
        if let Some(log) = self.history.as_mut() {
            if let Err(e) = log.flush() {
                tracing::warn!(error = %e, "failed to flush episode history");
            }
        }
        match self.agent.checkpoint() {
            Ok(()) => tracing::info!(
                episode = self.stats.total_episodes(),
                states = self.agent.table_len(),
                "checkpoint saved"
            ),
            Err(e) => tracing::warn!(error = %e, "checkpoint failed, continuing"),
        }
    }

    fn save_highscore(&self, score: u32) {
        if !self.settings.train.save_highscores {
            return;
        }
        let path = self.settings.highscore_path(score);
        match save_table(self.agent.table(), &path) {
            Ok(()) => tracing::info!(score, path = ?path, "new highscore"),
            Err(e) => tracing::warn!(error = %e, "highscore snapshot failed, continuing"),
        }
    }

    pub(super) fn print_header(&self) {
        let game = &self.settings.game;
        let learning = &self.settings.learning;
        let budget = &self.settings.budget;

        println!("{}", "=".repeat(70));
        println!("Q-Learning Training - Snake");
        println!("{}", "=".repeat(70));
        println!("State representation: {}", self.settings.state_representation);
        println!(
            "Board: {}x{} cells",
            game.display_width / game.block_size,
            game.display_height / game.block_size
        );
        println!("Learning:");
        println!("  Learning rate: {}", learning.learning_rate);
        println!("  Discount: {}", learning.discount);
        println!("  Epsilon: {} (floor {})", learning.epsilon_start, learning.epsilon_floor);
        println!("  Decay: {:?}", learning.epsilon_decay);
        match (budget.max_episodes, budget.max_steps) {
            (None, None) => println!("Budget: until interrupted"),
            (episodes, steps) => println!("Budget: episodes {:?}, steps {:?}", episodes, steps),
        }
        println!("Checkpoints: Every {} episodes", self.settings.train.save_interval);
        println!("Logging: Every {} episodes", self.settings.train.log_frequency);
        println!("Q-table: {:?}", self.agent.path());
        println!("{}", "=".repeat(70));
        println!();
    }

    fn print_progress(&self, last: &EpisodeOutcome) {
        tracing::info!(
            score = last.score,
            reason = %last.reason,
            epsilon = self.agent.epsilon(),
            states = self.agent.table_len(),
            "{}",
            self.stats.format_summary()
        );
    }
}

fn open_history(path: &Path) -> Option<EpisodeLog> {
    match EpisodeLog::create(path) {
        Ok(log) => Some(log),
        Err(e) => {
            tracing::warn!(error = %e, path = ?path, "cannot write episode history, continuing without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::game::{Direction, GameConfig, Position, Snake};
    use crate::metrics::read_history;
    use crate::rl::{QLearningConfig, QTable, StateKey, load_table};
    use tempfile::TempDir;

    fn settings(dir: &TempDir, episodes: u64) -> Settings {
        let mut settings = Settings {
            game: GameConfig::new(6, 6),
            data_dir: dir.path().to_path_buf(),
            seed: Some(7),
            ..Default::default()
        };
        settings.game.max_steps_since_food = 50;
        settings.budget.max_episodes = Some(episodes);
        settings.train.save_interval = 10;
        settings
    }

    /// Greedy learner on a single-row board
    fn row_settings(dir: &TempDir, width: usize) -> Settings {
        let mut settings = settings(dir, 100);
        settings.game = GameConfig::new(width, 1);
        settings.learning.epsilon_start = 0.0;
        settings
    }

    fn place(mode: &mut TrainMode, body: &[i32], direction: Direction, food: i32, score: u32) {
        let snake = Snake {
            body: body.iter().map(|&x| Position::new(x, 0)).collect(),
            direction,
        };
        let mut state = GameState::new(snake, Position::new(food, 0), mode.state().grid);
        state.score = score;
        mode.engine.set_state(state);
    }

    fn play_out(mode: &mut TrainMode) -> EpisodeOutcome {
        loop {
            if let Some(outcome) = mode.step() {
                return outcome;
            }
        }
    }

    #[test]
    fn test_train_config_validation() {
        assert!(TrainConfig::default().validate().is_ok());

        let config = TrainConfig {
            save_interval: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir, 5);
        settings.train.save_interval = 0;

        let err = TrainMode::new(settings).err().unwrap();
        assert!(err.to_string().contains("save_interval"), "{err}");
    }

    #[test]
    fn test_run_respects_episode_budget() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, 25);
        let path = settings.qvalues_path();

        let stats = TrainMode::new(settings).unwrap().run(&AtomicBool::new(false)).unwrap();

        assert_eq!(stats.total_episodes(), 25);
        assert!(stats.total_steps() >= 25);
        let table = load_table(&path, "basic").unwrap();
        assert!(!table.is_empty());
    }

    #[test]
    fn test_run_respects_step_budget() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir, 1);
        settings.budget.max_episodes = None;
        settings.budget.max_steps = Some(200);

        let stats = TrainMode::new(settings).unwrap().run(&AtomicBool::new(false)).unwrap();

        assert!(stats.total_steps() >= 200);
        assert!(stats.total_episodes() >= 1);
    }

    #[test]
    fn test_stop_before_start_still_saves() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, 100);
        let path = settings.qvalues_path();

        let stats = TrainMode::new(settings).unwrap().run(&AtomicBool::new(true)).unwrap();

        assert_eq!(stats.total_episodes(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_stop_mid_episode_flushes_without_counting_it() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir, 100);
        settings.learning.epsilon_start = 0.0;
        let path = settings.qvalues_path();
        let history = settings.history_path();

        // Two moves from the centre of a 6x6 board cannot end the game
        let mut mode = TrainMode::new(settings).unwrap();
        assert_eq!(mode.step(), None);
        assert_eq!(mode.step(), None);
        assert_eq!(mode.episode_length, 2);

        let stats = mode.run(&AtomicBool::new(true)).unwrap();

        assert_eq!(stats.total_episodes(), 0);
        assert_eq!(stats.total_steps(), 0);
        assert!(!load_table(&path, "basic").unwrap().is_empty());
        assert!(read_history(&history).unwrap().is_empty());
    }

    #[test]
    fn test_stop_from_another_thread() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir, 1);
        settings.budget.max_episodes = None;
        let path = settings.qvalues_path();
        let history = settings.history_path();

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::Relaxed);
        });

        let stats = TrainMode::new(settings).unwrap().run(&stop).unwrap();
        stopper.join().unwrap();

        assert!(path.exists());
        let records = read_history(&history).unwrap();
        assert_eq!(records.len() as u64, stats.total_episodes());
        assert_eq!(
            records.iter().map(|r| r.length).sum::<u64>(),
            stats.total_steps()
        );
    }

    #[test]
    fn test_history_series_follows_episodes() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, 25);
        let history = settings.history_path();

        let stats = TrainMode::new(settings).unwrap().run(&AtomicBool::new(false)).unwrap();

        let records = read_history(&history).unwrap();
        assert_eq!(records.len(), 25);
        assert!(records.iter().enumerate().all(|(i, r)| r.episode == i as u64 + 1));
        let last = records.last().unwrap();
        assert!((last.mean_reward - stats.mean_episode_reward()).abs() < 1e-9);
        assert!((last.mean_score - stats.mean_episode_score()).abs() < 1e-9);
        assert_eq!(
            records.iter().map(|r| r.score).max().unwrap_or(0),
            stats.best_score()
        );
    }

    #[test]
    fn test_history_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir, 3);
        settings.train.write_history = false;
        let history = settings.history_path();

        TrainMode::new(settings).unwrap().run(&AtomicBool::new(false)).unwrap();

        assert!(!history.exists());
    }

    #[test]
    fn test_failed_saves_do_not_stop_training() {
        let dir = TempDir::new().unwrap();
        let mut settings = row_settings(&dir, 2);
        settings.train.save_interval = 1;
        let path = settings.qvalues_path();

        // A file where the snapshot directory belongs, and a directory where
        // the table's temporary file belongs
        std::fs::create_dir_all(settings.representation_dir()).unwrap();
        std::fs::write(settings.highscores_dir(), "blocked").unwrap();
        let blocker = settings.representation_dir().join("qvalues.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        // On a 2x1 board the snake starts next to the only free cell and
        // the greedy first move eats it, filling the board
        let mut mode = TrainMode::new(settings.clone()).unwrap();
        for _ in 0..5 {
            let outcome = mode.step().unwrap();
            assert_eq!(outcome.score, 1);
        }

        assert_eq!(mode.stats().total_episodes(), 5);
        assert_eq!(mode.stats().best_score(), 1);
        assert!(!path.exists());
        assert!(!settings.highscore_path(1).exists());

        std::fs::remove_dir(&blocker).unwrap();
        let stats = mode.finish().unwrap();
        assert_eq!(stats.total_episodes(), 5);
        assert!(!load_table(&path, "basic").unwrap().is_empty());
    }

    #[test]
    fn test_highscore_snapshots_keep_earlier_scores() {
        let dir = TempDir::new().unwrap();
        let settings = row_settings(&dir, 6);
        let mut mode = TrainMode::new(settings.clone()).unwrap();

        // Episode 1: eat once, then the only food left is behind the snake
        place(&mut mode, &[3], Direction::Right, 2, 0);
        assert_eq!(mode.step(), None);
        place(&mut mode, &[2, 3], Direction::Left, 5, 1);
        assert_eq!(play_out(&mut mode).score, 1);

        let first = settings.highscore_path(1);
        let snapshot = std::fs::read(&first).unwrap();

        // Episode 2: eat twice
        mode.start_episode();
        place(&mut mode, &[3, 4], Direction::Left, 2, 0);
        assert_eq!(mode.step(), None);
        place(&mut mode, &[2, 3, 4], Direction::Left, 1, 1);
        assert_eq!(mode.step(), None);
        place(&mut mode, &[1, 2, 3, 4], Direction::Left, 5, 2);
        assert_eq!(play_out(&mut mode).score, 2);

        assert!(settings.highscore_path(2).exists());
        assert_eq!(std::fs::read(&first).unwrap(), snapshot);
        assert_ne!(
            load_table(&settings.highscore_path(2), "basic").unwrap(),
            load_table(&first, "basic").unwrap()
        );
    }

    #[test]
    fn test_training_resumes_from_saved_table() {
        let dir = TempDir::new().unwrap();
        let first = settings(&dir, 10);
        let path = first.qvalues_path();
        TrainMode::new(first).unwrap().run(&AtomicBool::new(false)).unwrap();
        let before = load_table(&path, "basic").unwrap();

        let second = settings(&dir, 10);
        TrainMode::new(second).unwrap().run(&AtomicBool::new(false)).unwrap();
        let after = load_table(&path, "basic").unwrap();

        assert!(before.keys().all(|k| after.contains(k)));
    }

    #[test]
    fn test_foreign_table_is_rejected() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, 1);
        let mut table = QTable::new();
        table.set(&StateKey::new("naive:1,1,2,2,0"), Direction::Up, 1.0);
        save_table(&table, &settings.qvalues_path()).unwrap();

        assert!(TrainMode::new(settings).is_err());
    }

    #[test]
    fn test_guard_flushes_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("basic").join("qvalues.json");
        let key = StateKey::new("basic:R,-,0000,1");

        {
            let agent = QAgent::seeded(QLearningConfig::default(), "basic", AgentMode::Train, 0);
            let mut guard = CheckpointGuard::new(agent, path.clone());
            guard.update(&key, Direction::Right, 10.0, &key, true);
        }

        let table = load_table(&path, "basic").unwrap();
        assert!(table.contains(&key));
    }
}
