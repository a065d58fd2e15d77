//! Run settings
//!
//! [`Settings`] is built once at startup (defaults, then an optional JSON
//! file, then command-line flags), validated, and handed by value to the
//! engine, agent and encoder. Nothing below `main` reads configuration from
//! anywhere else.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::game::GameConfig;
use crate::modes::TrainConfig;
use crate::rl::{QLearningConfig, StateRepresentation};

/// Invalid or unreadable configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {section} configuration: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
    #[error("failed to read settings file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {path:?} is malformed")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// What the process does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Learn from play and persist the Q-table
    #[default]
    Train,
    /// Greedy play without updates, then print aggregate statistics
    Evaluate,
    /// Watch the greedy agent play in the terminal
    Visualize,
}

/// Limits on how long a training or evaluation run lasts
///
/// Both limits are checked after each episode, so the episode that crosses
/// the step budget still runs to completion. With neither set the run lasts
/// until interrupted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunBudget {
    pub max_steps: Option<u64>,
    pub max_episodes: Option<u64>,
}

impl RunBudget {
    pub fn exhausted(&self, steps: u64, episodes: u64) -> bool {
        self.max_steps.is_some_and(|max| steps >= max)
            || self.max_episodes.is_some_and(|max| episodes >= max)
    }
}

/// Complete settings for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: RunMode,
    pub state_representation: StateRepresentation,
    pub game: GameConfig,
    pub learning: QLearningConfig,
    pub train: TrainConfig,
    pub budget: RunBudget,
    /// Seed for food placement and exploration; random when unset
    pub seed: Option<u64>,
    /// Root directory for Q-tables; each representation gets a subdirectory
    pub data_dir: PathBuf,
    /// Show the board in the terminal while training or evaluating
    pub visuals: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            state_representation: StateRepresentation::default(),
            game: GameConfig::default(),
            learning: QLearningConfig::default(),
            train: TrainConfig::default(),
            budget: RunBudget::default(),
            seed: None,
            data_dir: PathBuf::from("."),
            visuals: false,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; absent fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |section: &'static str| move |message: String| ConfigError::Invalid { section, message };

        self.game.validate().map_err(invalid("game"))?;
        self.learning.validate().map_err(invalid("learning"))?;
        self.train.validate().map_err(invalid("training"))?;

        if self.budget.max_steps == Some(0) || self.budget.max_episodes == Some(0) {
            return Err(ConfigError::Invalid {
                section: "budget",
                message: "step and episode budgets must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Directory holding the tables of the selected representation
    pub fn representation_dir(&self) -> PathBuf {
        self.data_dir.join(self.state_representation.name())
    }

    /// Main Q-table, loaded at startup and flushed during training
    pub fn qvalues_path(&self) -> PathBuf {
        self.representation_dir().join("qvalues.json")
    }

    pub fn highscores_dir(&self) -> PathBuf {
        self.representation_dir().join("highscores")
    }

    /// Snapshot written when `score` becomes the new highscore
    pub fn highscore_path(&self, score: u32) -> PathBuf {
        self.highscores_dir().join(format!("highscore{score}.json"))
    }

    /// Per-episode training series, rewritten by each training run
    pub fn history_path(&self) -> PathBuf {
        self.representation_dir().join("history.jsonl")
    }

    /// Whether the run draws the board in the terminal
    pub fn uses_terminal(&self) -> bool {
        self.visuals || self.mode == RunMode::Visualize
    }

    /// Configured seed, or a fresh random one
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}
