//! Core game logic module for Snake
//!
//! This module contains all the game logic without any I/O or rendering dependencies.
//! It is driven programmatically by the training, evaluation and visualization modes.

pub mod action;
pub mod config;
pub mod engine;
pub mod grid;
pub mod state;

// Re-export commonly used types
pub use action::{ACTION_COUNT, Direction};
pub use config::{GameConfig, RewardConfig};
pub use engine::{EngineError, GameEngine, StepResult};
pub use grid::{Grid, GridError, MAX_SIDE};
pub use state::{GameState, InvariantViolation, Position, Snake, TerminationReason};
