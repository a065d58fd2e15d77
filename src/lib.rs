//! QL Snake - tabular Q-learning agent for the game of Snake
//!
//! This library provides:
//! - Core game logic: board geometry, rules and rewards (game module)
//! - State encoders, the Q-table and the learning agent (rl module)
//! - Training statistics (metrics module)
//! - Training, evaluation and terminal visualization loops (modes module)
//! - Ctrl-C and SIGTERM handling for long runs (shutdown module)

pub mod config;
pub mod game;
pub mod input;
pub mod metrics;
pub mod modes;
pub mod render;
pub mod rl;
pub mod shutdown;
