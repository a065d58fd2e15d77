//! Tabular reinforcement learning for the Snake game
//!
//! Provides:
//! - State encoders turning game states into Q-table keys
//! - The Q-table and its JSON persistence
//! - An epsilon-greedy Q-learning agent and its hyperparameters

pub mod agent;
pub mod config;
pub mod encoder;
pub mod persistence;
pub mod qtable;

pub use agent::{AgentMode, QAgent};
pub use config::{EpsilonDecay, QLearningConfig};
pub use encoder::{BasicEncoder, NaiveEncoder, StateEncoder, StateKey, StateRepresentation};
pub use persistence::{PersistenceError, load_table, save_table};
pub use qtable::{QTable, QValues};
