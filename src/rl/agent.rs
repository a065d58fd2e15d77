//! Tabular Q-learning agent
//!
//! The agent owns the Q-table, the exploration schedule and its own random
//! source. Actions are the four absolute directions in [`Direction::ALL`]
//! order; greedy selection breaks ties towards the first of them.

use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::config::QLearningConfig;
use super::encoder::StateKey;
use super::persistence::{PersistenceError, load_table, save_table};
use super::qtable::QTable;
use crate::game::Direction;

/// Whether the agent learns or only plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Explore with the epsilon schedule and apply updates
    Train,
    /// Greedy play; epsilon is pinned to zero and the table is read-only
    Evaluate,
}

/// Epsilon-greedy Q-learning agent
pub struct QAgent<R = ChaCha8Rng> {
    table: QTable,
    config: QLearningConfig,
    epsilon: f64,
    mode: AgentMode,
    /// Strategy name of the keys this agent accepts
    strategy: &'static str,
    rng: R,
}

impl QAgent<ChaCha8Rng> {
    /// Create an agent whose exploration is driven by `seed`
    pub fn seeded(
        config: QLearningConfig,
        strategy: &'static str,
        mode: AgentMode,
        seed: u64,
    ) -> Self {
        Self::with_rng(config, strategy, mode, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> QAgent<R> {
    pub fn with_rng(
        config: QLearningConfig,
        strategy: &'static str,
        mode: AgentMode,
        rng: R,
    ) -> Self {
        let epsilon = match mode {
            AgentMode::Train => config.epsilon_start,
            AgentMode::Evaluate => 0.0,
        };
        Self {
            table: QTable::new(),
            config,
            epsilon,
            mode,
            strategy,
            rng,
        }
    }

    /// Replace the table with the one stored at `path`
    ///
    /// A missing file leaves the agent with an empty table.
    pub fn load(&mut self, path: &Path) -> Result<(), PersistenceError> {
        self.table = load_table(path, self.strategy)?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        save_table(&self.table, path)
    }

    /// Pick an action for the state `key`
    ///
    /// With `explore` set and probability epsilon, a uniformly random action;
    /// otherwise the greedy action. Never modifies the table.
    pub fn select_action(&mut self, key: &StateKey, explore: bool) -> Direction {
        if explore && self.rng.gen_range(0.0..1.0) < self.epsilon {
            return Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())];
        }
        self.table.best_action(key)
    }

    /// Apply the Bellman update for one observed transition
    ///
    /// `Q[s][a] += α · (r + γ · max Q[s'] · (1 − done) − Q[s][a])`. A terminal
    /// transition never reads `Q[s']`. In evaluation mode this is a no-op.
    pub fn update(
        &mut self,
        state: &StateKey,
        action: Direction,
        reward: f64,
        next_state: &StateKey,
        done: bool,
    ) {
        if self.mode == AgentMode::Evaluate {
            tracing::debug!("ignoring Q-table update in evaluation mode");
            return;
        }

        let current = self.table.value(state, action);
        let bootstrap = if done {
            0.0
        } else {
            self.config.discount * self.table.max_value(next_state)
        };
        let target = reward + bootstrap;
        let updated = current + self.config.learning_rate * (target - current);
        self.table.set(state, action, updated);
    }

    /// Advance the epsilon schedule after a completed training episode
    pub fn end_episode(&mut self) {
        if self.mode == AgentMode::Train {
            self.epsilon = self
                .config
                .epsilon_decay
                .next(self.epsilon, self.config.epsilon_floor);
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of states with a stored row
    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn strategy(&self) -> &'static str {
        self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::EpsilonDecay;
    use tempfile::TempDir;

    fn key(s: &str) -> StateKey {
        StateKey::new(format!("basic:{s}"))
    }

    fn agent(mode: AgentMode) -> QAgent {
        let config = QLearningConfig {
            learning_rate: 0.5,
            discount: 0.9,
            ..Default::default()
        };
        QAgent::seeded(config, "basic", mode, 3)
    }

    #[test]
    fn test_update_moves_towards_target() {
        let mut agent = agent(AgentMode::Train);
        let (s, s2) = (key("s"), key("s2"));

        agent.update(&s, Direction::Up, 10.0, &s2, false);

        // 0 + 0.5 * (10 + 0.9 * 0 - 0)
        assert_eq!(agent.table().value(&s, Direction::Up), 5.0);
        assert_eq!(agent.table_len(), 1);
    }

    #[test]
    fn test_update_bootstraps_from_next_state() {
        let mut agent = agent(AgentMode::Train);
        let (s, s2) = (key("s"), key("s2"));
        agent.update(&s2, Direction::Left, 4.0, &key("end"), true); // Q[s2][left] = 2

        agent.update(&s, Direction::Right, 1.0, &s2, false);

        // 0.5 * (1 + 0.9 * 2)
        let value = agent.table().value(&s, Direction::Right);
        assert!((value - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_bellman_fixed_point() {
        let mut agent = agent(AgentMode::Train);
        let (s, s2) = (key("s"), key("s2"));

        // Q[s2] max = 10, so γ · max = 9 = Q[s][down]
        agent.table.set(&s2, Direction::Up, 10.0);
        agent.table.set(&s, Direction::Down, 9.0);

        agent.update(&s, Direction::Down, 0.0, &s2, false);

        assert!((agent.table().value(&s, Direction::Down) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_terminal_update_ignores_next_state() {
        let mut agent = agent(AgentMode::Train);
        let (s, s2) = (key("s"), key("s2"));
        for d in Direction::ALL {
            agent.table.set(&s2, d, 1e6);
        }

        agent.update(&s, Direction::Left, -30.0, &s2, true);

        assert_eq!(agent.table().value(&s, Direction::Left), -15.0);
    }

    #[test]
    fn test_greedy_selection_prefers_first_on_ties() {
        let mut agent = agent(AgentMode::Train);
        assert_eq!(agent.select_action(&key("unseen"), false), Direction::Left);

        let s = key("s");
        agent.table.set(&s, Direction::Up, 1.0);
        agent.table.set(&s, Direction::Down, 1.0);
        assert_eq!(agent.select_action(&s, false), Direction::Up);
    }

    #[test]
    fn test_selection_never_grows_table() {
        let mut agent = agent(AgentMode::Train);
        for i in 0..50 {
            agent.select_action(&key(&i.to_string()), true);
        }
        assert_eq!(agent.table_len(), 0);
    }

    #[test]
    fn test_full_exploration_covers_all_actions() {
        let config = QLearningConfig {
            epsilon_start: 1.0,
            ..Default::default()
        };
        let mut agent = QAgent::seeded(config, "basic", AgentMode::Train, 9);
        let s = key("s");
        agent.table.set(&s, Direction::Down, 100.0);

        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[agent.select_action(&s, true).index()] = true;
        }
        assert!(seen.iter().all(|&x| x));

        // explore = false always exploits
        for _ in 0..20 {
            assert_eq!(agent.select_action(&s, false), Direction::Down);
        }
    }

    #[test]
    fn test_evaluation_mode_is_read_only() {
        let mut agent = agent(AgentMode::Evaluate);
        assert_eq!(agent.epsilon(), 0.0);

        agent.update(&key("s"), Direction::Up, 10.0, &key("s2"), false);
        agent.end_episode();

        assert!(agent.table().is_empty());
        assert_eq!(agent.epsilon(), 0.0);
    }

    #[test]
    fn test_epsilon_schedule_is_non_increasing() {
        let config = QLearningConfig {
            epsilon_start: 0.5,
            epsilon_floor: 0.1,
            epsilon_decay: EpsilonDecay::Exponential { factor: 0.9 },
            ..Default::default()
        };
        let mut agent = QAgent::seeded(config, "basic", AgentMode::Train, 1);

        let mut previous = agent.epsilon();
        for _ in 0..100 {
            agent.end_episode();
            assert!(agent.epsilon() <= previous);
            previous = agent.epsilon();
        }
        assert_eq!(agent.epsilon(), 0.1);
    }

    #[test]
    fn test_save_load_preserves_policy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qvalues.json");
        let mut trained = agent(AgentMode::Train);
        let samples: Vec<StateKey> = (0..8).map(|i| key(&format!("p{i}"))).collect();
        for (i, sample) in samples.iter().enumerate() {
            let next = &samples[(i + 1) % samples.len()];
            trained.update(sample, Direction::ALL[i % 4], i as f64 - 3.0, next, i % 3 == 0);
        }
        trained.save(&path).unwrap();

        let mut restored = agent(AgentMode::Evaluate);
        restored.load(&path).unwrap();

        assert_eq!(restored.table(), trained.table());
        for sample in &samples {
            assert_eq!(
                restored.select_action(sample, false),
                trained.select_action(sample, false)
            );
        }
    }
}
