use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{
    action::Direction,
    config::GameConfig,
    grid::{Grid, GridError},
    state::{GameState, Position, Snake, TerminationReason},
};

/// Configuration that cannot start a game
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("invalid game configuration: {0}")]
    Config(String),
}

/// Result of a game step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Reward for this step
    pub reward: f64,
    /// Whether the game has terminated
    pub done: bool,
    /// Why the game terminated, set exactly when `done` is
    pub reason: Option<TerminationReason>,
    /// Whether the snake ate food this step
    pub ate_food: bool,
}

impl StepResult {
    fn running(reward: f64, ate_food: bool) -> Self {
        Self {
            reward,
            done: false,
            reason: None,
            ate_food,
        }
    }

    fn terminal(reward: f64, reason: TerminationReason, ate_food: bool) -> Self {
        Self {
            reward,
            done: true,
            reason: Some(reason),
            ate_food,
        }
    }
}

/// The game engine that handles all game logic
///
/// The engine owns the only mutable copy of the game state. Callers read it
/// through [`GameEngine::state`] and drive it with [`GameEngine::step`].
/// Food placement draws from the injected random source, so a seeded engine
/// replays identically for an identical action sequence.
pub struct GameEngine<R = ChaCha8Rng> {
    config: GameConfig,
    grid: Grid,
    state: GameState,
    rng: R,
}

impl GameEngine<ChaCha8Rng> {
    /// Create an engine whose food placement is driven by `seed`
    pub fn seeded(config: GameConfig, seed: u64) -> Result<Self, EngineError> {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> GameEngine<R> {
    /// Create a new game engine and start the first episode
    ///
    /// Fails if the board cannot be derived from the display, or if the
    /// configuration is otherwise unplayable (e.g. the starting snake does
    /// not fit).
    pub fn with_rng(config: GameConfig, rng: R) -> Result<Self, EngineError> {
        let grid = config.grid()?;
        config.validate().map_err(EngineError::Config)?;
        let snake = Snake::new(grid.center(), Direction::Right, config.initial_snake_length);
        // Placeholder food, replaced by reset below
        let state = GameState::new(snake, grid.center(), grid);

        let mut engine = Self {
            config,
            grid,
            state,
            rng,
        };
        engine.reset();
        Ok(engine)
    }

    /// Reset the game to initial state
    pub fn reset(&mut self) -> &GameState {
        let snake = Snake::new(
            self.grid.center(),
            Direction::Right,
            self.config.initial_snake_length,
        );
        let food = match Self::spawn_food(&self.grid, &snake, &mut self.rng) {
            Some(food) => food,
            None => panic!(
                "no free cell for food on a {}x{} board with a snake of length {}",
                self.grid.width,
                self.grid.height,
                snake.len()
            ),
        };

        self.state = GameState::new(snake, food, self.grid);
        self.assert_invariants();
        &self.state
    }

    /// Current game state
    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Replace the live state, e.g. to set up a specific board position
    ///
    /// # Panics
    ///
    /// Panics if the state is not a consistent live state on this board.
    pub fn set_state(&mut self, state: GameState) {
        assert_eq!(state.grid, self.grid, "state belongs to a different board");
        self.state = state;
        self.assert_invariants();
    }

    /// Execute one step of the game
    ///
    /// Checks run in a fixed order (starvation, wall, body) so at most one
    /// termination reason applies to a step. A reversal request on a snake
    /// longer than one cell keeps the current heading.
    pub fn step(&mut self, action: Direction) -> StepResult {
        if !self.state.is_alive {
            return StepResult {
                reward: 0.0,
                done: true,
                reason: self.state.reason,
                ate_food: false,
            };
        }

        let rewards = self.config.rewards;
        self.state.steps += 1;
        self.state.steps_since_food += 1;

        if self.state.steps_since_food >= self.config.max_steps_since_food {
            return self.finish(TerminationReason::Steps, rewards.starvation, false);
        }

        self.state.snake.steer(action);
        let old_head = self.state.snake.head();
        let new_head = old_head.moved_in_direction(self.state.snake.direction);

        if !self.grid.contains(new_head) {
            return self.finish(TerminationReason::Screen, rewards.collision, false);
        }
        if self.state.snake.collides_after_move(new_head) {
            return self.finish(TerminationReason::Tail, rewards.collision, false);
        }

        let ate_food = new_head == self.state.food;
        let distance_before = old_head.manhattan_distance(self.state.food);

        self.state.snake.move_snake(ate_food);

        let result = if ate_food {
            self.state.score += 1;
            self.state.steps_since_food = 0;

            match Self::spawn_food(&self.grid, &self.state.snake, &mut self.rng) {
                Some(food) => {
                    self.state.food = food;
                    StepResult::running(rewards.food, true)
                }
                // The body covers the whole board; any further move runs into it
                None => return self.finish(TerminationReason::Tail, rewards.food, true),
            }
        } else {
            let distance_after = new_head.manhattan_distance(self.state.food);
            let reward = if distance_after < distance_before {
                rewards.closer
            } else {
                rewards.farther
            };
            StepResult::running(reward, false)
        };

        self.assert_invariants();
        result
    }

    fn finish(&mut self, reason: TerminationReason, reward: f64, ate_food: bool) -> StepResult {
        self.state.is_alive = false;
        self.state.reason = Some(reason);
        StepResult::terminal(reward, reason, ate_food)
    }

    /// Pick a free cell uniformly at random, or None if the board is full
    fn spawn_food(grid: &Grid, snake: &Snake, rng: &mut R) -> Option<Position> {
        let free: Vec<Position> = grid.cells().filter(|&p| !snake.occupies(p)).collect();
        free.choose(rng).copied()
    }

    fn assert_invariants(&self) {
        if let Err(violation) = self.state.check_invariants() {
            panic!("game engine invariant violated: {violation}");
        }
    }
}
