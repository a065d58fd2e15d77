//! State encoders: map a game state to a compact, hashable Q-table key
//!
//! Two strategies share the [`StateEncoder`] trait:
//!
//! - `basic`: food direction signs, danger around the head, heading.
//!   Small bounded key space, converges quickly.
//! - `naive`: raw head and food coordinates plus heading. Key space grows with
//!   the square of the board area and carries no danger information, so it
//!   learns slowly. It exists as a baseline.
//!
//! Every key starts with the strategy name, so tables built with one strategy
//! are recognisable and cannot silently be reused by the other.

use std::cmp::Ordering;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::game::{Direction, GameState, Position};

/// Canonical encoded game state used to index the Q-table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strategy name the key was produced by
    pub fn strategy(&self) -> Option<&str> {
        self.0.split_once(':').map(|(strategy, _)| strategy)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a game state snapshot into a [`StateKey`]
///
/// Implementations must be pure and total: identical snapshots give identical
/// keys and no snapshot makes encoding fail.
pub trait StateEncoder: Send + Sync {
    /// Name used as the key prefix and the data directory
    fn name(&self) -> &'static str;

    fn encode(&self, state: &GameState) -> StateKey;
}

/// Selectable state representation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StateRepresentation {
    /// Food direction, surrounding danger and heading
    #[default]
    Basic,
    /// Raw head and food coordinates with heading
    Naive,
}

impl StateRepresentation {
    pub fn name(&self) -> &'static str {
        match self {
            StateRepresentation::Basic => BasicEncoder.name(),
            StateRepresentation::Naive => NaiveEncoder.name(),
        }
    }

    /// Build the encoder for this strategy
    pub fn encoder(&self) -> Box<dyn StateEncoder> {
        match self {
            StateRepresentation::Basic => Box::new(BasicEncoder),
            StateRepresentation::Naive => Box::new(NaiveEncoder),
        }
    }
}

impl fmt::Display for StateRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Food direction, danger bits and heading
///
/// Key layout: `basic:<x>,<y>,<danger>,<heading>` where `x` is `R`/`L`/`-`
/// for food right of / left of / level with the head, `y` is `D`/`U`/`-`
/// for below / above / level, `danger` holds one bit per neighbour in action
/// order (left, right, up, down) and `heading` is the heading's action index.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEncoder;

impl BasicEncoder {
    fn food_signs(head: Position, food: Position) -> (char, char) {
        let x = match food.x.cmp(&head.x) {
            Ordering::Greater => 'R',
            Ordering::Less => 'L',
            Ordering::Equal => '-',
        };
        let y = match food.y.cmp(&head.y) {
            Ordering::Greater => 'D',
            Ordering::Less => 'U',
            Ordering::Equal => '-',
        };
        (x, y)
    }

    /// One bit per neighbouring cell: off the board or covered by the body
    fn danger(state: &GameState) -> String {
        let head = state.snake.head();
        Direction::ALL
            .iter()
            .map(|&direction| {
                let cell = head.moved_in_direction(direction);
                let blocked = !state.is_in_bounds(cell)
                    || state.snake.body_segments().contains(&cell);
                if blocked { '1' } else { '0' }
            })
            .collect()
    }
}

impl StateEncoder for BasicEncoder {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn encode(&self, state: &GameState) -> StateKey {
        let (x, y) = Self::food_signs(state.snake.head(), state.food);
        StateKey(format!(
            "{}:{},{},{},{}",
            self.name(),
            x,
            y,
            Self::danger(state),
            state.snake.direction.index()
        ))
    }
}

/// Raw coordinates, no feature engineering
///
/// Key layout: `naive:<head x>,<head y>,<food x>,<food y>,<heading>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveEncoder;

impl StateEncoder for NaiveEncoder {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn encode(&self, state: &GameState) -> StateKey {
        let head = state.snake.head();
        StateKey(format!(
            "{}:{},{},{},{},{}",
            self.name(),
            head.x,
            head.y,
            state.food.x,
            state.food.y,
            state.snake.direction.index()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Grid, Snake};

    fn state(head: Position, direction: Direction, length: usize, food: Position) -> GameState {
        GameState::new(Snake::new(head, direction, length), food, Grid::new(10, 10))
    }

    #[test]
    fn test_basic_key_layout() {
        let s = state(Position::new(5, 5), Direction::Right, 3, Position::new(8, 2));
        assert_eq!(BasicEncoder.encode(&s).as_str(), "basic:R,U,1000,1");
    }

    #[test]
    fn test_basic_food_level_with_head() {
        let s = state(Position::new(5, 5), Direction::Right, 1, Position::new(5, 7));
        assert_eq!(BasicEncoder.encode(&s).as_str(), "basic:-,D,0000,1");
    }

    #[test]
    fn test_basic_danger_at_corner() {
        let s = state(Position::new(0, 0), Direction::Up, 1, Position::new(3, 3));
        // Left and up leave the board
        assert_eq!(BasicEncoder.encode(&s).as_str(), "basic:R,D,1010,2");
    }

    #[test]
    fn test_basic_collapses_equivalent_states() {
        let a = state(Position::new(4, 4), Direction::Down, 1, Position::new(7, 8));
        let b = state(Position::new(2, 3), Direction::Down, 1, Position::new(9, 6));
        assert_eq!(BasicEncoder.encode(&a), BasicEncoder.encode(&b));
    }

    #[test]
    fn test_naive_key_layout() {
        let s = state(Position::new(5, 5), Direction::Right, 1, Position::new(6, 5));
        assert_eq!(NaiveEncoder.encode(&s).as_str(), "naive:5,5,6,5,1");
    }

    #[test]
    fn test_naive_distinguishes_positions() {
        let a = state(Position::new(4, 4), Direction::Down, 1, Position::new(7, 8));
        let b = state(Position::new(2, 3), Direction::Down, 1, Position::new(9, 6));
        assert_ne!(NaiveEncoder.encode(&a), NaiveEncoder.encode(&b));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let s = state(Position::new(3, 7), Direction::Left, 4, Position::new(1, 1));
        for representation in [StateRepresentation::Basic, StateRepresentation::Naive] {
            let encoder = representation.encoder();
            let first = encoder.encode(&s);
            for _ in 0..10 {
                assert_eq!(encoder.encode(&s.clone()), first);
            }
        }
    }

    #[test]
    fn test_key_strategy_prefix() {
        let s = state(Position::new(5, 5), Direction::Right, 1, Position::new(1, 1));
        for representation in [StateRepresentation::Basic, StateRepresentation::Naive] {
            let key = representation.encoder().encode(&s);
            assert_eq!(key.strategy(), Some(representation.name()));
        }
        assert_eq!(StateKey::new("no-prefix").strategy(), None);
    }

    #[test]
    fn test_representation_serde_names() {
        let json = serde_json::to_string(&StateRepresentation::Naive).unwrap();
        assert_eq!(json, "\"naive\"");
        let parsed: StateRepresentation = serde_json::from_str("\"basic\"").unwrap();
        assert_eq!(parsed, StateRepresentation::Basic);
    }
}
