use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::Direction;
use super::grid::Grid;

/// A position on the game grid, in blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Move position by delta
    pub fn moved_by(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Move position in a direction
    pub fn moved_in_direction(&self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.moved_by(dx, dy)
    }

    pub fn manhattan_distance(&self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// The snake in the game
#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    /// Body segments, with head at index 0
    pub body: Vec<Position>,
    /// Current direction of movement
    pub direction: Direction,
}

impl Snake {
    /// Create a new snake with given starting position and direction
    pub fn new(head: Position, direction: Direction, length: usize) -> Self {
        let mut body = vec![head];

        // Add initial body segments behind the head
        let (dx, dy) = direction.delta();
        for i in 1..length.max(1) {
            let prev = body[i - 1];
            body.push(prev.moved_by(-dx, -dy));
        }

        Self { body, direction }
    }

    /// Get the head position
    pub fn head(&self) -> Position {
        self.body[0]
    }

    /// Get the tail position (last segment)
    pub fn tail(&self) -> Position {
        self.body[self.body.len() - 1]
    }

    /// Get body segments (excluding head)
    pub fn body_segments(&self) -> &[Position] {
        &self.body[1..]
    }

    /// Check if any segment, head included, sits on `pos`
    pub fn occupies(&self, pos: Position) -> bool {
        self.body.contains(&pos)
    }

    /// Check if moving the head onto `pos` hits the body
    ///
    /// The tail is left out: it moves away during the same step.
    pub fn collides_after_move(&self, pos: Position) -> bool {
        self.body[..self.body.len() - 1].contains(&pos)
    }

    /// Turn towards `requested` unless it would reverse a body longer than one cell
    pub fn steer(&mut self, requested: Direction) {
        if self.len() > 1 && self.direction.is_opposite(requested) {
            return;
        }
        self.direction = requested;
    }

    /// Move snake in current direction, growing if should_grow is true
    pub fn move_snake(&mut self, should_grow: bool) {
        let new_head = self.head().moved_in_direction(self.direction);
        self.body.insert(0, new_head);

        if !should_grow {
            self.body.pop();
        }
    }

    /// Get the length of the snake
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Check if the snake is empty (should never happen in practice)
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Why an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Snake ran into its own body
    Tail,
    /// Snake left the board
    Screen,
    /// Too many steps since the last food
    Steps,
}

impl TerminationReason {
    pub const ALL: [TerminationReason; 3] = [
        TerminationReason::Tail,
        TerminationReason::Screen,
        TerminationReason::Steps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Tail => "Tail",
            TerminationReason::Screen => "Screen",
            TerminationReason::Steps => "Steps",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broken engine invariant. Always a bug, never a game outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("snake body is empty")]
    EmptySnake,
    #[error("snake body overlaps itself at {0:?}")]
    SelfOverlap(Position),
    #[error("food at {0:?} lies on the snake")]
    FoodOnSnake(Position),
    #[error("{0:?} lies outside the {1}x{2} board")]
    OutOfBounds(Position, usize, usize),
}

/// Complete game state
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub snake: Snake,
    /// Never on the snake while the game runs. A game that ends by filling
    /// the board leaves it on the head, where it was eaten.
    pub food: Position,
    pub grid: Grid,
    pub score: u32,
    /// Steps taken this episode
    pub steps: u32,
    /// Steps taken since food was last eaten
    pub steps_since_food: u32,
    pub is_alive: bool,
    /// Set once the episode has ended
    pub reason: Option<TerminationReason>,
}

impl GameState {
    /// Create a new game state
    pub fn new(snake: Snake, food: Position, grid: Grid) -> Self {
        Self {
            snake,
            food,
            grid,
            score: 0,
            steps: 0,
            steps_since_food: 0,
            is_alive: true,
            reason: None,
        }
    }

    /// Check if a position is within the grid bounds
    pub fn is_in_bounds(&self, pos: Position) -> bool {
        self.grid.contains(pos)
    }

    /// Check if a position is occupied by the snake
    pub fn is_occupied_by_snake(&self, pos: Position) -> bool {
        self.snake.occupies(pos)
    }

    /// Verify the structural invariants of the state
    ///
    /// Food overlapping the snake is only a violation while the game runs;
    /// see [`GameState::food`].
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.snake.is_empty() {
            return Err(InvariantViolation::EmptySnake);
        }

        let mut seen = HashSet::with_capacity(self.snake.len());
        for &segment in &self.snake.body {
            if !self.grid.contains(segment) {
                return Err(InvariantViolation::OutOfBounds(
                    segment,
                    self.grid.width,
                    self.grid.height,
                ));
            }
            if !seen.insert(segment) {
                return Err(InvariantViolation::SelfOverlap(segment));
            }
        }

        if self.is_alive && seen.contains(&self.food) {
            return Err(InvariantViolation::FoodOnSnake(self.food));
        }
        if !self.grid.contains(self.food) {
            return Err(InvariantViolation::OutOfBounds(
                self.food,
                self.grid.width,
                self.grid.height,
            ));
        }

        Ok(())
    }
}
