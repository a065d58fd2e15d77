use serde::{Deserialize, Serialize};

use super::grid::{Grid, GridError};

/// Reward constants handed out by the engine
///
/// Non-terminal moves are shaped by distance: `closer` when the Manhattan
/// distance from head to food shrank, `farther` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Reward for eating food
    pub food: f64,
    /// Penalty for hitting a wall or the body
    pub collision: f64,
    /// Penalty for starving (too many steps without food)
    pub starvation: f64,
    /// Reward for moving towards the food
    pub closer: f64,
    /// Reward for moving away from the food
    pub farther: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            food: 10.0,
            collision: -30.0,
            starvation: -3.0,
            closer: 0.001,
            farther: -0.001,
        }
    }
}

/// Configuration for the game
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Display width in pixels
    pub display_width: u32,
    /// Display height in pixels
    pub display_height: u32,
    /// Size of one board cell in pixels
    pub block_size: u32,
    /// Initial length of the snake
    pub initial_snake_length: usize,
    /// Episode ends once this many steps pass without eating
    pub max_steps_since_food: u32,
    pub rewards: RewardConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            display_width: 1000,
            display_height: 1000,
            block_size: 100,
            initial_snake_length: 1,
            max_steps_since_food: 2000,
            rewards: RewardConfig::default(),
        }
    }
}

impl GameConfig {
    /// Create a new configuration with a board of `width` x `height` blocks
    pub fn new(width: usize, height: usize) -> Self {
        let block_size = Self::default().block_size;
        Self {
            display_width: width as u32 * block_size,
            display_height: height as u32 * block_size,
            block_size,
            ..Default::default()
        }
    }

    /// Create a small grid for testing
    pub fn small() -> Self {
        Self::new(10, 10)
    }

    /// Board derived from the display and block dimensions
    pub fn grid(&self) -> Result<Grid, GridError> {
        Grid::from_display(self.display_width, self.display_height, self.block_size)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        let grid = self.grid().map_err(|e| e.to_string())?;

        if self.initial_snake_length == 0 {
            return Err("initial_snake_length must be at least 1".to_string());
        }

        // The initial body trails left of the centre cell
        let room_behind_head = grid.center().x as usize + 1;
        if self.initial_snake_length > room_behind_head {
            return Err(format!(
                "initial_snake_length ({}) does not fit on a {}x{} board",
                self.initial_snake_length, grid.width, grid.height
            ));
        }

        if grid.cell_count() <= self.initial_snake_length {
            return Err("board must have room for the snake and one food".to_string());
        }

        if self.max_steps_since_food == 0 {
            return Err("max_steps_since_food must be at least 1".to_string());
        }

        let r = &self.rewards;
        if [r.food, r.collision, r.starvation, r.closer, r.farther]
            .iter()
            .any(|v| !v.is_finite())
        {
            return Err("rewards must be finite numbers".to_string());
        }

        Ok(())
    }
}
