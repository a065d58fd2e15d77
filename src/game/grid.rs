//! Board geometry
//!
//! The board is measured in blocks. Display dimensions are given in pixels and
//! divided by the block size, so a 1000x1000 display with 100px blocks is a
//! 10x10 board. Walls are lethal: there is no wrap-around.
//!
//! Each side is capped at [`MAX_SIDE`] blocks so that every cell coordinate
//! fits a [`Position`] component.

use serde::{Deserialize, Serialize};

use super::state::Position;

/// Largest board side, in blocks
pub const MAX_SIDE: usize = 4096;

/// Error produced when display/block dimensions do not describe a board
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("block size must be positive")]
    ZeroBlockSize,
    #[error("display {width}x{height} is smaller than one {block}px block")]
    TooSmall { width: u32, height: u32, block: u32 },
    #[error("display dimension {dimension} is not a multiple of block size {block}")]
    Misaligned { dimension: u32, block: u32 },
    #[error("board of {width}x{height} blocks exceeds the {max} block limit per side")]
    TooLarge {
        width: usize,
        height: usize,
        max: usize,
    },
}

/// Valid coordinate space of the board, in blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Convert pixel dimensions and a block size into a board
    pub fn from_display(width: u32, height: u32, block: u32) -> Result<Self, GridError> {
        if block == 0 {
            return Err(GridError::ZeroBlockSize);
        }
        if width < block || height < block {
            return Err(GridError::TooSmall {
                width,
                height,
                block,
            });
        }
        for dimension in [width, height] {
            if dimension % block != 0 {
                return Err(GridError::Misaligned { dimension, block });
            }
        }

        let (width, height) = ((width / block) as usize, (height / block) as usize);
        if width > MAX_SIDE || height > MAX_SIDE {
            return Err(GridError::TooLarge {
                width,
                height,
                max: MAX_SIDE,
            });
        }

        Ok(Self::new(width, height))
    }

    /// Check if a position lies on the board
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.width as i32 && pos.y >= 0 && pos.y < self.height as i32
    }

    /// Starting cell for a fresh snake
    pub fn center(&self) -> Position {
        Position::new((self.width / 2) as i32, (self.height / 2) as i32)
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Every cell on the board, row by row
    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Position::new(x, y)))
    }
}
