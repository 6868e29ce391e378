//! Board configuration: dimensions, holes and spawn pipes, supplied once per board.

use crate::error::ConfigError;
use crate::geom::Vec2;
use std::collections::HashSet;

/// Side of a tile's square in world units.
pub const TILE_SIZE: f32 = 0.6;

/// Default gap between neighbouring cells in world units.
pub const DEFAULT_SPACING: f32 = 0.1;

/// Immutable description of one board. Ids use the `y * width + x` convention.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
    pub width: usize,
    pub height: usize,
    pub spacing: f32,
    /// World position of cell (0, 0); rows grow downwards (towards -y).
    pub origin: Vec2,
    /// Ids of permanently absent cells.
    pub holes: Vec<usize>,
    /// Reference cell id for each spawn pipe, in pipe order.
    pub spawn_pipes: Vec<usize>,
    /// Cells outlined as the visible pipe path.
    pub pipe_path: Vec<usize>,
    /// Probability that a crude-spawned tile is a bomb.
    pub bomb_chance: f32,
    /// Fixed RNG seed; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl BoardConfig {
    /// Rectangular board without holes, one spawn pipe per column on the top row.
    pub fn rectangle(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            spacing: DEFAULT_SPACING,
            origin: Vec2::ZERO,
            holes: Vec::new(),
            spawn_pipes: (0..width).collect(),
            pipe_path: Vec::new(),
            bomb_chance: 0.0,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_holes(mut self, holes: impl IntoIterator<Item = usize>) -> Self {
        self.holes = holes.into_iter().collect();
        self
    }

    /// Distance between the centres of two neighbouring cells.
    #[inline]
    pub fn pitch(&self) -> f32 {
        TILE_SIZE + self.spacing
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Reject boards the engine cannot run on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyBoard {
                width: self.width,
                height: self.height,
            });
        }
        if !self.spacing.is_finite() || self.spacing < 0.0 {
            return Err(ConfigError::InvalidSpacing(self.spacing));
        }
        if !(0.0..=1.0).contains(&self.bomb_chance) {
            return Err(ConfigError::InvalidBombChance(self.bomb_chance));
        }
        let count = self.cell_count();
        if let Some(&id) = self.holes.iter().find(|&&id| id >= count) {
            return Err(ConfigError::HoleOutOfRange {
                id,
                width: self.width,
                height: self.height,
            });
        }
        let holes: HashSet<usize> = self.holes.iter().copied().collect();
        if self.spawn_pipes.is_empty() {
            return Err(ConfigError::NoSpawnPipes);
        }
        for &id in &self.spawn_pipes {
            if id >= count {
                return Err(ConfigError::SpawnPipeOutOfRange(id));
            }
            if holes.contains(&id) {
                return Err(ConfigError::SpawnPipeOnHole(id));
            }
        }
        if let Some(&id) = self
            .pipe_path
            .iter()
            .find(|&&id| id >= count || holes.contains(&id))
        {
            return Err(ConfigError::InvalidPipePath(id));
        }
        // Refill only happens through pipes, so every playable column needs one.
        for x in 0..self.width {
            let has_cells = (0..self.height).any(|y| !holes.contains(&(y * self.width + x)));
            let has_pipe = self.spawn_pipes.iter().any(|&id| id % self.width == x);
            if has_cells && !has_pipe {
                return Err(ConfigError::ColumnWithoutPipe(x));
            }
        }
        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::rectangle(8, 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_is_valid() {
        let cfg = BoardConfig::rectangle(6, 6);
        assert_eq!(cfg.spawn_pipes, vec![0, 1, 2, 3, 4, 5]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_pipe_on_hole_rejected() {
        let cfg = BoardConfig::rectangle(4, 4).with_holes([2]);
        assert_eq!(cfg.validate(), Err(ConfigError::SpawnPipeOnHole(2)));
    }

    #[test]
    fn test_pipe_out_of_range_rejected() {
        let mut cfg = BoardConfig::rectangle(3, 3);
        cfg.spawn_pipes.push(9);
        assert_eq!(cfg.validate(), Err(ConfigError::SpawnPipeOutOfRange(9)));
    }

    #[test]
    fn test_degenerate_values_rejected() {
        assert!(matches!(
            BoardConfig::rectangle(0, 3).validate(),
            Err(ConfigError::EmptyBoard { .. })
        ));
        let mut cfg = BoardConfig::rectangle(3, 3);
        cfg.spacing = -0.5;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidSpacing(-0.5)));
        let mut cfg = BoardConfig::rectangle(3, 3);
        cfg.bomb_chance = 1.5;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidBombChance(1.5)));
        let cfg = BoardConfig::rectangle(3, 3).with_holes([9]);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::HoleOutOfRange { id: 9, .. })
        ));
        let mut cfg = BoardConfig::rectangle(3, 3);
        cfg.spawn_pipes.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::NoSpawnPipes));
    }

    #[test]
    fn test_every_column_needs_a_pipe() {
        let mut cfg = BoardConfig::rectangle(3, 3);
        cfg.spawn_pipes = vec![0, 1];
        assert_eq!(cfg.validate(), Err(ConfigError::ColumnWithoutPipe(2)));
        // a column made only of holes needs none
        let cfg = BoardConfig {
            spawn_pipes: vec![0, 1],
            ..BoardConfig::rectangle(3, 3).with_holes([2, 5, 8])
        };
        assert!(cfg.validate().is_ok());
        // pipes may sit below the top row
        let cfg = BoardConfig {
            spawn_pipes: vec![0, 4, 2],
            ..BoardConfig::rectangle(3, 3)
        };
        assert!(cfg.validate().is_ok());
    }
}
