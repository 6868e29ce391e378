//! Spawning through pipes: crude spawn, optional colour mutation, finalize.
//!
//! Crude-spawned tiles are attached to their cell at once but sit stacked
//! above their pipe; the next gravity pass drops them in. Their colour may be
//! re-rolled until they are finalized.

use crate::error::EngineError;
use crate::geom::Vec2;
use crate::tile::{TileColor, TileId};
use crate::tile_manager::TileManager;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

/// Height of a pipe's spawn point above its reference cell.
pub const PIPE_SPAWN_OFFSET: f32 = 0.8;
/// Vertical gap between tiles queued in the same pipe.
pub const PIPE_STACK_STEP: f32 = 0.7;

/// Give up re-rolling after this many rounds and keep the matches.
const MAX_MUTATION_ROUNDS: usize = 1000;

impl TileManager {
    /// World point new tiles of `pipe` start from.
    pub fn pipe_spawn_point(&self, pipe: usize) -> Option<Vec2> {
        let cell = *self.grid.spawner_reference_cells().get(pipe)?;
        self.grid
            .cell(cell)
            .map(|c| c.position + Vec2::new(0.0, PIPE_SPAWN_OFFSET))
    }

    pub fn pipe_count(&self) -> usize {
        self.grid.spawner_reference_cells().len()
    }

    fn random_color(&mut self) -> TileColor {
        TileColor::ALL[self.rng.random_range(0..TileColor::ALL.len())]
    }

    /// Create an unfinalized tile for `pipe`, attached to the lowest empty cell
    /// of the pipe's column and stacked above the pipe's spawn point.
    pub fn crude_spawn_at_pipe(&mut self, pipe: usize) -> Result<TileId, EngineError> {
        let spawn = self.pipe_spawn_point(pipe).ok_or(EngineError::UnknownPipe(pipe))?;
        let column = self.grid.spawner_reference_cells()[pipe];
        let x = self.grid.cell(column).map_or(0, |c| c.x);
        let target = self
            .grid
            .lowest_empty_cell_in_column(x)
            .ok_or(EngineError::PipeFull(pipe))?;

        let cursor = self.pipe_cursors[pipe];
        let position = spawn + Vec2::new(0.0, PIPE_STACK_STEP * cursor as f32);
        let color = self.random_color();
        let bomb = self.bomb_chance > 0.0 && self.rng.random::<f32>() < self.bomb_chance;

        let id = self.alloc_tile(color, position);
        if let Some(tile) = self.tiles.get_mut(&id) {
            tile.set_spawn_pipe(Some(pipe));
            tile.set_bomb(bomb);
        }
        self.attach(id, target)?;
        self.pipe_cursors[pipe] += 1;
        debug!(tile = %id, pipe, cell = %target, ?color, bomb, "crude spawn");
        Ok(id)
    }

    /// Crude-spawn through every pipe until its column is full.
    /// Returns the number of tiles created.
    #[instrument(skip(self))]
    pub fn fill_board(&mut self) -> Result<usize, EngineError> {
        let mut spawned = 0;
        for pipe in 0..self.pipe_count() {
            let column = self.grid.spawner_reference_cells()[pipe];
            let x = self.grid.cell(column).map_or(0, |c| c.x);
            while self.grid.empty_cell_count_in_column(x) > 0 {
                self.crude_spawn_at_pipe(pipe)?;
                spawned += 1;
            }
        }
        info!(spawned, live = self.tiles.len(), "board filled");
        Ok(spawned)
    }

    /// Re-roll the colour of every unfinalized tile in `tiles`.
    pub fn randomly_mutate_tiles(&mut self, tiles: &[TileId]) {
        for &id in tiles {
            let color = self.random_color();
            if let Some(tile) = self.tiles.get_mut(&id) {
                tile.set_color(color);
            }
        }
    }

    /// Re-roll unfinalized tiles that take part in a match until the board has
    /// none left that could still change. Returns the number of rounds, or
    /// `None` when it gave up and the matches are still on the board.
    pub fn mutate_until_no_matches(&mut self) -> Result<Option<usize>, EngineError> {
        self.mutate_within(MAX_MUTATION_ROUNDS)
    }

    pub(crate) fn mutate_within(&mut self, max_rounds: usize) -> Result<Option<usize>, EngineError> {
        for round in 0..=max_rounds {
            let mutable: Vec<TileId> = self
                .matches_in_whole_grid()?
                .into_iter()
                .filter(|id| self.tiles.get(id).is_some_and(|t| !t.is_fully_created()))
                .collect();
            if mutable.is_empty() {
                debug!(rounds = round, "spawn mutation settled");
                return Ok(Some(round));
            }
            if round == max_rounds {
                break;
            }
            self.randomly_mutate_tiles(&mutable);
        }
        warn!(rounds = max_rounds, "gave up removing spawn matches");
        Ok(None)
    }

    /// Finalize every pending tile and rewind the pipe cursors.
    pub fn finalize_spawn(&mut self) {
        let gates: Vec<Option<f32>> = (0..self.pipe_count())
            .map(|pipe| self.pipe_spawn_point(pipe).map(|p| p.y))
            .collect();
        for tile in self.tiles.values_mut() {
            let gate = tile.spawn_pipe().and_then(|p| gates.get(p).copied().flatten());
            tile.finalize(gate);
        }
        self.pipe_cursors.iter_mut().for_each(|c| *c = 0);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BoardConfig;
    use crate::error::EngineError;
    use crate::grid::CellId;
    use crate::spawn::{PIPE_SPAWN_OFFSET, PIPE_STACK_STEP};
    use crate::tile::TileColor;
    use crate::tile_manager::TileManager;

    fn manager(w: usize, h: usize, seed: u64) -> TileManager {
        TileManager::new(&BoardConfig::rectangle(w, h).with_seed(seed)).unwrap()
    }

    #[test]
    fn test_crude_spawn_fills_from_the_bottom_and_stacks() {
        let mut tm = manager(2, 3, 1);
        let first = tm.crude_spawn_at_pipe(1).unwrap();
        let second = tm.crude_spawn_at_pipe(1).unwrap();
        assert_eq!(tm.cell_of(first), Ok(CellId(5)));
        assert_eq!(tm.cell_of(second), Ok(CellId(3)));
        let spawn = tm.pipe_spawn_point(1).unwrap();
        let top = tm.grid().cell(CellId(1)).unwrap().position;
        assert!((spawn.y - top.y - PIPE_SPAWN_OFFSET).abs() < 1e-6);
        let a = tm.tile(first).unwrap().position();
        let b = tm.tile(second).unwrap().position();
        assert!((b.y - a.y - PIPE_STACK_STEP).abs() < 1e-5);
        assert!(!tm.tile(first).unwrap().is_fully_created());
    }

    #[test]
    fn test_full_or_unknown_pipe() {
        let mut tm = manager(1, 1, 1);
        tm.crude_spawn_at_pipe(0).unwrap();
        assert_eq!(tm.crude_spawn_at_pipe(0), Err(EngineError::PipeFull(0)));
        assert_eq!(tm.crude_spawn_at_pipe(4), Err(EngineError::UnknownPipe(4)));
    }

    #[test]
    fn test_fill_then_finalize() {
        let mut tm = manager(4, 5, 3);
        assert_eq!(tm.fill_board(), Ok(20));
        assert!(tm.grid().cells().all(|c| c.is_full()));
        tm.finalize_spawn();
        assert!(tm.tiles().all(|t| t.is_fully_created()));
        assert!(tm.pipe_cursors.iter().all(|&c| c == 0));
        let id = tm.tile_at(0, 0).unwrap().id();
        tm.randomly_mutate_tiles(&[id]);
        let before = tm.tile(id).unwrap().color();
        for _ in 0..20 {
            tm.randomly_mutate_tiles(&[id]);
        }
        assert_eq!(tm.tile(id).unwrap().color(), before);
    }

    #[test]
    fn test_mutation_removes_all_spawn_matches() {
        for seed in 0..20 {
            let mut tm = manager(6, 6, seed);
            tm.fill_board().unwrap();
            tm.mutate_until_no_matches().unwrap();
            assert!(tm.matches_in_whole_grid().unwrap().is_empty(), "seed {seed}");
        }
    }

    #[test]
    fn test_mutation_reports_giving_up() {
        let mut checked = 0;
        for seed in 0..20 {
            let mut tm = manager(6, 6, seed);
            tm.fill_board().unwrap();
            if tm.matches_in_whole_grid().unwrap().is_empty() {
                continue;
            }
            checked += 1;
            assert_eq!(tm.mutate_within(0), Ok(None));
            assert!(!tm.matches_in_whole_grid().unwrap().is_empty());
            assert!(matches!(tm.mutate_until_no_matches(), Ok(Some(n)) if n > 0));
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_same_seed_same_board() {
        let mut a = manager(5, 5, 42);
        let mut b = manager(5, 5, 42);
        a.fill_board().unwrap();
        b.fill_board().unwrap();
        assert_eq!(a.dump(), b.dump());
    }

    #[test]
    fn test_bomb_chance_one_spawns_only_bombs() {
        let mut config = BoardConfig::rectangle(3, 3).with_seed(5);
        config.bomb_chance = 1.0;
        let mut tm = TileManager::new(&config).unwrap();
        tm.fill_board().unwrap();
        assert!(tm.tiles().all(|t| t.is_bomb()));
        assert!(TileColor::ALL.contains(&tm.tile_at(0, 0).unwrap().color()));
    }
}
