//! Line-scan match detection.
//!
//! A run is a maximal sequence of match-compatible neighbours along one row or
//! column; runs of three or more are matches. Holes end a run. Results are
//! sets, so a tile found by both its row and its column appears once and the
//! outcome does not depend on scan order.

use crate::error::EngineError;
use crate::tile::{are_match_compatible, TileId};
use crate::tile_manager::TileManager;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Minimum run length that counts as a match.
pub const MIN_MATCH: usize = 3;

#[derive(Debug, Clone, Copy)]
enum Line {
    Row(usize),
    Column(usize),
}

impl TileManager {
    fn scan_line(&self, line: Line, found: &mut BTreeSet<TileId>) -> Result<(), EngineError> {
        let len = match line {
            Line::Row(_) => self.grid.width(),
            Line::Column(_) => self.grid.height(),
        };

        let mut run: Vec<TileId> = Vec::with_capacity(len);
        for i in 0..len {
            let (x, y) = match line {
                Line::Row(y) => (i, y),
                Line::Column(x) => (x, i),
            };
            let Some(cell) = self.grid.cell_at(x, y) else {
                run.clear();
                continue;
            };
            let id = cell
                .attached_tile()
                .ok_or(EngineError::EmptyCellInScan { x, y })?;
            let tile = self.tile_ref(id)?;

            let extends = match run.last() {
                Some(&prev) => are_match_compatible(self.tile_ref(prev)?, tile),
                None => false,
            };
            if !extends {
                run.clear();
            }
            run.push(id);

            if run.len() == MIN_MATCH {
                found.extend(run.iter().copied());
            } else if run.len() > MIN_MATCH {
                found.insert(id);
            }
        }
        Ok(())
    }

    /// Matches in row `y`.
    pub fn matches_in_row(&self, y: usize) -> Result<BTreeSet<TileId>, EngineError> {
        let mut found = BTreeSet::new();
        self.scan_line(Line::Row(y), &mut found)?;
        Ok(found)
    }

    /// Matches in column `x`.
    pub fn matches_in_column(&self, x: usize) -> Result<BTreeSet<TileId>, EngineError> {
        let mut found = BTreeSet::new();
        self.scan_line(Line::Column(x), &mut found)?;
        Ok(found)
    }

    /// Matches along the lines through two just-swapped tiles.
    pub fn matches_from_tiles(&self, a: TileId, b: TileId) -> Result<BTreeSet<TileId>, EngineError> {
        let cell_a = self.cell_of(a)?;
        let cell_b = self.cell_of(b)?;
        let ca = self.grid.cell(cell_a).ok_or(EngineError::UnknownCell(cell_a))?;
        let cb = self.grid.cell(cell_b).ok_or(EngineError::UnknownCell(cell_b))?;

        let mut found = BTreeSet::new();
        self.scan_line(Line::Column(ca.x), &mut found)?;
        self.scan_line(Line::Row(ca.y), &mut found)?;
        if cb.x != ca.x {
            self.scan_line(Line::Column(cb.x), &mut found)?;
        }
        if cb.y != ca.y {
            self.scan_line(Line::Row(cb.y), &mut found)?;
        }
        debug!(%a, %b, count = found.len(), "matches from swapped tiles");
        Ok(found)
    }

    /// Matches anywhere on the board: every row, then every column.
    #[instrument(skip(self))]
    pub fn matches_in_whole_grid(&self) -> Result<BTreeSet<TileId>, EngineError> {
        let mut found = BTreeSet::new();
        for y in 0..self.grid.height() {
            self.scan_line(Line::Row(y), &mut found)?;
        }
        for x in 0..self.grid.width() {
            self.scan_line(Line::Column(x), &mut found)?;
        }
        debug!(count = found.len(), "whole grid scan");
        Ok(found)
    }

    /// Cache the matches through the last swapped pair.
    pub fn check_and_cache_matches_from_tiles(
        &mut self,
        a: TileId,
        b: TileId,
    ) -> Result<usize, EngineError> {
        let found = self.matches_from_tiles(a, b)?;
        self.add_to_match_cache(found);
        Ok(self.match_cache.len())
    }

    /// Cache every match on the board.
    pub fn check_and_cache_matches_in_whole_grid(&mut self) -> Result<usize, EngineError> {
        let found = self.matches_in_whole_grid()?;
        self.add_to_match_cache(found);
        Ok(self.match_cache.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EngineError;
    use crate::tile::TileId;
    use crate::tile_manager::tests::{board, id_at};
    use crate::tile_manager::TileManager;
    use std::collections::BTreeSet;

    fn row_ids(tm: &TileManager, y: usize, xs: &[usize]) -> BTreeSet<TileId> {
        xs.iter().map(|&x| id_at(tm, x, y)).collect()
    }

    #[test]
    fn test_three_reds_not_two_greens() {
        let tm = board(&["RRRGG"]);
        assert_eq!(tm.matches_in_whole_grid().unwrap(), row_ids(&tm, 0, &[0, 1, 2]));
    }

    #[test]
    fn test_four_in_a_row() {
        let tm = board(&["RRRR"]);
        assert_eq!(tm.matches_in_whole_grid().unwrap(), row_ids(&tm, 0, &[0, 1, 2, 3]));
    }

    #[test]
    fn test_two_pairs_do_not_match() {
        let tm = board(&["RRGG"]);
        assert!(tm.matches_in_whole_grid().unwrap().is_empty());
    }

    #[test]
    fn test_run_at_row_end_and_two_runs_in_one_row() {
        let tm = board(&["GGGBRRR"]);
        assert_eq!(
            tm.matches_in_row(0).unwrap(),
            row_ids(&tm, 0, &[0, 1, 2, 4, 5, 6])
        );
    }

    #[test]
    fn test_hole_breaks_a_run() {
        let tm = board(&["RR#RR", "GG#GG"]);
        assert!(tm.matches_in_whole_grid().unwrap().is_empty());
    }

    #[test]
    fn test_bombs_break_runs() {
        let tm = board(&["RR*RR"]);
        assert!(tm.matches_in_whole_grid().unwrap().is_empty());
    }

    #[test]
    fn test_empty_cell_inside_a_scan_is_an_error() {
        let tm = board(&["RR.RR"]);
        assert_eq!(
            tm.matches_in_row(0),
            Err(EngineError::EmptyCellInScan { x: 2, y: 0 })
        );
    }

    #[test]
    fn test_cross_shape_is_counted_once() {
        let tm = board(&["BRB", "RRR", "BRB"]);
        let found = tm.matches_in_whole_grid().unwrap();
        assert_eq!(found.len(), 5);
        assert!(found.contains(&id_at(&tm, 1, 1)));
    }

    #[test]
    fn test_l_shape_keeps_both_arms() {
        let tm = board(&["RGB", "RBG", "RRR"]);
        let found = tm.matches_in_whole_grid().unwrap();
        assert_eq!(found.len(), 5);
    }

    #[test]
    fn test_column_match() {
        let tm = board(&["RG", "RB", "RG", "GB"]);
        let expected: BTreeSet<TileId> = (0..3).map(|y| id_at(&tm, 0, y)).collect();
        assert_eq!(tm.matches_in_column(0).unwrap(), expected);
        assert!(tm.matches_in_column(1).unwrap().is_empty());
    }

    #[test]
    fn test_fast_path_agrees_with_whole_grid_after_swap() {
        // swapping (2,1) and (3,1) completes the red row
        let mut tm = board(&[
            "GYBMG", //
            "RRBRY", //
            "MGYBM", //
            "YMBGY",
        ]);
        assert!(tm.matches_in_whole_grid().unwrap().is_empty());
        let a = id_at(&tm, 2, 1);
        let b = id_at(&tm, 3, 1);
        tm.swap(a, b).unwrap();
        let fast = tm.matches_from_tiles(a, b).unwrap();
        let full = tm.matches_in_whole_grid().unwrap();
        assert_eq!(fast, full);
        assert_eq!(fast.len(), 3);
    }

    #[test]
    fn test_cache_accumulates_without_duplicates() {
        let mut tm = board(&["RRRG", "BGBY"]);
        let a = id_at(&tm, 0, 0);
        let b = id_at(&tm, 0, 1);
        assert_eq!(tm.check_and_cache_matches_from_tiles(a, b), Ok(3));
        assert_eq!(tm.check_and_cache_matches_in_whole_grid(), Ok(3));
    }
}
