//! TileManager: owns the grid and every live tile, keeps the tile/cell
//! attachment consistent and queues notifications for the presentation side.
//!
//! Spawning, matching and gravity live in their own modules as further
//! `impl TileManager` blocks.

use crate::config::BoardConfig;
use crate::error::{ConfigError, EngineError};
use crate::geom::Vec2;
use crate::gravity::GravityPass;
use crate::grid::{CellId, Grid};
use crate::tile::{Tile, TileColor, TileId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, instrument};

/// Camera shake played when a bomb is cleared.
pub const BOMB_SHAKE_INTENSITY: f32 = 6.0;
pub const BOMB_SHAKE_DURATION: f32 = 0.2;

/// Notifications for the presentation layer, drained once per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    TileCleared {
        tile: TileId,
        color: TileColor,
        bomb: bool,
        position: Vec2,
    },
    EntranceFade {
        tile: TileId,
        position: Vec2,
    },
    CameraShake {
        intensity: f32,
        duration: f32,
    },
    GravitySettled,
    SwapDetected {
        a: TileId,
        b: TileId,
    },
}

/// Running totals for the sidebar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardStats {
    pub tiles_spawned: u64,
    pub tiles_cleared: u64,
    pub clear_passes: u64,
}

#[derive(Debug, Clone)]
pub struct TileManager {
    pub(crate) grid: Grid,
    pub(crate) tiles: BTreeMap<TileId, Tile>,
    next_id: u64,
    pub(crate) rng: StdRng,
    seed: u64,
    pub(crate) bomb_chance: f32,
    pub(crate) pipe_cursors: Vec<usize>,
    pub(crate) match_cache: BTreeSet<TileId>,
    pub(crate) gravity: GravityPass,
    events: VecDeque<BoardEvent>,
    pub(crate) stats: BoardStats,
}

impl TileManager {
    #[instrument(skip_all, fields(width = config.width, height = config.height))]
    pub fn new(config: &BoardConfig) -> Result<Self, ConfigError> {
        let grid = Grid::new(config)?;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        info!(seed, "board created");
        Ok(Self {
            pipe_cursors: vec![0; grid.spawner_reference_cells().len()],
            grid,
            tiles: BTreeMap::new(),
            next_id: 0,
            rng: StdRng::seed_from_u64(seed),
            seed,
            bomb_chance: config.bomb_chance,
            match_cache: BTreeSet::new(),
            gravity: GravityPass::default(),
            events: VecDeque::new(),
            stats: BoardStats::default(),
        })
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Seed the tile colours are drawn from.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn stats(&self) -> BoardStats {
        self.stats
    }

    #[inline]
    pub fn live_tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(&id)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn tile_in_cell(&self, cell: CellId) -> Option<&Tile> {
        self.grid
            .cell(cell)
            .and_then(|c| c.attached_tile())
            .and_then(|id| self.tiles.get(&id))
    }

    pub fn tile_at(&self, x: usize, y: usize) -> Option<&Tile> {
        self.grid.id_of(x, y).and_then(|id| self.tile_in_cell(id))
    }

    pub(crate) fn tile_ref(&self, id: TileId) -> Result<&Tile, EngineError> {
        self.tiles.get(&id).ok_or(EngineError::UnknownTile(id))
    }

    /// Cell a live tile is attached to.
    pub fn cell_of(&self, id: TileId) -> Result<CellId, EngineError> {
        self.tile_ref(id)?
            .cell()
            .ok_or(EngineError::TileNotAttached(id))
    }

    pub(crate) fn alloc_tile(&mut self, color: TileColor, position: Vec2) -> TileId {
        let id = TileId(self.next_id);
        self.next_id += 1;
        self.tiles.insert(id, Tile::new(id, color, position));
        self.stats.tiles_spawned += 1;
        id
    }

    /// Create a finalized tile resting on `cell`. Used to lay out fixed boards.
    pub fn place_tile(
        &mut self,
        cell: CellId,
        color: TileColor,
        bomb: bool,
    ) -> Result<TileId, EngineError> {
        let target = self.grid.cell(cell).ok_or(EngineError::UnknownCell(cell))?;
        if let Some(occupant) = target.attached_tile() {
            return Err(EngineError::CellOccupied { cell, occupant });
        }
        let position = target.position;
        let id = self.alloc_tile(color, position);
        self.attach(id, cell)?;
        if let Some(tile) = self.tiles.get_mut(&id) {
            tile.set_bomb(bomb);
            tile.finalize(None);
        }
        Ok(id)
    }

    /// Bind `tile` to `cell`, updating both sides together.
    pub fn attach(&mut self, tile: TileId, cell: CellId) -> Result<(), EngineError> {
        let target = self.grid.cell(cell).ok_or(EngineError::UnknownCell(cell))?;
        if let Some(occupant) = target.attached_tile() {
            return Err(EngineError::CellOccupied { cell, occupant });
        }
        if let Some(current) = self.tile_ref(tile)?.cell() {
            return Err(EngineError::TileAlreadyAttached(tile, current));
        }
        self.grid.set_attached(cell, Some(tile));
        if let Some(t) = self.tiles.get_mut(&tile) {
            t.set_cell(Some(cell));
        }
        Ok(())
    }

    /// Unbind `tile` from its cell; returns the cell it left.
    pub fn detach(&mut self, tile: TileId) -> Result<CellId, EngineError> {
        let cell = self.cell_of(tile)?;
        self.grid.set_attached(cell, None);
        if let Some(t) = self.tiles.get_mut(&tile) {
            t.set_cell(None);
        }
        Ok(cell)
    }

    /// Same column one row apart, or same row one column apart.
    pub fn are_cross_neighbors(&self, a: TileId, b: TileId) -> bool {
        let cells = self
            .cell_of(a)
            .ok()
            .zip(self.cell_of(b).ok())
            .and_then(|(ca, cb)| self.grid.cell(ca).zip(self.grid.cell(cb)));
        cells.is_some_and(|(ca, cb)| {
            (ca.x == cb.x && ca.y.abs_diff(cb.y) == 1) || (ca.y == cb.y && ca.x.abs_diff(cb.x) == 1)
        })
    }

    /// Exchange the cells of two cross-neighbouring tiles.
    pub fn swap(&mut self, a: TileId, b: TileId) -> Result<(), EngineError> {
        if !self.are_cross_neighbors(a, b) {
            // report the more specific problem if one of them is unknown or loose
            self.cell_of(a)?;
            self.cell_of(b)?;
            return Err(EngineError::NotAdjacent(a, b));
        }
        self.exchange(a, b)
    }

    /// Reverse a swap. Skips the adjacency check.
    pub fn undo_swap(&mut self, a: TileId, b: TileId) -> Result<(), EngineError> {
        self.exchange(b, a)
    }

    fn exchange(&mut self, a: TileId, b: TileId) -> Result<(), EngineError> {
        let cell_a = self.cell_of(a)?;
        let cell_b = self.cell_of(b)?;
        self.grid.set_attached(cell_a, Some(b));
        self.grid.set_attached(cell_b, Some(a));
        if let Some(t) = self.tiles.get_mut(&a) {
            t.set_cell(Some(cell_b));
        }
        if let Some(t) = self.tiles.get_mut(&b) {
            t.set_cell(Some(cell_a));
        }
        debug!(%a, %b, "swapped tiles");
        Ok(())
    }

    /// Start a linear move of `tile` to its cell position.
    pub fn animate_to_cell(&mut self, tile: TileId, duration: f32) -> Result<(), EngineError> {
        self.cell_of(tile)?;
        if let Some(t) = self.tiles.get_mut(&tile) {
            t.animate_to(duration);
        }
        Ok(())
    }

    pub fn match_cache(&self) -> &BTreeSet<TileId> {
        &self.match_cache
    }

    #[inline]
    pub fn matched_count(&self) -> usize {
        self.match_cache.len()
    }

    /// Union `tiles` into the cache; duplicates are ignored.
    pub fn add_to_match_cache(&mut self, tiles: impl IntoIterator<Item = TileId>) {
        self.match_cache.extend(tiles);
    }

    pub fn clear_match_cache(&mut self) {
        self.match_cache.clear();
    }

    /// Add every non-bomb tile of `color` to the match cache.
    pub fn match_all_tiles_of_color(&mut self, color: TileColor) {
        let hits: Vec<TileId> = self
            .tiles
            .values()
            .filter(|t| t.cell().is_some() && !t.is_bomb() && t.color() == color)
            .map(Tile::id)
            .collect();
        debug!(?color, count = hits.len(), "matched every tile of colour");
        self.match_cache.extend(hits);
    }

    /// Bomb ability: a bomb activated by a non-bomb matches the activator's
    /// colour and itself. Returns whether anything fired.
    pub fn activate(&mut self, tile: TileId, activator: TileId) -> Result<bool, EngineError> {
        let this = self.tile_ref(tile)?;
        let other = self.tile_ref(activator)?;
        if !this.is_bomb() || other.is_bomb() {
            return Ok(false);
        }
        let color = other.color();
        self.match_all_tiles_of_color(color);
        self.match_cache.insert(tile);
        info!(bomb = %tile, ?color, "bomb activated");
        Ok(true)
    }

    /// Detach and destroy every cached tile, then empty the cache.
    ///
    /// Fails without touching the board if a cached tile is unknown or falling.
    pub fn clear_matched_tiles(&mut self) -> Result<usize, EngineError> {
        for &id in &self.match_cache {
            let tile = self.tile_ref(id)?;
            if tile.is_falling() {
                return Err(EngineError::TileInMotion(id));
            }
        }
        let cleared: Vec<TileId> = std::mem::take(&mut self.match_cache).into_iter().collect();
        for &id in &cleared {
            if self.tile_ref(id)?.cell().is_some() {
                self.detach(id)?;
            }
            let Some(tile) = self.tiles.remove(&id) else {
                continue;
            };
            self.forget_gravity(id);
            self.events.push_back(BoardEvent::TileCleared {
                tile: id,
                color: tile.color(),
                bomb: tile.is_bomb(),
                position: tile.position(),
            });
            if tile.is_bomb() {
                self.events.push_back(BoardEvent::CameraShake {
                    intensity: BOMB_SHAKE_INTENSITY,
                    duration: BOMB_SHAKE_DURATION,
                });
            }
        }
        self.stats.tiles_cleared += cleared.len() as u64;
        self.stats.clear_passes += 1;
        debug!(count = cleared.len(), live = self.tiles.len(), "cleared matched tiles");
        Ok(cleared.len())
    }

    /// Re-seat tiles hanging over empty cells onto the lowest empty cell of
    /// their column. Only attachment changes; the gravity pass moves them.
    /// Returns the number of tiles re-seated.
    pub fn collapse_tiles(&mut self) -> Result<usize, EngineError> {
        let mut moved = 0;
        for x in 0..self.grid.width() {
            for y in (0..self.grid.height().saturating_sub(1)).rev() {
                let Some(tile) = self.grid.cell_at(x, y).and_then(|c| c.attached_tile()) else {
                    continue;
                };
                let Some(lowest) = self.grid.lowest_empty_cell_in_column(x) else {
                    continue;
                };
                let lowest_y = self.grid.cell(lowest).map_or(0, |c| c.y);
                if lowest_y > y {
                    self.detach(tile)?;
                    self.attach(tile, lowest)?;
                    moved += 1;
                }
            }
        }
        if moved > 0 {
            debug!(moved, "collapsed tiles");
        }
        Ok(moved)
    }

    pub(crate) fn push_event(&mut self, event: BoardEvent) {
        self.events.push_back(event);
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = BoardEvent> + '_ {
        self.events.drain(..)
    }

    /// Board as colour letters, one row per line; `*` bomb, `.` empty, `#` hole.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for y in 0..self.grid.height() {
            for x in 0..self.grid.width() {
                let ch = match self.grid.cell_at(x, y) {
                    None => '#',
                    Some(cell) => match cell.attached_tile().and_then(|id| self.tiles.get(&id)) {
                        None => '.',
                        Some(t) if t.is_bomb() => '*',
                        Some(t) => t.color().letter(),
                    },
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Board laid out from colour rows: letters are tiles, `*` a red bomb,
    /// `.` an empty cell, `#` a hole.
    pub(crate) fn board(rows: &[&str]) -> TileManager {
        let height = rows.len();
        let width = rows[0].len();
        let holes: Vec<usize> = rows
            .iter()
            .enumerate()
            .flat_map(|(y, row)| {
                row.chars()
                    .enumerate()
                    .filter(|&(_, c)| c == '#')
                    .map(move |(x, _)| y * width + x)
            })
            .collect();
        let mut config = BoardConfig::rectangle(width, height).with_seed(7);
        // pipes sit on the first present cell from the top of each column
        config.spawn_pipes = (0..width)
            .filter_map(|x| (0..height).map(|y| y * width + x).find(|id| !holes.contains(id)))
            .collect();
        config.holes = holes;
        let mut tm = TileManager::new(&config).unwrap();
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let cell = CellId(y * width + x);
                match c {
                    '#' | '.' => {}
                    '*' => {
                        tm.place_tile(cell, TileColor::Red, true).unwrap();
                    }
                    _ => {
                        let color = TileColor::from_letter(c).unwrap();
                        tm.place_tile(cell, color, false).unwrap();
                    }
                }
            }
        }
        tm
    }

    pub(crate) fn id_at(tm: &TileManager, x: usize, y: usize) -> TileId {
        tm.tile_at(x, y).unwrap().id()
    }

    #[test]
    fn test_board_fixture_round_trips_through_dump() {
        let rows = ["RG.", "#B*", "YMR"];
        let tm = board(&rows);
        assert_eq!(tm.dump(), "RG.\n#B*\nYMR\n");
        assert_eq!(tm.live_tile_count(), 7);
    }

    #[test]
    fn test_attach_rejects_occupied_cell() {
        let mut tm = board(&["RG"]);
        let a = id_at(&tm, 0, 0);
        let err = tm.attach(a, CellId(1)).unwrap_err();
        assert!(matches!(err, EngineError::CellOccupied { .. }));
        tm.detach(a).unwrap();
        let err = tm.attach(a, CellId(1)).unwrap_err();
        assert_eq!(
            err,
            EngineError::CellOccupied {
                cell: CellId(1),
                occupant: id_at(&tm, 1, 0)
            }
        );
        tm.attach(a, CellId(0)).unwrap();
        assert_eq!(tm.cell_of(a), Ok(CellId(0)));
    }

    #[test]
    fn test_attachment_is_bidirectional() {
        let mut tm = board(&["RG", "BY"]);
        let a = id_at(&tm, 0, 0);
        let cell = tm.detach(a).unwrap();
        assert_eq!(cell, CellId(0));
        assert!(tm.grid().cell(cell).unwrap().attached_tile().is_none());
        assert_eq!(tm.cell_of(a), Err(EngineError::TileNotAttached(a)));
        assert_eq!(tm.detach(a), Err(EngineError::TileNotAttached(a)));
    }

    #[test]
    fn test_swap_then_undo_restores_attachment() {
        let mut tm = board(&["RG", "BY"]);
        let before = tm.dump();
        let a = id_at(&tm, 0, 0);
        let b = id_at(&tm, 1, 0);
        tm.swap(a, b).unwrap();
        assert_eq!(tm.dump(), "GR\nBY\n");
        assert_eq!(tm.cell_of(a), Ok(CellId(1)));
        tm.swap(b, a).unwrap();
        assert_eq!(tm.dump(), before);
        tm.swap(a, b).unwrap();
        tm.undo_swap(a, b).unwrap();
        assert_eq!(tm.dump(), before);
    }

    #[test]
    fn test_swap_rejects_diagonal() {
        let mut tm = board(&["RG", "BY"]);
        let a = id_at(&tm, 0, 0);
        let d = id_at(&tm, 1, 1);
        assert_eq!(tm.swap(a, d), Err(EngineError::NotAdjacent(a, d)));
        assert!(!tm.are_cross_neighbors(a, d));
        // undo is the escape hatch
        tm.undo_swap(a, d).unwrap();
        assert_eq!(tm.dump(), "YG\nBR\n");
    }

    #[test]
    fn test_collapse_packs_columns_to_the_bottom() {
        let mut tm = board(&["R.G", ".B.", "Y..", "..M"]);
        let moved = tm.collapse_tiles().unwrap();
        assert_eq!(moved, 4);
        assert_eq!(tm.dump(), "...\n...\nR.G\nYBM\n");
    }

    #[test]
    fn test_collapse_over_hole() {
        let mut tm = board(&["R", "#", "."]);
        tm.collapse_tiles().unwrap();
        assert_eq!(tm.dump(), ".\n#\nR\n");
    }

    #[test]
    fn test_clear_emits_events_and_empties_cache() {
        let mut tm = board(&["RR*"]);
        let ids: Vec<TileId> = (0..3).map(|x| id_at(&tm, x, 0)).collect();
        tm.add_to_match_cache(ids.iter().copied());
        tm.add_to_match_cache([ids[0]]);
        assert_eq!(tm.matched_count(), 3);
        assert_eq!(tm.clear_matched_tiles(), Ok(3));
        assert_eq!(tm.dump(), "...\n");
        assert_eq!(tm.live_tile_count(), 0);
        assert_eq!(tm.matched_count(), 0);
        let events: Vec<_> = tm.drain_events().collect();
        let cleared = events
            .iter()
            .filter(|e| matches!(e, BoardEvent::TileCleared { .. }))
            .count();
        let shakes = events
            .iter()
            .filter(|e| matches!(e, BoardEvent::CameraShake { .. }))
            .count();
        assert_eq!((cleared, shakes), (3, 1));
        assert_eq!(tm.stats().tiles_cleared, 3);
    }

    #[test]
    fn test_bomb_matches_activator_colour() {
        let mut tm = board(&["G*B", "GRG", "BGY"]);
        let bomb = id_at(&tm, 1, 0);
        let green = id_at(&tm, 0, 0);
        assert_eq!(tm.activate(green, bomb), Ok(false));
        assert_eq!(tm.activate(bomb, green), Ok(true));
        let expected: BTreeSet<TileId> = [(0, 0), (0, 1), (2, 1), (1, 2)]
            .into_iter()
            .map(|(x, y)| id_at(&tm, x, y))
            .chain([bomb])
            .collect();
        assert_eq!(tm.match_cache(), &expected);
    }

    #[test]
    fn test_bomb_activated_by_bomb_is_inert() {
        let mut tm = board(&["**R"]);
        let a = id_at(&tm, 0, 0);
        let b = id_at(&tm, 1, 0);
        assert_eq!(tm.activate(a, b), Ok(false));
        assert_eq!(tm.matched_count(), 0);
    }
}
