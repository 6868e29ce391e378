//! Grid: the board's cells, their geometry and spatial queries.
//!
//! Cells are stored flat in row-major order so a cell's id is also its index:
//! `id = y * width + x`. Row 0 is the top row; in world space each row sits one
//! pitch lower (-y) than the row above it. Holes are stored as `None` and are
//! skipped by every query.

use crate::config::{BoardConfig, TILE_SIZE};
use crate::counter2d::Counter2D;
use crate::error::ConfigError;
use crate::geom::{Corner, Direction, Vec2};
use crate::tile::TileId;
use std::collections::HashSet;
use std::fmt;

/// Canonical cell address (`y * width + x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub usize);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One addressable slot of the board.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub id: CellId,
    pub x: usize,
    pub y: usize,
    pub position: Vec2,
    attached: Option<TileId>,
}

impl Cell {
    #[inline]
    pub fn attached_tile(&self) -> Option<TileId> {
        self.attached
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.attached.is_some()
    }

    /// Corner of the square of half-side `half` centred on this cell.
    pub fn vertex(&self, corner: Corner, half: f32) -> Vec2 {
        let (sx, sy) = corner.signs();
        Vec2::new(self.position.x + sx * half, self.position.y + sy * half)
    }
}

/// Straight outline piece in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Vec2,
    pub to: Vec2,
}

#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    spacing: f32,
    origin: Vec2,
    cells: Vec<Option<Cell>>,
    spawner_cells: Vec<CellId>,
    pipe_path: HashSet<CellId>,
}

impl Grid {
    /// Build the cells described by `config`; fails on malformed boards.
    pub fn new(config: &BoardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let holes: HashSet<usize> = config.holes.iter().copied().collect();
        let pitch = config.pitch();
        let cells = (0..config.cell_count())
            .map(|id| {
                if holes.contains(&id) {
                    return None;
                }
                let (x, y) = (id % config.width, id / config.width);
                Some(Cell {
                    id: CellId(id),
                    x,
                    y,
                    position: Vec2::new(
                        config.origin.x + x as f32 * pitch,
                        config.origin.y - y as f32 * pitch,
                    ),
                    attached: None,
                })
            })
            .collect();
        Ok(Self {
            width: config.width,
            height: config.height,
            spacing: config.spacing,
            origin: config.origin,
            cells,
            spawner_cells: config.spawn_pipes.iter().map(|&id| CellId(id)).collect(),
            pipe_path: config.pipe_path.iter().map(|&id| CellId(id)).collect(),
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    #[inline]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        TILE_SIZE + self.spacing
    }

    /// Id for in-bounds coordinates, whether or not the cell is a hole.
    #[inline]
    pub fn id_of(&self, x: usize, y: usize) -> Option<CellId> {
        (x < self.width && y < self.height).then(|| CellId(y * self.width + x))
    }

    /// Present cell at (x, y); `None` when out of bounds or a hole.
    pub fn cell_at(&self, x: usize, y: usize) -> Option<&Cell> {
        self.id_of(x, y).and_then(|id| self.cell(id))
    }

    /// Present cell with this id; `None` for holes and ids outside the board.
    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.0).and_then(Option::as_ref)
    }

    /// Every present cell in id order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    pub(crate) fn set_attached(&mut self, id: CellId, tile: Option<TileId>) {
        if let Some(Some(cell)) = self.cells.get_mut(id.0) {
            cell.attached = tile;
        }
    }

    /// Closest present cell to `point`, if it lies within half a pitch of it.
    pub fn nearest_cell_to(&self, point: Vec2) -> Option<&Cell> {
        let reach = TILE_SIZE / 2.0 + self.spacing / 2.0;
        let too_far = reach * reach;
        let mut best: Option<(&Cell, f32)> = None;
        for cell in self.cells() {
            let d = point.sqr_distance(cell.position);
            if d < too_far && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((cell, d));
            }
        }
        best.map(|(cell, _)| cell)
    }

    pub fn empty_cell_count_in_column(&self, x: usize) -> usize {
        (0..self.height)
            .filter_map(|y| self.cell_at(x, y))
            .filter(|c| !c.is_full())
            .count()
    }

    /// Lowest present, unattached cell of column `x`, scanning bottom-up.
    pub fn lowest_empty_cell_in_column(&self, x: usize) -> Option<CellId> {
        (0..self.height)
            .rev()
            .filter_map(|y| self.cell_at(x, y))
            .find(|c| !c.is_full())
            .map(|c| c.id)
    }

    /// Cell next to `id` in `direction`; `None` at the board edge or next to a hole.
    pub fn neighbor(&self, id: CellId, direction: Direction) -> Option<&Cell> {
        let cell = self.cell(id)?;
        let (dx, dy) = direction.offset();
        let nx = cell.x.checked_add_signed(dx as isize)?;
        let ny = cell.y.checked_add_signed(dy as isize)?;
        self.cell_at(nx, ny)
    }

    /// Reference cell of each spawn pipe, in pipe order.
    pub fn spawner_reference_cells(&self) -> &[CellId] {
        &self.spawner_cells
    }

    pub fn is_pipe_path(&self, id: CellId) -> bool {
        self.pipe_path.contains(&id)
    }

    pub fn has_pipe_path(&self) -> bool {
        !self.pipe_path.is_empty()
    }

    /// Outline of the region selected by `filter`, merged into straight runs.
    ///
    /// Four passes: rows looking up, rows looking down, columns looking left,
    /// columns looking right. A cell contributes an edge when it passes the
    /// filter and its neighbour in the pass direction is missing or fails it.
    pub fn compute_border_segments(&self, filter: impl Fn(&Cell) -> bool) -> Vec<Segment> {
        let half = self.pitch() / 2.0;
        let mut outlines = Vec::new();
        let mut counter = Counter2D::new(self.width - 1, self.height - 1);

        let passes = [
            (Corner::TopLeft, Corner::TopRight, Direction::Up, false),
            (Corner::BottomLeft, Corner::BottomRight, Direction::Down, false),
            (Corner::TopLeft, Corner::BottomLeft, Direction::Left, true),
            (Corner::TopRight, Corner::BottomRight, Direction::Right, true),
        ];

        for (from_corner, to_corner, look, columns) in passes {
            counter.invert_dimensions(columns);
            counter.reset();

            let mut open: Option<Segment> = None;
            let mut last: Option<&Cell> = None;

            while !counter.completed() {
                let (x, y) = (counter.i(), counter.j());
                let cell = self.cell_at(x, y);
                let is_edge = cell.is_some_and(|c| {
                    filter(c) && self.neighbor(c.id, look).is_none_or(|n| !filter(n))
                });

                match (cell, is_edge) {
                    (Some(c), true) => {
                        match open.as_mut() {
                            Some(seg) => seg.to = c.vertex(to_corner, half),
                            None => {
                                open = Some(Segment {
                                    from: c.vertex(from_corner, half),
                                    to: c.vertex(to_corner, half),
                                });
                            }
                        }
                        last = Some(c);
                    }
                    _ => {
                        if let (Some(mut seg), Some(prev)) = (open.take(), last) {
                            seg.to = prev.vertex(to_corner, half);
                            outlines.push(seg);
                        }
                    }
                }

                if counter.secondary_dimension_completed() {
                    if let Some(seg) = open.take() {
                        outlines.push(seg);
                    }
                }
                counter.advance();
            }
        }
        outlines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(w: usize, h: usize, holes: &[usize]) -> Grid {
        Grid::new(&BoardConfig::rectangle(w, h).with_holes(holes.iter().copied())).unwrap()
    }

    #[test]
    fn test_id_and_coordinates_agree() {
        let g = grid(5, 4, &[7]);
        for y in 0..4 {
            for x in 0..5 {
                match g.cell_at(x, y) {
                    Some(cell) => {
                        assert_eq!(g.cell(cell.id), Some(cell));
                        assert_eq!(cell.id.0, y * 5 + x);
                    }
                    None => assert_eq!(y * 5 + x, 7),
                }
            }
        }
        assert!(g.cell(CellId(20)).is_none());
        assert_eq!(g.cells().count(), 19);
    }

    #[test]
    fn test_positions_grow_down_and_right() {
        let g = grid(3, 3, &[]);
        let a = g.cell_at(0, 0).unwrap().position;
        let b = g.cell_at(1, 1).unwrap().position;
        assert!(b.x > a.x);
        assert!(b.y < a.y);
        assert!((b.x - a.x - g.pitch()).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_cell_threshold() {
        let g = grid(3, 3, &[]);
        let target = g.cell_at(1, 2).unwrap();
        let near = target.position + Vec2::new(0.1, -0.1);
        assert_eq!(g.nearest_cell_to(near).map(|c| c.id), Some(target.id));
        let far = Vec2::new(-5.0, 5.0);
        assert!(g.nearest_cell_to(far).is_none());
    }

    #[test]
    fn test_lowest_empty_skips_holes_and_full_cells() {
        let mut g = grid(2, 4, &[6]); // (0, 3) is a hole
        assert_eq!(g.lowest_empty_cell_in_column(0), Some(CellId(4)));
        g.set_attached(CellId(4), Some(TileId(1)));
        assert_eq!(g.lowest_empty_cell_in_column(0), Some(CellId(2)));
        assert_eq!(g.empty_cell_count_in_column(0), 2);
        assert_eq!(g.empty_cell_count_in_column(1), 4);
    }

    #[test]
    fn test_neighbor_edges_and_holes() {
        let g = grid(3, 3, &[4]);
        assert!(g.neighbor(CellId(0), Direction::Up).is_none());
        assert!(g.neighbor(CellId(0), Direction::Left).is_none());
        assert_eq!(g.neighbor(CellId(0), Direction::Right).map(|c| c.id), Some(CellId(1)));
        assert_eq!(g.neighbor(CellId(0), Direction::Down).map(|c| c.id), Some(CellId(3)));
        assert!(g.neighbor(CellId(1), Direction::Down).is_none());
        assert!(g.neighbor(CellId(8), Direction::Right).is_none());
    }

    #[test]
    fn test_border_of_full_board_is_four_segments() {
        let g = grid(3, 2, &[]);
        let segs = g.compute_border_segments(|_| true);
        assert_eq!(segs.len(), 4);
        let half = g.pitch() / 2.0;
        let top = segs[0];
        assert_eq!(top.from, g.cell_at(0, 0).unwrap().vertex(Corner::TopLeft, half));
        assert_eq!(top.to, g.cell_at(2, 0).unwrap().vertex(Corner::TopRight, half));
    }

    #[test]
    fn test_border_around_hole() {
        // 3x3 with the centre missing: outer ring plus the hole's four edges.
        let g = grid(3, 3, &[4]);
        let segs = g.compute_border_segments(|_| true);
        assert_eq!(segs.len(), 8);
    }

    #[test]
    fn test_border_of_filtered_single_cell() {
        let g = grid(3, 3, &[]);
        let segs = g.compute_border_segments(|c| c.id == CellId(4));
        assert_eq!(segs.len(), 4);
        let half = g.pitch() / 2.0;
        let centre = g.cell(CellId(4)).unwrap();
        assert!(segs.contains(&Segment {
            from: centre.vertex(Corner::TopLeft, half),
            to: centre.vertex(Corner::TopRight, half),
        }));
    }
}
