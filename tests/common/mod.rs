//! Shared fixtures: boards laid out from colour rows.

#![allow(dead_code)]

use match3tui::{BoardConfig, CellId, TileColor, TileId, TileManager};

/// Build a finalized, resting board. Letters are tile colours, `*` is a red
/// bomb, `.` an empty cell and `#` a hole. Every column gets a pipe on its
/// topmost present cell.
pub fn board(rows: &[&str]) -> TileManager {
    let height = rows.len();
    let width = rows[0].len();
    let mut holes = Vec::new();
    for (y, row) in rows.iter().enumerate() {
        for (x, c) in row.chars().enumerate() {
            if c == '#' {
                holes.push(y * width + x);
            }
        }
    }
    let mut config = BoardConfig::rectangle(width, height).with_seed(99);
    config.spawn_pipes = (0..width)
        .filter_map(|x| (0..height).map(|y| y * width + x).find(|id| !holes.contains(id)))
        .collect();
    config.holes = holes;

    let mut tiles = TileManager::new(&config).expect("fixture config is valid");
    for (y, row) in rows.iter().enumerate() {
        for (x, c) in row.chars().enumerate() {
            let cell = CellId(y * width + x);
            match c {
                '#' | '.' => {}
                '*' => {
                    tiles.place_tile(cell, TileColor::Red, true).unwrap();
                }
                _ => {
                    let color = TileColor::from_letter(c).expect("known colour letter");
                    tiles.place_tile(cell, color, false).unwrap();
                }
            }
        }
    }
    tiles
}

pub fn id_at(tiles: &TileManager, x: usize, y: usize) -> TileId {
    tiles.tile_at(x, y).expect("tile at position").id()
}

/// Advance tile motion until the current gravity pass completes.
pub fn settle(tiles: &mut TileManager) -> usize {
    let mut completions = 0;
    for _ in 0..1200 {
        tiles.advance(1.0 / 60.0);
        if tiles.take_gravity_complete() {
            completions += 1;
        }
        if !tiles.is_gravity_pass_active() && !tiles.is_animating() {
            break;
        }
    }
    completions
}
