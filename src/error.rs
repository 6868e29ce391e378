//! Error types: fatal board setup errors and engine invariant violations.

use crate::grid::CellId;
use crate::tile::TileId;
use thiserror::Error;

/// Malformed board configuration, detected before any cell is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("board must be at least 1x1, got {width}x{height}")]
    EmptyBoard { width: usize, height: usize },
    #[error("cell spacing must be finite and non-negative, got {0}")]
    InvalidSpacing(f32),
    #[error("hole id {id} is outside the {width}x{height} board")]
    HoleOutOfRange { id: usize, width: usize, height: usize },
    #[error("spawn pipe id {0} is outside the board")]
    SpawnPipeOutOfRange(usize),
    #[error("spawn pipe id {0} references a hole")]
    SpawnPipeOnHole(usize),
    #[error("pipe path id {0} is outside the board or references a hole")]
    InvalidPipePath(usize),
    #[error("board has no spawn pipes")]
    NoSpawnPipes,
    #[error("column {0} has cells but no spawn pipe")]
    ColumnWithoutPipe(usize),
    #[error("bomb chance must be within 0..=1, got {0}")]
    InvalidBombChance(f32),
}

/// Invariant violation inside the engine. The operation that returns it has not
/// mutated the board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("cell {0} does not exist")]
    UnknownCell(CellId),
    #[error("tile {0} does not exist")]
    UnknownTile(TileId),
    #[error("cell {cell} already holds tile {occupant}")]
    CellOccupied { cell: CellId, occupant: TileId },
    #[error("tile {0} is not attached to a cell")]
    TileNotAttached(TileId),
    #[error("tile {0} is already attached to cell {1}")]
    TileAlreadyAttached(TileId, CellId),
    #[error("tiles {0} and {1} are not cross neighbours")]
    NotAdjacent(TileId, TileId),
    #[error("cell ({x}, {y}) is empty inside a match scan")]
    EmptyCellInScan { x: usize, y: usize },
    #[error("tile {0} cannot be cleared while it is falling")]
    TileInMotion(TileId),
    #[error("spawn pipe {0} has no empty cell in its column")]
    PipeFull(usize),
    #[error("spawn pipe {0} does not exist")]
    UnknownPipe(usize),
    #[error("no swap has been recorded yet")]
    NoSwapRecorded,
    #[error("turn graph references unknown state {0:?}")]
    UnknownState(String),
}

/// Anything that can stop a board session from being built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
