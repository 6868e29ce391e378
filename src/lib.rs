//! match3tui — match-3 board simulation: grid, tiles, matching, gravity and
//! the turn state machine that sequences a move.

pub mod config;
pub mod counter2d;
pub mod error;
pub mod geom;
pub mod gravity;
pub mod grid;
pub mod input;
pub mod matching;
pub mod session;
pub mod spawn;
pub mod tile;
pub mod tile_manager;
pub mod turn;

pub use config::BoardConfig;
pub use error::{ConfigError, EngineError, SessionError};
pub use geom::{Direction, Vec2};
pub use grid::{Cell, CellId, Grid};
pub use input::{InputManager, PointerEvent, Swap};
pub use session::BoardSession;
pub use tile::{Tile, TileColor, TileId};
pub use tile_manager::{BoardEvent, TileManager};
pub use turn::{TurnGraph, TurnMachine, TurnTimings};
