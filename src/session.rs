//! BoardSession: one running board. Owns the tile manager, the input manager
//! and the turn machine and advances them in a fixed order each tick.

use crate::config::BoardConfig;
use crate::error::{EngineError, SessionError};
use crate::input::{InputManager, PointerEvent};
use crate::tile_manager::{BoardEvent, TileManager};
use crate::turn::{states, TurnContext, TurnGraph, TurnMachine, TurnTimings};
use tracing::{info, instrument};

#[derive(Debug)]
pub struct BoardSession {
    tiles: TileManager,
    input: InputManager,
    turn: TurnMachine,
    swaps: u64,
    clear_passes_at_swap: u64,
}

impl BoardSession {
    /// Session running the standard turn graph.
    pub fn new(config: &BoardConfig, timings: TurnTimings) -> Result<Self, SessionError> {
        Self::with_graph(config, TurnGraph::standard(&timings))
    }

    #[instrument(skip_all, fields(width = config.width, height = config.height))]
    pub fn with_graph(config: &BoardConfig, graph: TurnGraph) -> Result<Self, SessionError> {
        let tiles = TileManager::new(config)?;
        let turn = TurnMachine::new(graph)?;
        info!(seed = tiles.seed(), "session started");
        Ok(Self {
            tiles,
            input: InputManager::new(),
            turn,
            swaps: 0,
            clear_passes_at_swap: 0,
        })
    }

    /// Advance by `dt` seconds: input first, then the turn machine, then tile
    /// motion. An error leaves the turn machine in its current state.
    pub fn tick(&mut self, dt: f32) -> Result<(), EngineError> {
        if let Some(swap) = self.input.process(&self.tiles) {
            self.swaps += 1;
            self.clear_passes_at_swap = self.tiles.stats().clear_passes;
            self.tiles.push_event(BoardEvent::SwapDetected {
                a: swap.a,
                b: swap.b,
            });
        }
        let mut ctx = TurnContext {
            tiles: &mut self.tiles,
            input: &mut self.input,
        };
        self.turn.tick(dt, &mut ctx)?;
        self.tiles.advance(dt);
        self.input.advance(dt);
        Ok(())
    }

    /// Queue pointer input; ignored unless the board is waiting for a move.
    pub fn pointer(&mut self, event: PointerEvent) {
        self.input.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<BoardEvent> {
        self.tiles.drain_events().collect()
    }

    #[inline]
    pub fn tiles(&self) -> &TileManager {
        &self.tiles
    }

    #[inline]
    pub fn input(&self) -> &InputManager {
        &self.input
    }

    pub fn state_name(&self) -> &str {
        self.turn.current_state()
    }

    pub fn is_awaiting_input(&self) -> bool {
        self.turn.current_state() == states::AWAIT_INPUT
    }

    /// Tiles cleared so far.
    pub fn score(&self) -> u64 {
        self.tiles.stats().tiles_cleared
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Clear passes since the last swap: 1 for a plain match, more for cascades.
    pub fn cascade(&self) -> u64 {
        self.tiles.stats().clear_passes - self.clear_passes_at_swap
    }
}
