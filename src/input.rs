//! InputManager: resolves taps and swipes into swaps between neighbouring tiles.
//!
//! Pointer events are queued by the front-end at any time and evaluated on the
//! next tick, and only while processing is switched on by the turn machine.

use crate::config::TILE_SIZE;
use crate::geom::{Direction, Vec2};
use crate::tile::TileId;
use crate::tile_manager::TileManager;
use std::collections::VecDeque;
use tracing::debug;

/// Minimum cosine between a swipe and a cardinal direction.
pub const SWIPE_DOT_THRESHOLD: f32 = 0.9;

/// Pointer input in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Button pressed: a tap.
    Down(Vec2),
    /// Pointer moved with the button held.
    Drag(Vec2),
    Up(Vec2),
}

/// Two tiles the player asked to exchange; `a` was selected first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swap {
    pub a: TileId,
    pub b: TileId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Idle,
    TileSelected(TileId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CursorAnimation {
    from: Vec2,
    to: Vec2,
    elapsed: f32,
    duration: f32,
}

#[derive(Debug, Clone, Default)]
pub struct InputManager {
    processing: bool,
    state: InputState,
    held: bool,
    queue: VecDeque<PointerEvent>,
    last_swap: Option<Swap>,
    swap_pending: bool,
    cursor: Option<Vec2>,
    cursor_animation: Option<CursorAnimation>,
    cursor_done: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    #[inline]
    pub fn state(&self) -> InputState {
        self.state
    }

    pub fn start_processing_input(&mut self) {
        self.processing = true;
    }

    /// Stop evaluating input and drop the current selection.
    pub fn stop_processing_input(&mut self) {
        self.processing = false;
        self.state = InputState::Idle;
        self.held = false;
        self.queue.clear();
    }

    /// Queue a pointer event for the next tick.
    pub fn push(&mut self, event: PointerEvent) {
        if self.processing {
            self.queue.push_back(event);
        }
    }

    /// Most recent swap, kept after it has been consumed.
    pub fn last_swap(&self) -> Option<Swap> {
        self.last_swap
    }

    /// The "swap happened" notification: `Some` exactly once per swap.
    pub fn take_swap(&mut self) -> Option<Swap> {
        if std::mem::take(&mut self.swap_pending) {
            self.last_swap
        } else {
            None
        }
    }

    /// Where the feedback cursor is drawn, if visible.
    pub fn cursor_position(&self) -> Option<Vec2> {
        match self.cursor_animation {
            Some(anim) => {
                let t = if anim.duration <= 0.0 {
                    1.0
                } else {
                    anim.elapsed / anim.duration
                };
                Some(anim.from.lerp(anim.to, t))
            }
            None => self.cursor,
        }
    }

    /// Evaluate queued pointer events against the board. Returns the swap
    /// detected on this tick, if any. Events queued behind a swap are dropped.
    pub fn process(&mut self, tiles: &TileManager) -> Option<Swap> {
        if !self.processing {
            self.queue.clear();
            return None;
        }
        while let Some(event) = self.queue.pop_front() {
            let swap = match event {
                PointerEvent::Down(point) => {
                    self.held = true;
                    self.tap(tiles, point)
                }
                PointerEvent::Drag(point) if self.held => self.swipe(tiles, point),
                PointerEvent::Drag(_) => None,
                PointerEvent::Up(_) => {
                    self.held = false;
                    None
                }
            };
            if let Some(swap) = swap {
                self.emit(swap);
                self.queue.clear();
                return Some(swap);
            }
        }
        None
    }

    fn emit(&mut self, swap: Swap) {
        debug!(a = %swap.a, b = %swap.b, "swap input");
        self.last_swap = Some(swap);
        self.swap_pending = true;
        self.state = InputState::Idle;
        // one swap per gesture
        self.held = false;
    }

    fn select(&mut self, tiles: &TileManager, tile: TileId) {
        self.state = InputState::TileSelected(tile);
        self.cursor = tiles
            .cell_of(tile)
            .ok()
            .and_then(|c| tiles.grid().cell(c))
            .map(|c| c.position);
    }

    fn tap(&mut self, tiles: &TileManager, point: Vec2) -> Option<Swap> {
        let tapped = tiles.grid().nearest_cell_to(point)?.attached_tile()?;
        match self.state {
            InputState::Idle => {
                self.select(tiles, tapped);
                None
            }
            InputState::TileSelected(selected) if selected == tapped => None,
            InputState::TileSelected(selected) if tiles.are_cross_neighbors(selected, tapped) => {
                Some(Swap {
                    a: selected,
                    b: tapped,
                })
            }
            InputState::TileSelected(_) => {
                self.select(tiles, tapped);
                None
            }
        }
    }

    fn swipe(&mut self, tiles: &TileManager, point: Vec2) -> Option<Swap> {
        let InputState::TileSelected(selected) = self.state else {
            return None;
        };
        let cell = tiles.cell_of(selected).ok()?;
        let origin = tiles.grid().cell(cell)?.position;
        let reach = TILE_SIZE / 2.0 + tiles.grid().spacing() / 2.0;
        let delta = point - origin;
        if delta.sqr_magnitude() <= reach * reach {
            return None;
        }
        let heading = delta.normalized();
        let direction = Direction::ALL
            .into_iter()
            .find(|d| heading.dot(d.unit()) >= SWIPE_DOT_THRESHOLD)?;
        let neighbor = tiles.grid().neighbor(cell, direction)?.attached_tile()?;
        Some(Swap {
            a: selected,
            b: neighbor,
        })
    }

    /// Move the cursor from the first to the second tile of the last swap
    /// over `duration` seconds.
    pub fn animate_cursor_indicate_swap(&mut self, tiles: &TileManager, duration: f32) -> bool {
        let Some(swap) = self.last_swap else {
            return false;
        };
        let position = |id| {
            tiles
                .cell_of(id)
                .ok()
                .and_then(|c| tiles.grid().cell(c))
                .map(|c| c.position)
        };
        let (Some(from), Some(to)) = (position(swap.a), position(swap.b)) else {
            return false;
        };
        self.cursor_animation = Some(CursorAnimation {
            from,
            to,
            elapsed: 0.0,
            duration,
        });
        self.cursor_done = false;
        true
    }

    /// True once after the cursor animation finishes; the cursor is hidden then.
    pub fn take_cursor_animation_done(&mut self) -> bool {
        std::mem::take(&mut self.cursor_done)
    }

    /// Advance the cursor animation.
    pub fn advance(&mut self, dt: f32) {
        if let Some(anim) = self.cursor_animation.as_mut() {
            anim.elapsed += dt;
            if anim.elapsed >= anim.duration {
                self.cursor_animation = None;
                self.cursor = None;
                self.cursor_done = true;
            }
        }
    }
}
