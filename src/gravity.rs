//! Gravity pass fan-out/fan-in and the per-tick tile advance.
//!
//! A pass snapshots the ids of every attached tile into a pending set before
//! any tile starts moving. Each tile leaves the set when it reports settling;
//! the pass completes exactly once, when the set drains. Tiles removed during
//! a pass leave the set silently, tiles created during a pass are not part of it.

use crate::tile::TileId;
use crate::tile_manager::{BoardEvent, TileManager};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub(crate) struct GravityPass {
    pending: BTreeSet<TileId>,
    active: bool,
    complete: bool,
}

impl GravityPass {
    fn finish(&mut self) {
        self.active = false;
        self.complete = true;
    }
}

impl TileManager {
    /// Start a gravity pass over every attached tile. Returns the number of
    /// tiles the pass waits for; zero means it already completed.
    pub fn apply_gravity_to_all_tiles(&mut self) -> usize {
        self.gravity.pending = self
            .tiles
            .values()
            .filter(|t| t.cell().is_some())
            .map(|t| t.id())
            .collect();
        self.gravity.active = true;
        self.gravity.complete = false;
        let total = self.gravity.pending.len();

        let mut resting = Vec::new();
        for tile in self.tiles.values_mut() {
            let Some(rest) = tile.cell().and_then(|c| self.grid.cell(c)).map(|c| c.position) else {
                continue;
            };
            if tile.begin_gravity(rest) {
                resting.push(tile.id());
            }
        }
        debug!(total, resting = resting.len(), "gravity pass started");

        if total == 0 {
            self.finish_gravity_pass();
        }
        for id in resting {
            self.report_settled(id);
        }
        self.gravity.pending.len()
    }

    /// True once per completed pass; reading clears the latch.
    pub fn take_gravity_complete(&mut self) -> bool {
        std::mem::take(&mut self.gravity.complete)
    }

    pub fn is_gravity_pass_active(&self) -> bool {
        self.gravity.active
    }

    pub fn gravity_pending_count(&self) -> usize {
        self.gravity.pending.len()
    }

    fn report_settled(&mut self, id: TileId) {
        if !self.gravity.active || !self.gravity.pending.remove(&id) {
            warn!(tile = %id, "settle report outside the current gravity pass");
            return;
        }
        if self.gravity.pending.is_empty() {
            self.finish_gravity_pass();
        }
    }

    /// Drop a tile that left the board from the current pass.
    pub(crate) fn forget_gravity(&mut self, id: TileId) {
        if self.gravity.active && self.gravity.pending.remove(&id) && self.gravity.pending.is_empty() {
            self.finish_gravity_pass();
        }
    }

    fn finish_gravity_pass(&mut self) {
        self.gravity.finish();
        self.push_event(BoardEvent::GravitySettled);
        info!(live = self.tiles.len(), "gravity pass settled");
    }

    /// Advance every tile's motion and fade by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        let mut settled = Vec::new();
        let mut fades = Vec::new();
        for tile in self.tiles.values_mut() {
            let rest = tile.cell().and_then(|c| self.grid.cell(c)).map(|c| c.position);
            let tick = tile.advance(dt, rest);
            if tick.settled {
                settled.push(tile.id());
            }
            if tick.fade_started {
                fades.push((tile.id(), tile.position()));
            }
        }
        for (tile, position) in fades {
            self.push_event(BoardEvent::EntranceFade { tile, position });
        }
        for id in settled {
            self.report_settled(id);
        }
    }

    /// Whether any tile is still falling or moving.
    pub fn is_animating(&self) -> bool {
        self.tiles.values().any(|t| t.is_falling() || t.is_moving())
    }
}
