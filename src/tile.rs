//! Tile: one playable piece, its frozen creation properties and the small
//! per-tile motion and fade state machines advanced by the board tick.

use crate::geom::Vec2;
use crate::grid::CellId;
use std::fmt;

pub const GRAVITY_INITIAL_FORCE: f32 = 2.0;
pub const GRAVITY_TERMINAL_FORCE: f32 = 7.5;
pub const GRAVITY_ACCELERATION: f32 = 12.0;
pub const BOUNCE_INTENSITY: f32 = 3.8;
pub const BOUNCE_DECAY: f32 = 12.0;
pub const ENTRANCE_FADE_TIME: f32 = 0.2;

/// Squared distance under which a tile counts as resting on its cell.
const REST_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u64);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileColor {
    Red,
    Green,
    Blue,
    Yellow,
    Magenta,
}

impl TileColor {
    pub const ALL: [Self; 5] = [
        Self::Red,
        Self::Green,
        Self::Blue,
        Self::Yellow,
        Self::Magenta,
    ];

    /// Single-letter code used by board dumps and test fixtures.
    pub fn letter(self) -> char {
        match self {
            Self::Red => 'R',
            Self::Green => 'G',
            Self::Blue => 'B',
            Self::Yellow => 'Y',
            Self::Magenta => 'M',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|col| col.letter() == c.to_ascii_uppercase())
    }
}

/// Gravity pass progress: `Idle -> Falling -> Bounced -> Settled`, re-entered
/// from `Settled` on the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GravityState {
    #[default]
    Idle,
    Falling,
    Bounced,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fade {
    /// Not finalized yet: invisible.
    Hidden,
    /// Finalized, waiting to drop below this y before fading in.
    Gated(f32),
    Running(f32),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Move {
    from: Vec2,
    elapsed: f32,
    duration: f32,
}

/// What happened to a tile during one `advance`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileTick {
    /// The gravity fall finished on this tick.
    pub settled: bool,
    /// The entrance fade started on this tick.
    pub fade_started: bool,
    /// A linear move reached its cell on this tick.
    pub arrived: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    id: TileId,
    color: TileColor,
    bomb: bool,
    spawn_pipe: Option<usize>,
    cell: Option<CellId>,
    fully_created: bool,
    position: Vec2,
    gravity: GravityState,
    force: f32,
    bounce: f32,
    moving: Option<Move>,
    fade: Fade,
}

impl Tile {
    pub(crate) fn new(id: TileId, color: TileColor, position: Vec2) -> Self {
        Self {
            id,
            color,
            bomb: false,
            spawn_pipe: None,
            cell: None,
            fully_created: false,
            position,
            gravity: GravityState::Idle,
            force: 0.0,
            bounce: 0.0,
            moving: None,
            fade: Fade::Hidden,
        }
    }

    #[inline]
    pub fn id(&self) -> TileId {
        self.id
    }

    #[inline]
    pub fn color(&self) -> TileColor {
        self.color
    }

    #[inline]
    pub fn is_bomb(&self) -> bool {
        self.bomb
    }

    #[inline]
    pub fn spawn_pipe(&self) -> Option<usize> {
        self.spawn_pipe
    }

    #[inline]
    pub fn cell(&self) -> Option<CellId> {
        self.cell
    }

    #[inline]
    pub fn is_fully_created(&self) -> bool {
        self.fully_created
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn gravity_state(&self) -> GravityState {
        self.gravity
    }

    /// Mid-fall or mid-bounce.
    pub fn is_falling(&self) -> bool {
        matches!(self.gravity, GravityState::Falling | GravityState::Bounced)
    }

    pub fn is_moving(&self) -> bool {
        self.moving.is_some()
    }

    /// Entrance opacity in `0..=1`.
    pub fn alpha(&self) -> f32 {
        match self.fade {
            Fade::Hidden | Fade::Gated(_) => 0.0,
            Fade::Running(elapsed) => (elapsed / ENTRANCE_FADE_TIME).clamp(0.0, 1.0),
            Fade::Done => 1.0,
        }
    }

    /// Returns false when the tile is already finalized and the value is kept.
    pub fn set_color(&mut self, color: TileColor) -> bool {
        if self.fully_created {
            return false;
        }
        self.color = color;
        true
    }

    pub fn set_bomb(&mut self, bomb: bool) -> bool {
        if self.fully_created {
            return false;
        }
        self.bomb = bomb;
        true
    }

    pub fn set_spawn_pipe(&mut self, pipe: Option<usize>) -> bool {
        if self.fully_created {
            return false;
        }
        self.spawn_pipe = pipe;
        true
    }

    pub(crate) fn set_cell(&mut self, cell: Option<CellId>) {
        self.cell = cell;
    }

    /// Freeze creation properties and arm the entrance fade. The fade starts once
    /// the tile drops below `fade_gate_y`, or right away without a gate.
    /// Idempotent.
    pub fn finalize(&mut self, fade_gate_y: Option<f32>) {
        if self.fully_created {
            return;
        }
        self.fade = match fade_gate_y {
            Some(y) => Fade::Gated(y),
            None => Fade::Running(0.0),
        };
        self.fully_created = true;
    }

    /// Start a gravity pass towards `rest`. Returns true when the tile is
    /// already resting there and settles without falling.
    pub(crate) fn begin_gravity(&mut self, rest: Vec2) -> bool {
        if self.position.sqr_distance(rest) <= REST_EPSILON {
            self.position = rest;
            self.gravity = GravityState::Settled;
            return true;
        }
        self.position.x = rest.x;
        self.gravity = GravityState::Falling;
        self.force = GRAVITY_INITIAL_FORCE;
        self.bounce = 0.0;
        false
    }

    /// Linear move to the owning cell over `duration` seconds.
    pub(crate) fn animate_to(&mut self, duration: f32) {
        self.moving = Some(Move {
            from: self.position,
            elapsed: 0.0,
            duration,
        });
    }

    /// One tick. `rest` is the owning cell's position, if attached.
    pub(crate) fn advance(&mut self, dt: f32, rest: Option<Vec2>) -> TileTick {
        let mut tick = TileTick::default();

        if let Some(rest) = rest {
            if let Some(mv) = self.moving.as_mut() {
                mv.elapsed += dt;
                let t = if mv.duration <= 0.0 {
                    1.0
                } else {
                    mv.elapsed / mv.duration
                };
                if t >= 1.0 {
                    self.position = rest;
                    self.moving = None;
                    tick.arrived = true;
                } else {
                    self.position = mv.from.lerp(rest, t);
                }
            } else if self.is_falling() {
                tick.settled = self.fall(dt, rest);
            }
        }

        match self.fade {
            Fade::Gated(gate) if self.position.y < gate => {
                self.fade = Fade::Running(0.0);
                tick.fade_started = true;
            }
            Fade::Running(elapsed) => {
                let elapsed = elapsed + dt;
                self.fade = if elapsed >= ENTRANCE_FADE_TIME {
                    Fade::Done
                } else {
                    Fade::Running(elapsed)
                };
            }
            _ => {}
        }
        tick
    }

    fn fall(&mut self, dt: f32, rest: Vec2) -> bool {
        self.force = (self.force + GRAVITY_ACCELERATION * dt).min(GRAVITY_TERMINAL_FORCE);
        self.bounce = (self.bounce - BOUNCE_DECAY * dt).max(0.0);
        self.position.y += (self.bounce - self.force) * dt;

        if self.position.y >= rest.y {
            return false;
        }
        self.position = rest;
        match self.gravity {
            GravityState::Falling => {
                self.gravity = GravityState::Bounced;
                self.force = GRAVITY_INITIAL_FORCE;
                self.bounce = BOUNCE_INTENSITY;
                false
            }
            _ => {
                self.gravity = GravityState::Settled;
                true
            }
        }
    }
}

/// Both tiles line-match: same colour and neither is a bomb.
pub fn are_match_compatible(a: &Tile, b: &Tile) -> bool {
    !a.bomb && !b.bomb && a.color == b.color
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn tile_at(y: f32) -> Tile {
        Tile::new(TileId(1), TileColor::Red, Vec2::new(0.0, y))
    }

    #[test]
    fn test_creation_props_freeze_after_finalize() {
        let mut t = tile_at(0.0);
        assert!(t.set_color(TileColor::Blue));
        assert!(t.set_bomb(true));
        t.finalize(None);
        assert!(!t.set_color(TileColor::Green));
        assert!(!t.set_bomb(false));
        assert!(!t.set_spawn_pipe(Some(3)));
        assert_eq!(t.color(), TileColor::Blue);
        assert!(t.is_bomb());
        assert_eq!(t.spawn_pipe(), None);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut t = tile_at(5.0);
        t.finalize(Some(1.0));
        t.finalize(None);
        assert_eq!(t.alpha(), 0.0);
    }

    #[test]
    fn test_resting_tile_settles_immediately() {
        let mut t = tile_at(0.0);
        assert!(t.begin_gravity(Vec2::ZERO));
        assert_eq!(t.gravity_state(), GravityState::Settled);
    }

    #[test]
    fn test_fall_bounces_once_then_settles() {
        let mut t = tile_at(2.0);
        assert!(!t.begin_gravity(Vec2::ZERO));
        let mut bounced = false;
        let mut reports = 0;
        for _ in 0..600 {
            let tick = t.advance(DT, Some(Vec2::ZERO));
            bounced |= t.gravity_state() == GravityState::Bounced;
            if tick.settled {
                reports += 1;
            }
        }
        assert!(bounced);
        assert_eq!(reports, 1);
        assert_eq!(t.gravity_state(), GravityState::Settled);
        assert_eq!(t.position(), Vec2::ZERO);
    }

    #[test]
    fn test_fall_speed_is_capped() {
        let mut t = tile_at(1000.0);
        t.begin_gravity(Vec2::ZERO);
        for _ in 0..120 {
            t.advance(DT, Some(Vec2::ZERO));
        }
        let before = t.position().y;
        t.advance(DT, Some(Vec2::ZERO));
        let step = before - t.position().y;
        assert!((step - GRAVITY_TERMINAL_FORCE * DT).abs() < 1e-3);
    }

    #[test]
    fn test_fade_waits_for_gate() {
        let mut t = tile_at(3.0);
        t.finalize(Some(1.0));
        t.begin_gravity(Vec2::ZERO);
        let mut started_at = None;
        for step in 0..600 {
            let tick = t.advance(DT, Some(Vec2::ZERO));
            if tick.fade_started {
                assert!(started_at.is_none());
                started_at = Some(step);
                assert!(t.position().y < 1.0);
            }
        }
        assert!(started_at.is_some());
        assert_eq!(t.alpha(), 1.0);
    }

    #[test]
    fn test_linear_move_arrives() {
        let mut t = tile_at(0.0);
        t.animate_to(0.1);
        let target = Vec2::new(0.7, 0.0);
        let mut arrived = false;
        for _ in 0..10 {
            arrived |= t.advance(DT, Some(target)).arrived;
        }
        assert!(arrived);
        assert!(!t.is_moving());
        assert_eq!(t.position(), target);
    }

    #[test]
    fn test_bombs_never_match() {
        let a = tile_at(0.0);
        let mut b = Tile::new(TileId(2), TileColor::Red, Vec2::ZERO);
        assert!(are_match_compatible(&a, &b));
        b.set_bomb(true);
        assert!(!are_match_compatible(&a, &b));
        assert!(!are_match_compatible(&b, &a));
    }

    #[test]
    fn test_color_letters() {
        for c in TileColor::ALL {
            assert_eq!(TileColor::from_letter(c.letter()), Some(c));
        }
        assert_eq!(TileColor::from_letter('r'), Some(TileColor::Red));
        assert_eq!(TileColor::from_letter('x'), None);
    }
}
