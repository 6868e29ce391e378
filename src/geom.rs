//! World-space vectors and the four cardinal directions.
//!
//! World space is y-up: row 0 of the grid is the highest row on screen, so moving
//! "up" a row means a larger y.

use std::ops::{Add, AddAssign, Mul, Sub};

/// 2D point or vector in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);
    pub const UP: Self = Self::new(0.0, 1.0);
    pub const DOWN: Self = Self::new(0.0, -1.0);
    pub const LEFT: Self = Self::new(-1.0, 0.0);
    pub const RIGHT: Self = Self::new(1.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn sqr_magnitude(self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn sqr_distance(self, other: Self) -> f32 {
        (self - other).sqr_magnitude()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalized(self) -> Self {
        let len = self.sqr_magnitude().sqrt();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Linear interpolation; `t` is clamped to `0..=1`.
    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(self.x + (to.x - self.x) * t, self.y + (to.y - self.y) * t)
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Cardinal direction on the grid (Up = towards row 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Unit vector in world space.
    pub fn unit(self) -> Vec2 {
        match self {
            Self::Up => Vec2::UP,
            Self::Down => Vec2::DOWN,
            Self::Left => Vec2::LEFT,
            Self::Right => Vec2::RIGHT,
        }
    }

    /// Grid index offset (dx, dy); y grows downwards in index space.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Corner of a cell's square, used for outline vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Sign of the (x, y) offset from the cell centre.
    pub fn signs(self) -> (f32, f32) {
        match self {
            Self::TopLeft => (-1.0, 1.0),
            Self::TopRight => (1.0, 1.0),
            Self::BottomLeft => (-1.0, -1.0),
            Self::BottomRight => (1.0, -1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_unit_length() {
        let v = Vec2::new(3.0, 4.0).normalized();
        assert!((v.sqr_magnitude() - 1.0).abs() < 1e-6);
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
    }

    #[test]
    fn test_lerp_clamps() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(2.0, -2.0);
        assert_eq!(a.lerp(b, 0.5), Vec2::new(1.0, -1.0));
        assert_eq!(a.lerp(b, 3.0), b);
    }

    #[test]
    fn test_direction_unit_matches_offset() {
        for d in Direction::ALL {
            let (dx, dy) = d.offset();
            let u = d.unit();
            // index y is inverted relative to world y
            assert_eq!(u.x as i32, dx);
            assert_eq!(u.y as i32, -dy);
            assert_eq!(d.opposite().opposite(), d);
        }
    }
}
