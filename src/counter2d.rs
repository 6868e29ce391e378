//! Bounded 2D iteration cursor used by the border-outline walk.
//!
//! Iterates `i` in `0..=i_target` and `j` in `0..=j_target`. By default `i` is the
//! inner (secondary) dimension, so the walk is row-major; inverting makes `j` the
//! inner dimension (column-major).

#[derive(Debug, Clone)]
pub struct Counter2D {
    i: usize,
    j: usize,
    i_target: usize,
    j_target: usize,
    inverted: bool,
}

impl Counter2D {
    pub fn new(i_target: usize, j_target: usize) -> Self {
        Self {
            i: 0,
            j: 0,
            i_target,
            j_target,
            inverted: false,
        }
    }

    #[inline]
    pub fn i(&self) -> usize {
        self.i
    }

    #[inline]
    pub fn j(&self) -> usize {
        self.j
    }

    pub fn invert_dimensions(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    pub fn reset(&mut self) {
        self.i = 0;
        self.j = 0;
    }

    pub fn completed(&self) -> bool {
        self.i > self.i_target || self.j > self.j_target
    }

    /// True on the last position of the current row (or column when inverted).
    pub fn secondary_dimension_completed(&self) -> bool {
        if self.inverted {
            self.j >= self.j_target
        } else {
            self.i >= self.i_target
        }
    }

    pub fn advance(&mut self) {
        if self.inverted {
            self.j += 1;
            if self.j > self.j_target {
                self.i += 1;
                if self.i <= self.i_target {
                    self.j = 0;
                }
            }
        } else {
            self.i += 1;
            if self.i > self.i_target {
                self.j += 1;
                if self.j <= self.j_target {
                    self.i = 0;
                }
            }
        }
    }
}

impl Iterator for Counter2D {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.completed() {
            return None;
        }
        let item = (self.i, self.j);
        self.advance();
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_order() {
        let visited: Vec<_> = Counter2D::new(2, 1).collect();
        assert_eq!(visited, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_column_major_when_inverted() {
        let mut c = Counter2D::new(1, 2);
        c.invert_dimensions(true);
        let visited: Vec<_> = c.collect();
        assert_eq!(visited, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_secondary_dimension_completed_at_row_end() {
        let mut c = Counter2D::new(2, 0);
        let mut ends = Vec::new();
        while !c.completed() {
            ends.push(c.secondary_dimension_completed());
            c.advance();
        }
        assert_eq!(ends, vec![false, false, true]);
    }

    #[test]
    fn test_reset_restarts_walk() {
        let mut c = Counter2D::new(0, 0);
        c.advance();
        assert!(c.completed());
        c.reset();
        assert!(!c.completed());
        assert_eq!((c.i(), c.j()), (0, 0));
    }
}
