//! Axis-aligned bounding boxes in longitude/latitude space.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle. `x` is longitude and `y` is latitude.
///
/// Boxes are closed: two boxes sharing only an edge or a corner intersect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western edge.
    pub min_x: f64,
    /// Southern edge.
    pub min_y: f64,
    /// Eastern edge.
    pub max_x: f64,
    /// Northern edge.
    pub max_y: f64,
}

impl BoundingBox {
    /// The empty box: the identity of [`BoundingBox::union`], intersecting nothing.
    pub const EMPTY: Self = Self {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    /// Build a box from two corners, in any order.
    #[must_use]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// A degenerate box covering one point.
    #[must_use]
    pub const fn point(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    /// Returns true for [`BoundingBox::EMPTY`] and any other inverted box.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Closed-interval overlap test on both axes.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Returns true if `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    /// Smallest box covering both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Area of the box; zero for empty and degenerate boxes.
    #[must_use]
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// How much the area grows if `other` is merged in.
    #[must_use]
    pub fn enlargement(&self, other: &Self) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Grow the box by a fraction of its own width and height on every side.
    #[must_use]
    pub fn expand(&self, fraction: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        let dx = (self.max_x - self.min_x) * fraction;
        let dy = (self.max_y - self.min_y) * fraction;
        Self {
            min_x: self.min_x - dx,
            min_y: self.min_y - dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }

    /// Axis-wise `(min, max)` pair, `axis` 0 for x and 1 for y.
    pub(crate) const fn extent(&self, axis: usize) -> (f64, f64) {
        if axis == 0 {
            (self.min_x, self.max_x)
        } else {
            (self.min_y, self.max_y)
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl FromIterator<Self> for BoundingBox {
    fn from_iter<I: IntoIterator<Item = Self>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |acc, b| acc.union(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_edge_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&BoundingBox::new(10.5, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn test_empty_is_union_identity() {
        let a = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(BoundingBox::EMPTY.union(&a), a);
        assert!(!BoundingBox::EMPTY.intersects(&a));
        assert!(BoundingBox::EMPTY.area().abs() < f64::EPSILON);
    }

    #[test]
    fn test_enlargement() {
        let a = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let inside = BoundingBox::point(1.0, 1.0);
        let outside = BoundingBox::new(2.0, 0.0, 4.0, 2.0);
        assert!(a.enlargement(&inside).abs() < f64::EPSILON);
        assert!((a.enlargement(&outside) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_expand() {
        let a = BoundingBox::new(0.0, 0.0, 4.0, 8.0).expand(0.25);
        assert_eq!(a, BoundingBox::new(-1.0, -2.0, 5.0, 10.0));
    }
}
