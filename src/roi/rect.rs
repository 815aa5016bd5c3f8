//! Axis-aligned integer rectangles used while merging regions.

use super::coords::Coords;

/// An axis-aligned rectangle in XYWH form.
///
/// Rectangles with zero or negative extent are "empty": they never
/// intersect and never contain anything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rectangle {
    #[inline]
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from its corners.
    #[inline]
    pub fn from_corners(low_x: i64, low_y: i64, high_x: i64, high_y: i64) -> Self {
        Self::new(low_x, low_y, high_x - low_x, high_y - low_y)
    }

    #[inline]
    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }

    /// Returns true if the rectangle has no positive area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Returns the area, or zero for empty rectangles.
    #[inline]
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width * self.height
        }
    }

    /// Returns true if the two rectangles share a region of positive area.
    pub fn intersects(&self, other: &Rectangle) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Returns true if `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rectangle) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Returns the overlap of the two rectangles.
    ///
    /// The result is empty (possibly with negative extent) when they do not
    /// intersect.
    pub fn intersection(&self, other: &Rectangle) -> Rectangle {
        Rectangle::from_corners(
            self.x.max(other.x),
            self.y.max(other.y),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        )
    }

    /// Returns the smallest rectangle containing both.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }
}

impl From<Coords> for Rectangle {
    fn from(c: Coords) -> Self {
        Rectangle::from_corners(c.low_x as i64, c.low_y as i64, c.high_x as i64, c.high_y as i64)
    }
}
