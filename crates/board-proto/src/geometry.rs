//! Grid geometry: positions and sizes in dashboard cells.

use serde::{Deserialize, Serialize};

/// Size of a rectangular area in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    /// Width in grid cells.
    pub width: u32,
    /// Height in grid cells.
    pub height: u32,
}

impl GridSize {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Area in grid cells.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check whether a rectangle of this size fits inside `other`.
    #[must_use]
    pub const fn fits_in(&self, other: Self) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

/// Position and size of a rectangle in dashboard grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    /// Leftmost column.
    pub x: u32,
    /// Topmost row.
    pub y: u32,
    /// Width in grid cells.
    pub width: u32,
    /// Height in grid cells.
    pub height: u32,
}

impl GridPos {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// First column to the right of the rectangle.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// First row below the rectangle.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Size of the rectangle.
    #[must_use]
    pub const fn size(&self) -> GridSize {
        GridSize::new(self.width, self.height)
    }

    /// Area in grid cells.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.size().area()
    }

    /// Check whether two rectangles share at least one cell.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Check whether `other` lies entirely within this rectangle.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Return a copy with a different size, keeping the position.
    #[must_use]
    pub const fn with_size(&self, size: GridSize) -> Self {
        Self::new(self.x, self.y, size.width, size.height)
    }
}
