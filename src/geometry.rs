/*!
 * Capture-space rectangles and the distance/overlap measures used by
 * gluing and by cross-cycle block matching.
 */

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in capture-space pixels.
///
/// `x`/`y` is the top-left corner, y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// True for rectangles with no positive area (or non-finite coordinates).
    pub fn is_degenerate(&self) -> bool {
        !(self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Rectangle grown by `margin` on every side. Negative margins shrink
    /// it, never below zero size.
    pub fn expand(&self, margin: f32) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: (self.width + 2.0 * margin).max(0.0),
            height: (self.height + 2.0 * margin).max(0.0),
        }
    }

    /// Length of the shared horizontal span (0 when disjoint).
    pub fn horizontal_overlap(&self, other: &Rect) -> f32 {
        (self.right().min(other.right()) - self.x.max(other.x)).max(0.0)
    }

    /// Length of the shared vertical span (0 when disjoint).
    pub fn vertical_overlap(&self, other: &Rect) -> f32 {
        (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0)
    }

    /// Distance between the nearest vertical edges, 0 if the spans overlap.
    pub fn horizontal_gap(&self, other: &Rect) -> f32 {
        (self.x.max(other.x) - self.right().min(other.right())).max(0.0)
    }

    /// Distance between the nearest horizontal edges, 0 if the spans overlap.
    pub fn vertical_gap(&self, other: &Rect) -> f32 {
        (self.y.max(other.y) - self.bottom().min(other.bottom())).max(0.0)
    }

    pub fn intersection_area(&self, other: &Rect) -> f32 {
        self.horizontal_overlap(other) * self.vertical_overlap(other)
    }

    /// Intersection divided by the smaller of the two areas.
    ///
    /// A short line that moved inside a bigger box still scores 1.0, which is
    /// what cross-cycle matching wants when a dialog box grows a line.
    pub fn overlap_ratio(&self, other: &Rect) -> f32 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / smaller
    }
}
