//! Rectangle types for overlay placement.
//!
//! Callers describe source and destination areas as origin + size ([`Rect`]);
//! the driver consumes left/top/right/bottom edges ([`ScreenRect`]).

use serde::{Deserialize, Serialize};

/// Origin + size rectangle, as passed by the overlay front-end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Edge form of the rectangle, or `None` when an edge overflows `i32`.
    pub fn to_screen(self) -> Option<ScreenRect> {
        ScreenRect::checked_from_xywh(self.x, self.y, self.w, self.h)
    }
}

/// A rectangle with integer edges.
///
/// Uses left/top/right/bottom format where right and bottom are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Edges clamp at `i32::MAX`.
    pub fn from_xywh(x: i32, y: i32, width: u32, height: u32) -> Self {
        let width = i32::try_from(width).unwrap_or(i32::MAX);
        let height = i32::try_from(height).unwrap_or(i32::MAX);
        Self {
            left: x,
            top: y,
            right: x.saturating_add(width),
            bottom: y.saturating_add(height),
        }
    }

    pub fn checked_from_xywh(x: i32, y: i32, width: u32, height: u32) -> Option<Self> {
        Some(Self {
            left: x,
            top: y,
            right: x.checked_add(i32::try_from(width).ok()?)?,
            bottom: y.checked_add(i32::try_from(height).ok()?)?,
        })
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    /// Offset the rectangle by dx, dy, clamping at the `i32` range
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left.saturating_add(dx),
            top: self.top.saturating_add(dy),
            right: self.right.saturating_add(dx),
            bottom: self.bottom.saturating_add(dy),
        }
    }

    pub fn checked_offset(&self, dx: i32, dy: i32) -> Option<Self> {
        Some(Self {
            left: self.left.checked_add(dx)?,
            top: self.top.checked_add(dy)?,
            right: self.right.checked_add(dx)?,
            bottom: self.bottom.checked_add(dy)?,
        })
    }
}

impl From<Rect> for ScreenRect {
    fn from(r: Rect) -> Self {
        ScreenRect::from_xywh(r.x, r.y, r.w, r.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_xywh_sets_exclusive_edges() {
        let r = ScreenRect::from_xywh(10, 20, 100, 50);
        assert_eq!(r, ScreenRect::new(10, 20, 110, 70));
        assert_eq!(r.width(), 100);
        assert_eq!(r.height(), 50);
    }

    #[test]
    fn offset_moves_all_edges() {
        let r = ScreenRect::new(10, 10, 20, 20);
        assert_eq!(r.offset(5, -5), ScreenRect::new(15, 5, 25, 15));
    }

    #[test]
    fn inverted_rect_has_zero_size() {
        let r = ScreenRect::new(100, 100, 0, 0);
        assert_eq!(r.width(), 0);
        assert_eq!(r.height(), 0);
    }

    #[test]
    fn overflowing_edges_are_rejected() {
        assert_eq!(Rect::new(i32::MAX - 10, 0, 64, 64).to_screen(), None);
        assert_eq!(Rect::new(0, 0, u32::MAX, 1).to_screen(), None);
        assert_eq!(
            Rect::new(-5, 0, 10, 1).to_screen(),
            Some(ScreenRect::new(-5, 0, 5, 1))
        );
        assert_eq!(ScreenRect::new(0, 0, 10, 10).checked_offset(i32::MAX, 0), None);
    }

    #[test]
    fn saturating_forms_clamp() {
        let r = ScreenRect::from_xywh(i32::MAX - 10, 0, u32::MAX, 64);
        assert_eq!(r.right, i32::MAX);
        assert_eq!(r.bottom, 64);
        assert_eq!(r.offset(0, i32::MAX).bottom, i32::MAX);
    }

    #[test]
    fn converts_caller_rect() {
        let r: ScreenRect = Rect::new(-4, 8, 720, 480).into();
        assert_eq!(r, ScreenRect::new(-4, 8, 716, 488));
    }
}
