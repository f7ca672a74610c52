//! Viewport-relative geometry and placement of floating UI.
//! All coordinates are client (viewport) pixels, never document offsets.

use serde::{Deserialize, Serialize};

/// Gap between an anchor rectangle and the tooltip.
pub const TOOLTIP_GAP: f64 = 10.0;
/// Gap between a point anchor and the tooltip.
pub const TOOLTIP_POINT_GAP: f64 = 12.0;
/// Minimum distance between the tooltip and any viewport edge.
pub const TOOLTIP_MARGIN: f64 = 8.0;
/// Gap between the captured tooltip rectangle and the popup.
pub const POPUP_GAP: f64 = 8.0;
/// Minimum distance between the popup and any viewport edge.
pub const POPUP_MARGIN: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn rounded(self) -> Self {
        Self {
            x: self.x.round(),
            y: self.y.round(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn from_origin(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    /// A rectangle with no width cannot anchor anything.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0
    }
}

/// Where a tooltip should be anchored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Bounding box of the selection (preferred).
    Anchor(Rect),
    /// A bare client point, e.g. the viewport center.
    Point(Point),
}

/// `min(max(v, lo), hi)`: when the viewport is too small `hi` wins, keeping
/// the node's leading edge visible rather than its trailing edge.
fn clamp_to(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

fn clamp_left(left: f64, width: f64, viewport: Size, margin: f64) -> f64 {
    clamp_to(left, margin, viewport.width - width - margin)
}

/// Tooltip above the anchor when it fits, otherwise below; centered
/// horizontally and clamped inside the viewport.
pub fn place_tooltip(anchor: Rect, tooltip: Size, viewport: Size) -> Point {
    let mut top = anchor.top - tooltip.height - TOOLTIP_GAP;
    if top < TOOLTIP_MARGIN {
        top = anchor.bottom() + TOOLTIP_GAP;
    }
    let max_top = viewport.height - tooltip.height - TOOLTIP_MARGIN;
    let top = clamp_to(top, TOOLTIP_MARGIN, max_top);

    let left = anchor.center_x() - tooltip.width / 2.0;
    let left = clamp_left(left, tooltip.width, viewport, TOOLTIP_MARGIN);

    Point::new(left, top).rounded()
}

/// Tooltip anchored at a point: above it by a fixed gap, or below when the
/// top margin would be crossed.
pub fn place_tooltip_at_point(at: Point, tooltip: Size, viewport: Size) -> Point {
    let left = clamp_left(at.x - tooltip.width / 2.0, tooltip.width, viewport, TOOLTIP_MARGIN);
    let mut top = at.y - tooltip.height - TOOLTIP_POINT_GAP;
    if top < TOOLTIP_MARGIN {
        top = at.y + TOOLTIP_POINT_GAP;
    }
    Point::new(left, top).rounded()
}

pub fn place(placement: Placement, tooltip: Size, viewport: Size) -> Point {
    match placement {
        Placement::Anchor(rect) => place_tooltip(rect, tooltip, viewport),
        Placement::Point(p) => place_tooltip_at_point(p, tooltip, viewport),
    }
}

/// Keep an already placed node inside the viewport after its size changed.
pub fn reclamp(current: Point, size: Size, viewport: Size) -> Point {
    let left = clamp_left(current.x, size.width, viewport, TOOLTIP_MARGIN);
    let top = current.y.max(TOOLTIP_MARGIN);
    Point::new(left, top).rounded()
}

/// Popup below the anchor, else above, else vertically centered. Without a
/// usable anchor the popup is centered in the viewport.
pub fn place_popup(anchor: Option<Rect>, popup: Size, viewport: Size) -> Point {
    let anchor = match anchor {
        Some(rect) if !rect.is_degenerate() => rect,
        _ => {
            return Point::new(
                (viewport.width - popup.width) / 2.0,
                (viewport.height - popup.height) / 2.0,
            )
            .rounded()
        }
    };

    let mut top = anchor.bottom() + POPUP_GAP;
    if top + popup.height > viewport.height - POPUP_MARGIN {
        top = anchor.top - popup.height - POPUP_GAP;
    }
    if top < POPUP_MARGIN {
        top = POPUP_MARGIN.max((viewport.height - popup.height) / 2.0);
    }

    let left = anchor.center_x() - popup.width / 2.0;
    let left = clamp_left(left, popup.width, viewport, POPUP_MARGIN);

    Point::new(left, top).rounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Size = Size {
        width: 1280.0,
        height: 800.0,
    };

    #[test]
    fn tooltip_prefers_above_anchor() {
        let anchor = Rect::new(500.0, 300.0, 100.0, 20.0);
        let p = place_tooltip(anchor, Size::new(120.0, 50.0), VIEWPORT);
        assert_eq!(p, Point::new(490.0, 240.0));
    }

    #[test]
    fn tooltip_falls_below_near_top_edge() {
        let anchor = Rect::new(500.0, 30.0, 100.0, 20.0);
        let p = place_tooltip(anchor, Size::new(120.0, 50.0), VIEWPORT);
        assert_eq!(p.y, 60.0);
    }

    #[test]
    fn tooltip_clamped_horizontally_with_margin() {
        let left_edge = place_tooltip(Rect::new(0.0, 300.0, 10.0, 20.0), Size::new(200.0, 50.0), VIEWPORT);
        assert_eq!(left_edge.x, TOOLTIP_MARGIN);

        let right_edge = place_tooltip(Rect::new(1270.0, 300.0, 10.0, 20.0), Size::new(200.0, 50.0), VIEWPORT);
        assert_eq!(right_edge.x, 1280.0 - 200.0 - TOOLTIP_MARGIN);
    }

    #[test]
    fn tooltip_clamped_to_bottom_margin() {
        let anchor = Rect::new(500.0, 5.0, 100.0, 790.0);
        let p = place_tooltip(anchor, Size::new(120.0, 50.0), VIEWPORT);
        assert_eq!(p.y, 800.0 - 50.0 - TOOLTIP_MARGIN);
    }

    #[test]
    fn point_placement_flips_below() {
        let p = place_tooltip_at_point(Point::new(640.0, 20.0), Size::new(100.0, 40.0), VIEWPORT);
        assert_eq!(p, Point::new(590.0, 32.0));
    }

    #[test]
    fn popup_prefers_below_then_above_then_center() {
        let popup = Size::new(380.0, 420.0);

        let below = place_popup(Some(Rect::new(400.0, 100.0, 120.0, 40.0)), popup, VIEWPORT);
        assert_eq!(below.y, 148.0);

        let above = place_popup(Some(Rect::new(400.0, 600.0, 120.0, 40.0)), popup, VIEWPORT);
        assert_eq!(above.y, 600.0 - 420.0 - POPUP_GAP);

        let centered = place_popup(Some(Rect::new(400.0, 330.0, 120.0, 40.0)), popup, VIEWPORT);
        assert_eq!(centered.y, 190.0);
    }

    #[test]
    fn popup_without_anchor_is_centered() {
        let p = place_popup(None, Size::new(380.0, 140.0), VIEWPORT);
        assert_eq!(p, Point::new(450.0, 330.0));
        let degenerate = place_popup(Some(Rect::new(10.0, 10.0, 0.0, 10.0)), Size::new(380.0, 140.0), VIEWPORT);
        assert_eq!(degenerate, p);
    }
}
