// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The placement algorithm: candidate, overflow, auto selection, flip, clamp.

use kurbo::{Point, Rect, Size};

use crate::types::{
    Align, Placement, PlacementOption, PlacementOptions, Positioned, Side, Strategy,
    finite_or_zero, non_negative,
};

/// Distance from each edge of an anchor to the matching viewport edge.
///
/// Values are negative when the anchor itself extends past that viewport edge.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AvailableSpace {
    /// Space above the anchor.
    pub top: f64,
    /// Space below the anchor.
    pub bottom: f64,
    /// Space left of the anchor.
    pub left: f64,
    /// Space right of the anchor.
    pub right: f64,
}

impl AvailableSpace {
    /// Measure the space around `anchor` inside `viewport`.
    pub fn around(anchor: Rect, viewport: Rect) -> Self {
        Self {
            top: anchor.y0 - viewport.y0,
            bottom: viewport.y1 - anchor.y1,
            left: anchor.x0 - viewport.x0,
            right: viewport.x1 - anchor.x1,
        }
    }

    /// Space on `side`.
    pub fn on(&self, side: Side) -> f64 {
        match side {
            Side::Top => self.top,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// The side with the most space. Ties go to the earlier entry of
    /// [`Side::PREFERENCE`]: bottom, top, right, left.
    pub fn roomiest(&self) -> Side {
        let mut best = Side::PREFERENCE[0];
        for side in &Side::PREFERENCE[1..] {
            if self.on(*side) > self.on(best) {
                best = *side;
            }
        }
        best
    }
}

/// How far a rectangle extends past each viewport edge.
///
/// Positive values are overflow; zero or negative values mean the rectangle is
/// inside on that side.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Overflow {
    /// Overflow past the top edge.
    pub top: f64,
    /// Overflow past the bottom edge.
    pub bottom: f64,
    /// Overflow past the left edge.
    pub left: f64,
    /// Overflow past the right edge.
    pub right: f64,
}

impl Overflow {
    /// Whether nothing overflows.
    pub fn is_contained(&self) -> bool {
        self.top <= 0.0 && self.bottom <= 0.0 && self.left <= 0.0 && self.right <= 0.0
    }

    /// Overflow on `side`.
    pub fn on(&self, side: Side) -> f64 {
        match side {
            Side::Top => self.top,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Compute how far `rect` overflows `viewport` on each side.
pub fn overflow(rect: Rect, viewport: Rect) -> Overflow {
    Overflow {
        top: viewport.y0 - rect.y0,
        bottom: rect.y1 - viewport.y1,
        left: viewport.x0 - rect.x0,
        right: rect.x1 - viewport.x1,
    }
}

/// Whether `rect` is a usable anchor.
///
/// Unmounted or not-yet-laid-out elements measure as a zero-size rectangle;
/// callers should defer positioning until this returns `true`.
pub fn is_measurable(rect: Rect) -> bool {
    rect.is_finite() && (rect.width() != 0.0 || rect.height() != 0.0)
}

/// Place `content` next to `anchor` according to `options`.
///
/// This is a pure function: identical inputs always produce identical outputs.
///
/// 1. Build a candidate on the requested side, `offset` away from the anchor and
///    aligned on the cross axis.
/// 2. For [`PlacementOption::Auto`], the requested side is the one with the most
///    [`AvailableSpace`].
/// 3. If the candidate overflows the viewport edge on its own side and the
///    opposite side has strictly more space, flip.
/// 4. Clamp into the viewport. Content larger than the viewport on an axis is
///    pinned to the viewport origin on that axis.
///
/// ```
/// use kurbo::{Point, Rect, Size};
/// use understory_placement::{
///     PlacementOption, PlacementOptions, Side, Viewport, calculate_position,
/// };
///
/// let anchor = Rect::from_origin_size((10.0, 780.0), (100.0, 30.0));
/// let options = PlacementOptions::new(PlacementOption::side(Side::Bottom), Viewport::new(800.0, 800.0))
///     .with_offset(8.0);
/// let placed = calculate_position(anchor, Size::new(200.0, 150.0), &options);
///
/// // No room below, so the content flips above and is pushed back inside on x.
/// assert_eq!(placed.placement.side, Side::Top);
/// assert_eq!(placed.origin, Point::new(0.0, 622.0));
/// ```
pub fn calculate_position(anchor: Rect, content: Size, options: &PlacementOptions) -> Positioned {
    let anchor = sanitize_rect(anchor);
    let content = Size::new(non_negative(content.width), non_negative(content.height));
    let offset = finite_or_zero(options.offset);
    let viewport = options.viewport.rect();
    let space = AvailableSpace::around(anchor, viewport);

    let (requested, align) = match options.placement {
        PlacementOption::Auto => (space.roomiest(), Align::Center),
        PlacementOption::Side(side, align) => (side, align),
    };

    let mut side = requested;
    let mut origin = candidate(anchor, content, side, align, offset);
    let spill = overflow(Rect::from_origin_size(origin, content), viewport);
    if spill.on(side) > 0.0 && space.on(side.opposite()) > space.on(side) {
        side = side.opposite();
        origin = candidate(anchor, content, side, align, offset);
    }

    let fits = overflow(Rect::from_origin_size(origin, content), viewport).is_contained();
    let clamped = if fits {
        origin
    } else {
        clamp_into(origin, content, viewport)
    };
    tracing::trace!(
        requested = requested.as_str(),
        resolved = side.as_str(),
        x = clamped.x,
        y = clamped.y,
        fits,
        "placed overlay"
    );

    let origin = match options.strategy {
        Strategy::Fixed => clamped,
        Strategy::Portal => clamped + options.viewport.scroll_offset(),
    };
    Positioned {
        origin,
        placement: Placement::new(side, align),
    }
}

/// Like [`calculate_position`], but returns `None` when the anchor is not
/// [measurable](is_measurable) so callers can skip the render cycle instead of
/// placing content against the origin.
pub fn try_calculate_position(
    anchor: Rect,
    content: Size,
    options: &PlacementOptions,
) -> Option<Positioned> {
    is_measurable(anchor).then(|| calculate_position(anchor, content, options))
}

fn candidate(anchor: Rect, content: Size, side: Side, align: Align, offset: f64) -> Point {
    if side.is_vertical() {
        let x = cross(anchor.x0, anchor.x1, content.width, align);
        let y = match side {
            Side::Top => anchor.y0 - offset - content.height,
            _ => anchor.y1 + offset,
        };
        Point::new(x, y)
    } else {
        let y = cross(anchor.y0, anchor.y1, content.height, align);
        let x = match side {
            Side::Left => anchor.x0 - offset - content.width,
            _ => anchor.x1 + offset,
        };
        Point::new(x, y)
    }
}

fn cross(start: f64, end: f64, len: f64, align: Align) -> f64 {
    match align {
        Align::Start => start,
        Align::Center => (start + end) * 0.5 - len * 0.5,
        Align::End => end - len,
    }
}

fn clamp_into(origin: Point, content: Size, viewport: Rect) -> Point {
    Point::new(
        clamp_axis(origin.x, content.width, viewport.x0, viewport.x1),
        clamp_axis(origin.y, content.height, viewport.y0, viewport.y1),
    )
}

// Not `f64::clamp`: the upper bound may sit below the lower one when content is
// larger than the viewport, and then the lower bound wins.
fn clamp_axis(pos: f64, len: f64, lo: f64, hi: f64) -> f64 {
    pos.min(hi - len).max(lo)
}

fn sanitize_rect(rect: Rect) -> Rect {
    if rect.is_finite() {
        rect.abs()
    } else {
        Rect::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Viewport;

    fn opts(placement: PlacementOption, offset: f64) -> PlacementOptions {
        PlacementOptions::new(placement, Viewport::new(800.0, 800.0)).with_offset(offset)
    }

    fn content_rect(p: &Positioned, content: Size) -> Rect {
        Rect::from_origin_size(p.origin, content)
    }

    #[test]
    fn worked_example_flips_and_clamps() {
        let anchor = Rect::from_origin_size((10.0, 780.0), (100.0, 30.0));
        let p = calculate_position(
            anchor,
            Size::new(200.0, 150.0),
            &opts(PlacementOption::side(Side::Bottom), 8.0),
        );
        assert_eq!(p.placement, Placement::new(Side::Top, Align::Center));
        assert_eq!(p.origin, Point::new(0.0, 622.0));
    }

    #[test]
    fn centered_below_when_there_is_room() {
        let anchor = Rect::from_origin_size((300.0, 100.0), (100.0, 20.0));
        let p = calculate_position(
            anchor,
            Size::new(200.0, 50.0),
            &opts(PlacementOption::side(Side::Bottom), 4.0),
        );
        assert_eq!(p.placement.side, Side::Bottom);
        assert_eq!(p.origin, Point::new(250.0, 124.0));
    }

    #[test]
    fn each_side_is_adjacent_with_offset() {
        let anchor = Rect::from_origin_size((350.0, 350.0), (100.0, 100.0));
        let content = Size::new(60.0, 40.0);
        let cases = [
            (Side::Top, Point::new(370.0, 350.0 - 6.0 - 40.0)),
            (Side::Bottom, Point::new(370.0, 456.0)),
            (Side::Left, Point::new(350.0 - 6.0 - 60.0, 380.0)),
            (Side::Right, Point::new(456.0, 380.0)),
        ];
        for (side, expected) in cases {
            let p = calculate_position(anchor, content, &opts(PlacementOption::side(side), 6.0));
            assert_eq!(p.placement.side, side, "side {side:?}");
            assert_eq!(p.origin, expected, "side {side:?}");
        }
    }

    #[test]
    fn alignment_start_and_end() {
        let anchor = Rect::from_origin_size((300.0, 300.0), (100.0, 20.0));
        let content = Size::new(50.0, 50.0);
        let start = calculate_position(
            anchor,
            content,
            &opts(PlacementOption::Side(Side::Bottom, Align::Start), 0.0),
        );
        assert_eq!(start.origin.x, 300.0);
        let end = calculate_position(
            anchor,
            content,
            &opts(PlacementOption::Side(Side::Bottom, Align::End), 0.0),
        );
        assert_eq!(end.origin.x, 350.0);
        assert_eq!(end.placement.align, Align::End);

        let side = calculate_position(
            anchor,
            content,
            &opts(PlacementOption::Side(Side::Right, Align::End), 0.0),
        );
        assert_eq!(side.origin, Point::new(400.0, 270.0));
    }

    #[test]
    fn auto_picks_roomiest_side() {
        // Anchor hugging the top-left corner: most room is below.
        let p = calculate_position(
            Rect::from_origin_size((0.0, 0.0), (20.0, 20.0)),
            Size::new(10.0, 10.0),
            &opts(PlacementOption::Auto, 0.0),
        );
        assert_eq!(p.placement.side, Side::Bottom);

        // Hugging the bottom edge: most room is above.
        let p = calculate_position(
            Rect::from_origin_size((390.0, 780.0), (20.0, 20.0)),
            Size::new(10.0, 10.0),
            &opts(PlacementOption::Auto, 0.0),
        );
        assert_eq!(p.placement.side, Side::Top);

        // Tall thin anchor at the left edge: most room is to the right.
        let p = calculate_position(
            Rect::from_origin_size((0.0, 0.0), (20.0, 800.0)),
            Size::new(10.0, 10.0),
            &opts(PlacementOption::Auto, 0.0),
        );
        assert_eq!(p.placement.side, Side::Right);
    }

    #[test]
    fn auto_prefers_vertical_on_ties() {
        // Centered square anchor: equal space on all four sides.
        let anchor = Rect::from_origin_size((350.0, 350.0), (100.0, 100.0));
        let space = AvailableSpace::around(anchor, Viewport::new(800.0, 800.0).rect());
        assert_eq!(space.top, space.left);
        assert_eq!(space.roomiest(), Side::Bottom);

        // Top and bottom tie but exceed left/right: still bottom first.
        let anchor = Rect::from_origin_size((0.0, 350.0), (800.0, 100.0));
        let space = AvailableSpace::around(anchor, Viewport::new(800.0, 800.0).rect());
        assert_eq!(space.roomiest(), Side::Bottom);

        // Left and right tie and win: right before left.
        let anchor = Rect::from_origin_size((350.0, 0.0), (100.0, 800.0));
        let space = AvailableSpace::around(anchor, Viewport::new(800.0, 800.0).rect());
        assert_eq!(space.roomiest(), Side::Right);
    }

    #[test]
    fn no_flip_when_opposite_is_not_roomier() {
        // Anchor centered vertically: content too tall for either side.
        let anchor = Rect::from_origin_size((350.0, 390.0), (100.0, 20.0));
        let p = calculate_position(
            anchor,
            Size::new(100.0, 500.0),
            &opts(PlacementOption::side(Side::Bottom), 0.0),
        );
        assert_eq!(p.placement.side, Side::Bottom);
        // Primary axis clamped since neither side fits.
        assert_eq!(p.origin.y, 300.0);
    }

    #[test]
    fn flips_horizontally() {
        let anchor = Rect::from_origin_size((740.0, 300.0), (40.0, 40.0));
        let p = calculate_position(
            anchor,
            Size::new(120.0, 40.0),
            &opts(PlacementOption::side(Side::Right), 10.0),
        );
        assert_eq!(p.placement.side, Side::Left);
        assert_eq!(p.origin, Point::new(740.0 - 10.0 - 120.0, 300.0));
    }

    #[test]
    fn flip_correctness_sweep() {
        let content = Size::new(100.0, 150.0);
        for y in (500..770).step_by(7) {
            let anchor = Rect::from_origin_size((300.0, f64::from(y)), (80.0, 30.0));
            let below = 800.0 - anchor.y1;
            let above = anchor.y0;
            if below >= content.height + 8.0 || above <= below {
                continue;
            }
            let p = calculate_position(
                anchor,
                content,
                &opts(PlacementOption::side(Side::Bottom), 8.0),
            );
            assert_eq!(p.placement.side, Side::Top, "anchor y = {y}");
        }
    }

    #[test]
    fn oversized_content_pins_to_origin() {
        let anchor = Rect::from_origin_size((400.0, 400.0), (10.0, 10.0));
        let p = calculate_position(
            anchor,
            Size::new(900.0, 1000.0),
            &opts(PlacementOption::side(Side::Bottom), 8.0),
        );
        assert_eq!(p.origin, Point::ZERO);
    }

    #[test]
    fn containment_and_offset_sweep() {
        let viewport = Viewport::new(800.0, 600.0);
        let sizes = [
            Size::new(10.0, 10.0),
            Size::new(240.0, 160.0),
            Size::new(500.0, 90.0),
            Size::new(800.0, 600.0),
        ];
        let placements = [
            PlacementOption::Auto,
            PlacementOption::side(Side::Top),
            PlacementOption::side(Side::Bottom),
            PlacementOption::Side(Side::Left, Align::Start),
            PlacementOption::Side(Side::Right, Align::End),
        ];
        for x in (-100..900).step_by(53) {
            for y in (-100..700).step_by(47) {
                let anchor = Rect::from_origin_size((f64::from(x), f64::from(y)), (60.0, 24.0));
                for content in sizes {
                    for placement in placements {
                        let options = PlacementOptions::new(placement, viewport).with_offset(8.0);
                        let p = calculate_position(anchor, content, &options);
                        let rect = content_rect(&p, content);
                        assert!(
                            overflow(rect, viewport.rect()).is_contained(),
                            "{rect:?} escapes viewport for anchor {anchor:?} / {placement:?}"
                        );

                        // Determinism.
                        assert_eq!(p, calculate_position(anchor, content, &options));

                        // Offset is exact whenever no clamping happened.
                        let unclamped = candidate(
                            anchor,
                            content,
                            p.placement.side,
                            p.placement.align,
                            8.0,
                        );
                        if unclamped == p.origin {
                            let gap = match p.placement.side {
                                Side::Top => anchor.y0 - rect.y1,
                                Side::Bottom => rect.y0 - anchor.y1,
                                Side::Left => anchor.x0 - rect.x1,
                                Side::Right => rect.x0 - anchor.x1,
                            };
                            assert_eq!(gap, 8.0, "gap for {anchor:?} / {placement:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn portal_strategy_adds_scroll() {
        let anchor = Rect::from_origin_size((300.0, 100.0), (100.0, 20.0));
        let viewport = Viewport::new(800.0, 800.0).with_scroll(0.0, 1200.0);
        let fixed = calculate_position(
            anchor,
            Size::new(200.0, 50.0),
            &PlacementOptions::new(PlacementOption::side(Side::Bottom), viewport),
        );
        let portal = calculate_position(
            anchor,
            Size::new(200.0, 50.0),
            &PlacementOptions::new(PlacementOption::side(Side::Bottom), viewport)
                .with_strategy(Strategy::Portal),
        );
        assert_eq!(portal.origin, fixed.origin + kurbo::Vec2::new(0.0, 1200.0));
        assert_eq!(portal.placement, fixed.placement);
    }

    #[test]
    fn zero_anchor_is_not_measurable() {
        assert!(!is_measurable(Rect::ZERO));
        assert!(!is_measurable(Rect::new(5.0, 5.0, 5.0, 5.0)));
        assert!(!is_measurable(Rect::new(0.0, 0.0, f64::NAN, 10.0)));
        assert!(is_measurable(Rect::new(5.0, 5.0, 5.0, 25.0)));

        let options = opts(PlacementOption::Auto, 0.0);
        assert!(try_calculate_position(Rect::ZERO, Size::new(10.0, 10.0), &options).is_none());
        assert!(
            try_calculate_position(
                Rect::new(10.0, 10.0, 20.0, 20.0),
                Size::new(10.0, 10.0),
                &options
            )
            .is_some()
        );
    }

    #[test]
    fn non_finite_inputs_stay_finite() {
        let p = calculate_position(
            Rect::new(f64::NAN, 0.0, 10.0, 10.0),
            Size::new(f64::INFINITY, 20.0),
            &opts(PlacementOption::side(Side::Bottom), f64::NAN),
        );
        assert!(p.origin.is_finite());
    }

    #[test]
    fn fitting_candidate_touching_the_edge_is_not_nudged() {
        let anchor = Rect::new(0.25, 0.25, 10.25, 10.25);
        let content = Size::new(30.0, 30.0);
        let p = calculate_position(
            anchor,
            content,
            &opts(PlacementOption::Side(Side::Right, Align::Start), 2.0),
        );
        assert_eq!(p.placement, Placement::new(Side::Right, Align::Start));
        assert_eq!(p.origin, Point::new(12.25, 0.25));
        assert!(
            overflow(content_rect(&p, content), Viewport::new(800.0, 800.0).rect()).is_contained()
        );
    }
}
