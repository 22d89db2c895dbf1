// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value types for placement: viewport snapshots, sides, alignment, and options.

use core::fmt;
use core::str::FromStr;

use kurbo::{Point, Rect, Vec2};

/// Read-only snapshot of the visible area of the host window or screen.
///
/// `width` and `height` describe the visible area in logical pixels. The scroll
/// offsets are the page coordinates of the viewport's top-left corner and are only
/// consulted by [`Strategy::Portal`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    /// Visible width in logical pixels.
    pub width: f64,
    /// Visible height in logical pixels.
    pub height: f64,
    /// Horizontal scroll offset of the page.
    pub scroll_x: f64,
    /// Vertical scroll offset of the page.
    pub scroll_y: f64,
}

impl Viewport {
    /// Create an unscrolled viewport of the given size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    /// Return a copy of this viewport with the given scroll offsets.
    #[must_use]
    pub const fn with_scroll(mut self, scroll_x: f64, scroll_y: f64) -> Self {
        self.scroll_x = scroll_x;
        self.scroll_y = scroll_y;
        self
    }

    /// The visible area in viewport coordinates, `(0, 0, width, height)`.
    ///
    /// Negative or non-finite dimensions collapse to zero.
    pub fn rect(&self) -> Rect {
        Rect::new(
            0.0,
            0.0,
            non_negative(self.width),
            non_negative(self.height),
        )
    }

    /// The scroll offset as a vector, with non-finite components treated as zero.
    pub fn scroll_offset(&self) -> Vec2 {
        Vec2::new(finite_or_zero(self.scroll_x), finite_or_zero(self.scroll_y))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// One of the four cardinal sides of an anchor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    /// Above the anchor.
    Top,
    /// Below the anchor.
    Bottom,
    /// To the left of the anchor.
    Left,
    /// To the right of the anchor.
    Right,
}

impl Side {
    /// All sides in automatic-placement preference order (vertical first).
    pub const PREFERENCE: [Self; 4] = [Self::Bottom, Self::Top, Self::Right, Self::Left];

    /// The side across the anchor from this one.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Whether content on this side is stacked vertically relative to the anchor.
    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }

    /// Lowercase name used in placement strings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Alignment of content along the cross axis of its side.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Align {
    /// Leading edges of content and anchor line up.
    Start,
    /// Midpoints of content and anchor line up.
    #[default]
    Center,
    /// Trailing edges of content and anchor line up.
    End,
}

impl Align {
    /// Lowercase name used in placement strings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Center => "center",
            Self::End => "end",
        }
    }
}

/// A concrete placement: a cardinal side plus cross-axis alignment.
///
/// This is what the engine resolves to. It never carries `auto`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    /// Side of the anchor the content sits on.
    pub side: Side,
    /// Cross-axis alignment.
    pub align: Align,
}

impl Placement {
    /// Create a placement.
    pub const fn new(side: Side, align: Align) -> Self {
        Self { side, align }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.align {
            Align::Center => f.write_str(self.side.as_str()),
            align => write!(f, "{}-{}", self.side.as_str(), align.as_str()),
        }
    }
}

/// Requested placement. `Auto` lets the engine pick the roomiest side.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlacementOption {
    /// Pick the side with the most available space.
    #[default]
    Auto,
    /// Prefer this side and alignment, flipping only on collision.
    Side(Side, Align),
}

impl PlacementOption {
    /// Centered placement on `side`.
    pub const fn side(side: Side) -> Self {
        Self::Side(side, Align::Center)
    }

    /// Parse a placement string, falling back to [`PlacementOption::Auto`] when it
    /// is not recognized.
    pub fn parse_or_auto(s: &str) -> Self {
        s.parse().unwrap_or_else(|err: ParsePlacementError| {
            tracing::debug!(input = s, %err, "invalid placement, using auto");
            Self::Auto
        })
    }
}

impl From<Placement> for PlacementOption {
    fn from(p: Placement) -> Self {
        Self::Side(p.side, p.align)
    }
}

impl fmt::Display for PlacementOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Side(side, align) => fmt::Display::fmt(&Placement::new(*side, *align), f),
        }
    }
}

/// Error returned when a placement string cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParsePlacementError {
    /// The input was empty.
    #[error("empty placement")]
    Empty,
    /// The part before the optional `-` suffix is not a side or `auto`.
    #[error("unknown placement side")]
    UnknownSide,
    /// The suffix is not `start`, `center`, or `end`, or was attached to `auto`.
    #[error("unknown placement alignment")]
    UnknownAlign,
}

impl FromStr for PlacementOption {
    type Err = ParsePlacementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParsePlacementError::Empty);
        }
        let (side, align) = match s.split_once('-') {
            Some((side, align)) => (side, Some(align)),
            None => (s, None),
        };
        let side = match side {
            "auto" => {
                return match align {
                    None => Ok(Self::Auto),
                    Some(_) => Err(ParsePlacementError::UnknownAlign),
                };
            }
            "top" => Side::Top,
            "bottom" => Side::Bottom,
            "left" => Side::Left,
            "right" => Side::Right,
            _ => return Err(ParsePlacementError::UnknownSide),
        };
        let align = match align {
            None | Some("center") => Align::Center,
            Some("start") => Align::Start,
            Some("end") => Align::End,
            Some(_) => return Err(ParsePlacementError::UnknownAlign),
        };
        Ok(Self::Side(side, align))
    }
}

/// Positioning mode for the returned coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// Viewport-relative coordinates; the overlay follows scroll by re-measuring.
    #[default]
    Fixed,
    /// Page coordinates for content moved into a separate portal root.
    Portal,
}

/// Inputs to [`calculate_position`](crate::calculate_position) besides the geometry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlacementOptions {
    /// Requested placement.
    pub placement: PlacementOption,
    /// Gap between anchor edge and content edge along the placement axis.
    pub offset: f64,
    /// Current viewport snapshot.
    pub viewport: Viewport,
    /// Coordinate space of the result.
    pub strategy: Strategy,
}

impl PlacementOptions {
    /// Options with the given placement and viewport, no offset, fixed strategy.
    pub fn new(placement: PlacementOption, viewport: Viewport) -> Self {
        Self {
            placement,
            offset: 0.0,
            viewport,
            strategy: Strategy::Fixed,
        }
    }

    /// Set the offset.
    #[must_use]
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Result of placement: the content's top-left corner and the placement used.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Positioned {
    /// Top-left corner of the content, in the space chosen by [`Strategy`].
    pub origin: Point,
    /// The placement actually used, after automatic selection and flipping.
    pub placement: Placement,
}

pub(crate) fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

pub(crate) fn non_negative(v: f64) -> f64 {
    finite_or_zero(v).max(0.0)
}
