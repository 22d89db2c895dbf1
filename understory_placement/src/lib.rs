// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_placement --heading-base-level=0

//! Understory Placement: collision-aware positioning of floating content.
//!
//! Tooltips, hover cards, dropdowns, and command palettes all need the same
//! thing: given where an anchor sits on screen and how big the floating content
//! is, find a top-left corner for the content that keeps it next to the anchor
//! and inside the viewport. This crate provides that as one pure function,
//! [`calculate_position`].
//!
//! ## Algorithm
//!
//! - The content is placed on the requested [`Side`] of the anchor, `offset`
//!   pixels away, and aligned on the cross axis according to [`Align`].
//! - [`PlacementOption::Auto`] picks the side with the most [`AvailableSpace`],
//!   preferring bottom, then top, then right, then left on ties.
//! - If the content would spill past the viewport edge on its own side and the
//!   opposite side is strictly roomier, it flips.
//! - Finally the content is clamped into the viewport. Content larger than the
//!   viewport on an axis is pinned to the viewport origin on that axis.
//!
//! The returned [`Positioned`] carries the [`Placement`] actually used, so callers
//! can draw a matching arrow or pick a direction-aware animation.
//!
//! ## Minimal example
//!
//! ```rust
//! use kurbo::{Rect, Size};
//! use understory_placement::{
//!     PlacementOption, PlacementOptions, Side, Viewport, calculate_position,
//! };
//!
//! let viewport = Viewport::new(1024.0, 768.0);
//! let anchor = Rect::from_origin_size((100.0, 40.0), (80.0, 24.0));
//! let options = PlacementOptions::new(PlacementOption::parse_or_auto("bottom-start"), viewport)
//!     .with_offset(4.0);
//!
//! let placed = calculate_position(anchor, Size::new(240.0, 160.0), &options);
//! assert_eq!(placed.placement.side, Side::Bottom);
//! assert_eq!(placed.origin.x, 100.0);
//! assert_eq!(placed.origin.y, 68.0);
//! ```
//!
//! ## Unmeasured anchors
//!
//! Hosts typically learn an anchor's rectangle from layout, and an element that
//! is not mounted yet measures as [`kurbo::Rect::ZERO`]. Use [`is_measurable`] or
//! [`try_calculate_position`] to skip placement until a real rectangle arrives.
//!
//! ## Coordinate spaces
//!
//! Anchors and viewports are in viewport coordinates. With [`Strategy::Fixed`] the
//! result is too; with [`Strategy::Portal`] it is translated by the viewport's
//! scroll offset into page coordinates.
//!
//! ## Features
//!
//! - `std` (default): enables `std` support for `kurbo`.
//! - `libm`: `no_std` builds relying on `libm` for floating-point math.
//! - `serde`: `Serialize`/`Deserialize` for the value types.
//!
//! This crate is `no_std`.

#![no_std]

#[cfg(test)]
extern crate alloc;

mod engine;
mod types;

pub use engine::{
    AvailableSpace, Overflow, calculate_position, is_measurable, overflow, try_calculate_position,
};
pub use types::{
    Align, ParsePlacementError, Placement, PlacementOption, PlacementOptions, Positioned, Side,
    Strategy, Viewport,
};
