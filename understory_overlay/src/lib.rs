// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_overlay --heading-base-level=0

//! Understory Overlay: the stacking and lifecycle layer for floating UI.
//!
//! Tooltips, hover cards, menus, and popovers float above the rest of the UI,
//! next to an anchor element. This crate keeps track of which of them are open,
//! where they go, in what order they stack, and when they should open or close.
//! Placement math lives in [`understory_placement`]; rendering stays with the host.
//!
//! ## Modules
//!
//! - [`measure`]: turn anchors into on-screen rectangles, synchronously (DOM-like
//!   hosts) or through an async round trip (native view hierarchies), behind one
//!   [`MeasurementAdapter`](measure::MeasurementAdapter) trait.
//! - [`registry`]: the [`OverlayRegistry`](registry::OverlayRegistry), the single
//!   owner of all open overlays. It assigns ids and increasing `z_index` values,
//!   re-places entries when anchors, content sizes, or the viewport change, and
//!   batches render notifications into [`flush`](registry::OverlayRegistry::flush).
//! - [`trigger`]: the per-anchor [`TriggerCoordinator`](trigger::TriggerCoordinator)
//!   state machine for hover delays, click toggling, Escape, outside clicks, and
//!   debounced re-measurement on scroll or resize.
//!
//! ## Flow
//!
//! ```text
//! pointer/keyboard ─▶ TriggerCoordinator ─open/update/close─▶ OverlayRegistry ─flush─▶ renderer
//!                           ▲                                        │
//!                           └────── MeasurementAdapter (anchor, content size)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kurbo::{Point, Rect, Size};
//! use understory_overlay::registry::OverlayRegistry;
//! use understory_overlay::trigger::{NoListeners, TriggerConfig, TriggerContext, TriggerCoordinator};
//! use understory_placement::{PlacementOption, Viewport};
//!
//! let mut registry = OverlayRegistry::new(Viewport::new(1024.0, 768.0));
//! registry.subscribe(|frame| {
//!     for entry in frame.positioned() {
//!         // Draw `entry.content()` at `entry.position()`, stacked by `entry.z_index()`.
//!         assert!(entry.position().is_some());
//!     }
//! });
//!
//! let mut listeners = NoListeners;
//! let mut cx = TriggerContext::new(&mut registry, &mut listeners);
//! let mut menu = TriggerCoordinator::new(TriggerConfig::click(), "File menu")
//!     .with_placement(PlacementOption::parse_or_auto("bottom-start"))
//!     .with_offset(4.0);
//! menu.anchor_measured(Rect::new(10.0, 10.0, 60.0, 30.0), &mut cx);
//! menu.click_anchor(&mut cx);
//! menu.content_measured(Size::new(180.0, 220.0), &mut cx);
//!
//! let id = menu.overlay_id().unwrap();
//! assert_eq!(registry.get(id).unwrap().position(), Some(Point::new(10.0, 34.0)));
//! assert!(registry.flush());
//!
//! // Clicking elsewhere closes the menu.
//! registry.dismiss_outside_click(Point::new(900.0, 700.0));
//! assert!(registry.is_empty());
//! ```
//!
//! ## Features
//!
//! - `std` (default): enables `std` support for `kurbo`.
//! - `libm`: `no_std` builds relying on `libm` for floating-point math.
//! - `serde`: `Serialize`/`Deserialize` for configuration types.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod measure;
pub mod registry;
pub mod trigger;
