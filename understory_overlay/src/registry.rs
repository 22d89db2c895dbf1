// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The overlay registry: the single owner of every open overlay.
//!
//! ## Overview
//!
//! [`OverlayRegistry`] keeps the open overlays in open order, which is also their
//! paint order. Each [`OverlayRegistry::open`] assigns a `z_index` one above the
//! previous one; the counter never resets, so an overlay that is closed and quickly
//! reopened still lands above everything opened before it.
//!
//! Entries are only mutated through [`open`](OverlayRegistry::open),
//! [`update`](OverlayRegistry::update), and [`close`](OverlayRegistry::close) (plus the
//! bulk helpers built on them). Each mutation that changes what is on screen
//! schedules a render; [`flush`](OverlayRegistry::flush) hands a [`PortalFrame`] with
//! all entries to every subscriber of the shared portal root.
//!
//! ## Deferred positioning
//!
//! An entry whose anchor is not [measurable](understory_placement::is_measurable)
//! has no position and is skipped by [`PortalFrame::positioned`]. Feed a real
//! anchor through [`update`](OverlayRegistry::update) and it appears.
//!
//! ## Example
//!
//! ```rust
//! use kurbo::{Rect, Size};
//! use understory_overlay::registry::{OverlayPatch, OverlayRegistry, OverlaySpec};
//! use understory_placement::{PlacementOption, Side, Viewport};
//!
//! let mut registry = OverlayRegistry::new(Viewport::new(800.0, 600.0));
//! let tooltip = registry.open(
//!     OverlaySpec::new("Save the file", Rect::from_origin_size((20.0, 20.0), (60.0, 24.0)))
//!         .with_placement(PlacementOption::side(Side::Bottom))
//!         .with_offset(6.0),
//! );
//! let menu = registry.open(OverlaySpec::new("Menu", Rect::new(300.0, 300.0, 340.0, 320.0)));
//!
//! // Later opens stack above earlier ones.
//! assert!(registry.get(menu).unwrap().z_index() > registry.get(tooltip).unwrap().z_index());
//!
//! // The real content size is known after the first paint.
//! registry.update(tooltip, OverlayPatch::content_size(Size::new(120.0, 32.0)));
//!
//! registry.subscribe(|frame| assert_eq!(frame.positioned().count(), 2));
//! assert!(registry.flush());
//!
//! registry.close(tooltip);
//! registry.close(tooltip); // Already closed: tolerated.
//! assert_eq!(registry.len(), 1);
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Point, Rect, Size};
use smallvec::SmallVec;
use understory_placement::{
    Placement, PlacementOption, PlacementOptions, Positioned, Strategy, Viewport,
    try_calculate_position,
};

use crate::trigger::TriggerKind;

/// Identifier of an open overlay.
///
/// Identifiers are never reused within one registry. They display as `overlay-N`
/// for hosts that key their views by string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayId(u64);

impl OverlayId {
    /// The raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay-{}", self.0)
    }
}

/// Handle for a render subscription, see [`OverlayRegistry::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registry configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistryConfig {
    /// `z_index` of the first overlay; each later overlay gets one more.
    pub base_z_index: u64,
    /// Position changes smaller than this (on both axes) do not trigger a render.
    pub min_delta: f64,
    /// Content size assumed until the real size is reported.
    pub estimated_content_size: Size,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_z_index: 1000,
            min_delta: 1.0,
            estimated_content_size: Size::new(240.0, 160.0),
        }
    }
}

/// Everything needed to open an overlay.
pub struct OverlaySpec<C> {
    /// Opaque content handed back to the renderer.
    pub content: C,
    /// Anchor rectangle in viewport coordinates. May be [`Rect::ZERO`] if not yet known.
    pub anchor: Rect,
    /// Content size, if already known. Defaults to
    /// [`RegistryConfig::estimated_content_size`].
    pub content_size: Option<Size>,
    /// Requested placement.
    pub placement: PlacementOption,
    /// Gap between anchor and content.
    pub offset: f64,
    /// Coordinate space of the computed position.
    pub strategy: Strategy,
    /// What opens and closes this overlay.
    pub trigger: TriggerKind,
    /// Whether a click outside the content dismisses it.
    pub close_on_click_outside: bool,
    /// Whether Escape dismisses it.
    pub close_on_escape: bool,
    /// Called once when the overlay closes, for whatever reason.
    pub on_close: Option<Box<dyn FnOnce()>>,
}

impl<C> OverlaySpec<C> {
    /// A spec with automatic placement and default dismissal behavior.
    pub fn new(content: C, anchor: Rect) -> Self {
        Self {
            content,
            anchor,
            content_size: None,
            placement: PlacementOption::Auto,
            offset: 0.0,
            strategy: Strategy::Fixed,
            trigger: TriggerKind::Click,
            close_on_click_outside: true,
            close_on_escape: true,
            on_close: None,
        }
    }

    /// Set the requested placement.
    #[must_use]
    pub fn with_placement(mut self, placement: PlacementOption) -> Self {
        self.placement = placement;
        self
    }

    /// Set the anchor offset.
    #[must_use]
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Set a known content size.
    #[must_use]
    pub fn with_content_size(mut self, size: Size) -> Self {
        self.content_size = Some(size);
        self
    }

    /// Set the positioning strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the trigger kind.
    #[must_use]
    pub fn with_trigger(mut self, trigger: TriggerKind) -> Self {
        self.trigger = trigger;
        self
    }

    /// Configure dismissal on outside click and Escape.
    #[must_use]
    pub fn with_dismissal(mut self, click_outside: bool, escape: bool) -> Self {
        self.close_on_click_outside = click_outside;
        self.close_on_escape = escape;
        self
    }

    /// Set the close callback.
    #[must_use]
    pub fn with_on_close(mut self, on_close: impl FnOnce() + 'static) -> Self {
        self.on_close = Some(Box::new(on_close));
        self
    }
}

impl<C: fmt::Debug> fmt::Debug for OverlaySpec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlaySpec")
            .field("content", &self.content)
            .field("anchor", &self.anchor)
            .field("content_size", &self.content_size)
            .field("placement", &self.placement)
            .field("offset", &self.offset)
            .field("strategy", &self.strategy)
            .field("trigger", &self.trigger)
            .field("close_on_click_outside", &self.close_on_click_outside)
            .field("close_on_escape", &self.close_on_escape)
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

/// New anchor and/or content size for [`OverlayRegistry::update`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct OverlayPatch {
    /// Fresh anchor rectangle.
    pub anchor: Option<Rect>,
    /// Measured content size.
    pub content_size: Option<Size>,
}

impl OverlayPatch {
    /// Patch only the anchor.
    pub fn anchor(anchor: Rect) -> Self {
        Self {
            anchor: Some(anchor),
            content_size: None,
        }
    }

    /// Patch only the content size.
    pub fn content_size(size: Size) -> Self {
        Self {
            anchor: None,
            content_size: Some(size),
        }
    }
}

/// An open overlay, as owned by the registry.
pub struct OverlayEntry<C> {
    id: OverlayId,
    content: C,
    anchor: Rect,
    content_size: Size,
    desired: PlacementOption,
    offset: f64,
    strategy: Strategy,
    placed: Option<Positioned>,
    z_index: u64,
    trigger: TriggerKind,
    close_on_click_outside: bool,
    close_on_escape: bool,
    on_close: Option<Box<dyn FnOnce()>>,
}

impl<C> OverlayEntry<C> {
    /// Identifier.
    pub fn id(&self) -> OverlayId {
        self.id
    }

    /// Content to render.
    pub fn content(&self) -> &C {
        &self.content
    }

    /// Last known anchor rectangle.
    pub fn anchor(&self) -> Rect {
        self.anchor
    }

    /// Content size used for placement (estimated until measured).
    pub fn content_size(&self) -> Size {
        self.content_size
    }

    /// Requested placement.
    pub fn desired_placement(&self) -> PlacementOption {
        self.desired
    }

    /// Offset from the anchor.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Placement actually used, or `None` while positioning is deferred.
    pub fn resolved_placement(&self) -> Option<Placement> {
        self.placed.map(|p| p.placement)
    }

    /// Top-left corner of the content, or `None` while positioning is deferred.
    pub fn position(&self) -> Option<Point> {
        self.placed.map(|p| p.origin)
    }

    /// Content bounds in the entry's coordinate space.
    pub fn bounds(&self) -> Option<Rect> {
        self.position()
            .map(|origin| Rect::from_origin_size(origin, self.content_size))
    }

    /// Positioning strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Stacking order; higher paints on top.
    pub fn z_index(&self) -> u64 {
        self.z_index
    }

    /// What opens and closes this overlay.
    pub fn trigger(&self) -> TriggerKind {
        self.trigger
    }

    /// Whether a click outside dismisses this overlay.
    pub fn close_on_click_outside(&self) -> bool {
        self.close_on_click_outside
    }

    /// Whether Escape dismisses this overlay.
    pub fn close_on_escape(&self) -> bool {
        self.close_on_escape
    }

    fn options(&self, viewport: Viewport) -> PlacementOptions {
        PlacementOptions {
            placement: self.desired,
            offset: self.offset,
            viewport,
            strategy: self.strategy,
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for OverlayEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayEntry")
            .field("id", &self.id)
            .field("content", &self.content)
            .field("anchor", &self.anchor)
            .field("content_size", &self.content_size)
            .field("desired", &self.desired)
            .field("placed", &self.placed)
            .field("z_index", &self.z_index)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Snapshot of the overlay stack handed to render subscribers.
#[derive(Debug)]
pub struct PortalFrame<'a, C> {
    entries: &'a [OverlayEntry<C>],
    viewport: Viewport,
}

impl<'a, C> PortalFrame<'a, C> {
    /// All open entries, bottom-most first.
    pub fn entries(&self) -> &'a [OverlayEntry<C>] {
        self.entries
    }

    /// Entries that have a position, bottom-most first.
    pub fn positioned(&self) -> impl Iterator<Item = &'a OverlayEntry<C>> + use<'a, C> {
        self.entries.iter().filter(|e| e.placed.is_some())
    }

    /// Viewport the positions were computed against.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

type Subscriber<C> = Box<dyn FnMut(&PortalFrame<'_, C>)>;

/// Owner of all open overlays.
///
/// Create one per application with [`OverlayRegistry::new`] and tear it down with
/// [`OverlayRegistry::dispose`]. Dropping the registry closes any entries that
/// are still open, so `on_close` callbacks always run.
pub struct OverlayRegistry<C> {
    config: RegistryConfig,
    viewport: Viewport,
    entries: Vec<OverlayEntry<C>>,
    next_id: u64,
    next_z: u64,
    subscribers: Vec<(SubscriptionId, Subscriber<C>)>,
    next_subscription: u64,
    render_scheduled: bool,
    render_count: u64,
}

impl<C> fmt::Debug for OverlayRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayRegistry")
            .field("config", &self.config)
            .field("viewport", &self.viewport)
            .field("open", &self.entries.len())
            .field("next_z", &self.next_z)
            .field("subscribers", &self.subscribers.len())
            .field("render_scheduled", &self.render_scheduled)
            .finish_non_exhaustive()
    }
}

impl<C> OverlayRegistry<C> {
    /// Create an empty registry with the default configuration.
    pub fn new(viewport: Viewport) -> Self {
        Self::with_config(RegistryConfig::default(), viewport)
    }

    /// Create an empty registry.
    pub fn with_config(config: RegistryConfig, viewport: Viewport) -> Self {
        Self {
            config,
            viewport,
            entries: Vec::new(),
            next_id: 1,
            next_z: config.base_z_index,
            subscribers: Vec::new(),
            next_subscription: 0,
            render_scheduled: false,
            render_count: 0,
        }
    }

    /// Close everything, deliver a final (empty) frame, and drop all subscribers.
    pub fn dispose(mut self) {
        self.close_all();
        self.flush();
        self.subscribers.clear();
    }

    /// Current configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Viewport used for placement.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Replace the viewport (for example on window resize) and re-place every entry.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        let mut changed = false;
        for entry in &mut self.entries {
            let placed = try_calculate_position(
                entry.anchor,
                entry.content_size,
                &entry.options(viewport),
            );
            if placed != entry.placed {
                entry.placed = placed;
                changed = true;
            }
        }
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            changed,
            "overlay viewport changed"
        );
        if changed {
            self.render_scheduled = true;
        }
    }

    /// Open an overlay and return its identifier.
    ///
    /// The overlay is placed once against `spec.anchor` and the known or estimated
    /// content size, then stacked above every overlay opened before it.
    pub fn open(&mut self, spec: OverlaySpec<C>) -> OverlayId {
        let id = OverlayId(self.next_id);
        self.next_id += 1;
        let z_index = self.next_z;
        self.next_z += 1;

        let mut entry = OverlayEntry {
            id,
            content: spec.content,
            anchor: spec.anchor,
            content_size: spec
                .content_size
                .unwrap_or(self.config.estimated_content_size),
            desired: spec.placement,
            offset: spec.offset,
            strategy: spec.strategy,
            placed: None,
            z_index,
            trigger: spec.trigger,
            close_on_click_outside: spec.close_on_click_outside,
            close_on_escape: spec.close_on_escape,
            on_close: spec.on_close,
        };
        entry.placed = try_calculate_position(
            entry.anchor,
            entry.content_size,
            &entry.options(self.viewport),
        );
        tracing::debug!(
            %id,
            z_index,
            deferred = entry.placed.is_none(),
            "overlay opened"
        );
        self.entries.push(entry);
        self.render_scheduled = true;
        id
    }

    /// Merge a new anchor and/or content size into an entry and re-place it.
    ///
    /// A render is scheduled only when the resolved placement changed or the
    /// position moved by at least [`RegistryConfig::min_delta`] on some axis.
    /// Returns whether a render was scheduled. Unknown ids are ignored.
    pub fn update(&mut self, id: OverlayId, patch: OverlayPatch) -> bool {
        let viewport = self.viewport;
        let min_delta = self.config.min_delta;
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            tracing::trace!(%id, "update for unknown overlay ignored");
            return false;
        };
        if let Some(anchor) = patch.anchor {
            entry.anchor = anchor;
        }
        if let Some(size) = patch.content_size {
            entry.content_size = size;
        }
        let placed = try_calculate_position(
            entry.anchor,
            entry.content_size,
            &entry.options(viewport),
        );
        if !significant_change(entry.placed, placed, min_delta) {
            return false;
        }
        entry.placed = placed;
        tracing::debug!(%id, position = ?entry.position(), "overlay moved");
        self.render_scheduled = true;
        true
    }

    /// Close an overlay, running its `on_close` callback.
    ///
    /// Returns `false` if the id is unknown (for example already closed).
    pub fn close(&mut self, id: OverlayId) -> bool {
        let Some(index) = self.entries.iter().position(|e| e.id == id) else {
            tracing::trace!(%id, "close for unknown overlay ignored");
            return false;
        };
        let entry = self.entries.remove(index);
        self.finish(entry);
        true
    }

    /// Close every overlay, top-most first. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let count = self.entries.len();
        while let Some(entry) = self.entries.pop() {
            self.finish(entry);
        }
        count
    }

    /// Close the top-most overlay that is dismissible with Escape.
    pub fn dismiss_escape(&mut self) -> Option<OverlayId> {
        let id = self
            .entries
            .iter()
            .rev()
            .find(|e| e.close_on_escape)
            .map(|e| e.id)?;
        self.close(id);
        Some(id)
    }

    /// Handle a click at `point` (viewport coordinates) outside some overlays.
    ///
    /// An overlay counts as hit when `point` lies in its content or in its anchor,
    /// so a click on a menu's own button leaves the toggling to its trigger.
    /// Every overlay stacked above the top-most hit overlay that is dismissible by
    /// outside clicks is closed, top-most first. If `point` hits no overlay, every
    /// such overlay is closed. Returns the closed ids.
    pub fn dismiss_outside_click(&mut self, point: Point) -> SmallVec<[OverlayId; 4]> {
        let floor = self.hit_index(point, true).map_or(0, |index| index + 1);
        let doomed: SmallVec<[OverlayId; 4]> = self.entries[floor..]
            .iter()
            .rev()
            .filter(|e| e.close_on_click_outside)
            .map(|e| e.id)
            .collect();
        for id in &doomed {
            self.close(*id);
        }
        doomed
    }

    /// The top-most positioned overlay whose content contains `point`
    /// (viewport coordinates).
    pub fn hit_test(&self, point: Point) -> Option<OverlayId> {
        self.hit_index(point, false).map(|index| self.entries[index].id)
    }

    fn hit_index(&self, point: Point, with_anchors: bool) -> Option<usize> {
        let scroll = self.viewport.scroll_offset();
        self.entries.iter().rposition(|e| {
            // Anchors are always in viewport coordinates.
            if with_anchors && e.anchor.contains(point) {
                return true;
            }
            e.bounds().is_some_and(|bounds| {
                let bounds = match e.strategy {
                    Strategy::Fixed => bounds,
                    Strategy::Portal => bounds - scroll,
                };
                bounds.contains(point)
            })
        })
    }

    /// Look up an open overlay.
    pub fn get(&self, id: OverlayId) -> Option<&OverlayEntry<C>> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Whether `id` is open.
    pub fn contains(&self, id: OverlayId) -> bool {
        self.get(id).is_some()
    }

    /// All open overlays, bottom-most first.
    pub fn entries(&self) -> &[OverlayEntry<C>] {
        &self.entries
    }

    /// The most recently opened overlay still open.
    pub fn topmost(&self) -> Option<&OverlayEntry<C>> {
        self.entries.last()
    }

    /// Number of open overlays.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no overlay is open.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a render callback for the portal root.
    ///
    /// Callbacks run in subscription order on every [`flush`](Self::flush).
    pub fn subscribe(
        &mut self,
        render: impl FnMut(&PortalFrame<'_, C>) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(render)));
        id
    }

    /// Remove a render callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Whether a render is pending.
    pub fn is_render_scheduled(&self) -> bool {
        self.render_scheduled
    }

    /// Number of frames delivered by [`flush`](Self::flush) so far.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Deliver a frame to every subscriber if a render is pending.
    ///
    /// Hosts call this once per animation frame. Returns whether a frame was
    /// delivered.
    pub fn flush(&mut self) -> bool {
        if !self.render_scheduled {
            return false;
        }
        self.render_scheduled = false;
        self.render_count += 1;
        let frame = PortalFrame {
            entries: &self.entries,
            viewport: self.viewport,
        };
        for (_, render) in &mut self.subscribers {
            render(&frame);
        }
        true
    }

    fn finish(&mut self, mut entry: OverlayEntry<C>) {
        tracing::debug!(id = %entry.id, "overlay closed");
        self.render_scheduled = true;
        if let Some(on_close) = entry.on_close.take() {
            on_close();
        }
    }
}

impl<C> Drop for OverlayRegistry<C> {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(open = self.entries.len(), "registry dropped with open overlays");
            self.close_all();
        }
    }
}

fn significant_change(old: Option<Positioned>, new: Option<Positioned>, min_delta: f64) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(old), Some(new)) => {
            old.placement != new.placement
                || (old.origin.x - new.origin.x).abs() >= min_delta
                || (old.origin.y - new.origin.y).abs() >= min_delta
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::{Cell, RefCell};
    use understory_placement::Side;

    fn registry() -> OverlayRegistry<&'static str> {
        OverlayRegistry::new(Viewport::new(800.0, 800.0))
    }

    fn anchor() -> Rect {
        Rect::from_origin_size((300.0, 100.0), (100.0, 20.0))
    }

    #[test]
    fn open_places_against_estimated_size() {
        let mut reg = registry();
        let id = reg.open(
            OverlaySpec::new("tip", anchor())
                .with_placement(PlacementOption::side(Side::Bottom))
                .with_offset(8.0),
        );
        let entry = reg.get(id).unwrap();
        assert_eq!(entry.content_size(), Size::new(240.0, 160.0));
        assert_eq!(entry.position(), Some(Point::new(230.0, 128.0)));
        assert_eq!(entry.resolved_placement().unwrap().side, Side::Bottom);
        assert!(reg.is_render_scheduled());
    }

    #[test]
    fn ids_are_unique_and_z_is_monotonic() {
        let mut reg = registry();
        let mut last_z = None;
        let mut ids = Vec::new();
        for _ in 0..10 {
            let id = reg.open(OverlaySpec::new("x", anchor()));
            let z = reg.get(id).unwrap().z_index();
            if let Some(prev) = last_z {
                assert!(z > prev, "z must increase: {z} after {prev}");
            }
            last_z = Some(z);
            assert!(!ids.contains(&id));
            ids.push(id);
        }
        assert_eq!(reg.topmost().unwrap().id(), *ids.last().unwrap());
    }

    #[test]
    fn z_does_not_reset_after_close() {
        let mut reg = registry();
        let a = reg.open(OverlaySpec::new("a", anchor()));
        let za = reg.get(a).unwrap().z_index();
        reg.close_all();
        let b = reg.open(OverlaySpec::new("b", anchor()));
        assert!(reg.get(b).unwrap().z_index() > za);
        assert_ne!(a, b);
    }

    #[test]
    fn ids_display_as_strings() {
        let mut reg = registry();
        let id = reg.open(OverlaySpec::new("a", anchor()));
        assert_eq!(alloc::format!("{id}"), "overlay-1");
    }

    #[test]
    fn update_with_same_anchor_renders_once() {
        let mut reg = registry();
        let id = reg.open(OverlaySpec::new("a", anchor()));
        reg.flush();
        let moved = Rect::from_origin_size((320.0, 140.0), (100.0, 20.0));
        assert!(reg.update(id, OverlayPatch::anchor(moved)));
        reg.flush();
        assert!(!reg.update(id, OverlayPatch::anchor(moved)));
        assert!(!reg.flush());
        assert_eq!(reg.render_count(), 2);
    }

    #[test]
    fn sub_pixel_jitter_is_ignored() {
        let mut reg = registry();
        let id = reg.open(
            OverlaySpec::new("a", anchor()).with_placement(PlacementOption::side(Side::Bottom)),
        );
        reg.flush();
        let before = reg.get(id).unwrap().position();
        let jitter = anchor() + kurbo::Vec2::new(0.4, 0.3);
        assert!(!reg.update(id, OverlayPatch::anchor(jitter)));
        assert_eq!(reg.get(id).unwrap().position(), before);
        assert_eq!(reg.get(id).unwrap().anchor(), jitter);

        // Accumulated drift eventually crosses the threshold.
        let drift = anchor() + kurbo::Vec2::new(1.2, 0.0);
        assert!(reg.update(id, OverlayPatch::anchor(drift)));
    }

    #[test]
    fn content_size_correction_moves_the_overlay() {
        let mut reg = registry();
        let id = reg.open(
            OverlaySpec::new("a", anchor()).with_placement(PlacementOption::side(Side::Top)),
        );
        // The estimate does not fit above the anchor; the entry flips below.
        assert_eq!(reg.get(id).unwrap().resolved_placement().unwrap().side, Side::Bottom);
        assert!(reg.update(id, OverlayPatch::content_size(Size::new(80.0, 40.0))));
        let entry = reg.get(id).unwrap();
        assert_eq!(entry.resolved_placement().unwrap().side, Side::Top);
        assert_eq!(entry.position(), Some(Point::new(310.0, 60.0)));
    }

    #[test]
    fn unknown_ids_are_tolerated() {
        let mut reg = registry();
        let id = reg.open(OverlaySpec::new("a", anchor()));
        assert!(reg.close(id));
        assert!(!reg.close(id));
        assert!(!reg.update(id, OverlayPatch::anchor(anchor())));
    }

    #[test]
    fn close_runs_callback_exactly_once() {
        let closed = Rc::new(Cell::new(0));
        let mut reg = registry();
        let c = closed.clone();
        let id = reg.open(OverlaySpec::new("a", anchor()).with_on_close(move || c.set(c.get() + 1)));
        reg.close(id);
        reg.close(id);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn close_all_closes_top_down() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut reg = registry();
        for name in ["a", "b", "c"] {
            let order = order.clone();
            reg.open(
                OverlaySpec::new(name, anchor()).with_on_close(move || order.borrow_mut().push(name)),
            );
        }
        assert_eq!(reg.close_all(), 3);
        assert!(reg.is_empty());
        assert_eq!(*order.borrow(), ["c", "b", "a"]);
    }

    #[test]
    fn deferred_positioning_for_unmeasured_anchor() {
        let mut reg = registry();
        let id = reg.open(OverlaySpec::new("a", Rect::ZERO));
        assert_eq!(reg.get(id).unwrap().position(), None);
        assert_eq!(reg.get(id).unwrap().resolved_placement(), None);

        let seen = Rc::new(Cell::new(usize::MAX));
        let s = seen.clone();
        reg.subscribe(move |frame| s.set(frame.positioned().count()));
        reg.flush();
        assert_eq!(seen.get(), 0);

        assert!(reg.update(id, OverlayPatch::anchor(anchor())));
        reg.flush();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn frames_are_in_z_order() {
        let mut reg = registry();
        let a = reg.open(OverlaySpec::new("a", anchor()));
        let b = reg.open(OverlaySpec::new("b", anchor()));
        let c = reg.open(OverlaySpec::new("c", anchor()));
        reg.close(b);
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = order.clone();
        let sub = reg.subscribe(move |frame| {
            *o.borrow_mut() = frame.entries().iter().map(|e| e.id()).collect();
        });
        assert!(reg.flush());
        assert_eq!(*order.borrow(), [a, c]);

        assert!(reg.unsubscribe(sub));
        assert!(!reg.unsubscribe(sub));
    }

    #[test]
    fn viewport_change_replaces_entries() {
        let mut reg = registry();
        let near_bottom = Rect::from_origin_size((10.0, 500.0), (100.0, 30.0));
        let id = reg.open(
            OverlaySpec::new("a", near_bottom)
                .with_placement(PlacementOption::side(Side::Bottom))
                .with_content_size(Size::new(100.0, 100.0)),
        );
        reg.flush();
        assert_eq!(reg.get(id).unwrap().resolved_placement().unwrap().side, Side::Bottom);

        reg.set_viewport(Viewport::new(800.0, 560.0));
        assert!(reg.is_render_scheduled());
        assert_eq!(reg.get(id).unwrap().resolved_placement().unwrap().side, Side::Top);

        reg.flush();
        reg.set_viewport(Viewport::new(800.0, 560.0));
        assert!(!reg.is_render_scheduled());
    }

    #[test]
    fn escape_closes_topmost_dismissible() {
        let mut reg = registry();
        let a = reg.open(OverlaySpec::new("a", anchor()));
        let b = reg.open(OverlaySpec::new("b", anchor()).with_dismissal(true, false));
        assert_eq!(reg.dismiss_escape(), Some(a));
        assert!(reg.contains(b));
        assert_eq!(reg.dismiss_escape(), None);
    }

    #[test]
    fn outside_click_closes_overlays_above_the_hit() {
        let mut reg = registry();
        let content = Size::new(100.0, 50.0);
        let menu = reg.open(
            OverlaySpec::new("menu", Rect::from_origin_size((100.0, 100.0), (50.0, 20.0)))
                .with_placement(PlacementOption::Side(Side::Bottom, understory_placement::Align::Start))
                .with_content_size(content),
        );
        let submenu = reg.open(
            OverlaySpec::new("submenu", Rect::from_origin_size((500.0, 500.0), (50.0, 20.0)))
                .with_content_size(content),
        );
        // Click inside the menu closes only the submenu above it.
        assert_eq!(reg.hit_test(Point::new(110.0, 130.0)), Some(menu));
        let closed = reg.dismiss_outside_click(Point::new(110.0, 130.0));
        assert_eq!(closed.as_slice(), [submenu]);
        assert!(reg.contains(menu));

        // Click on nothing closes everything dismissible.
        let closed = reg.dismiss_outside_click(Point::new(790.0, 10.0));
        assert_eq!(closed.as_slice(), [menu]);
        assert!(reg.is_empty());
    }

    #[test]
    fn clicking_an_anchor_keeps_its_overlay() {
        let mut reg = registry();
        let button = Rect::new(10.0, 10.0, 60.0, 30.0);
        let menu = reg.open(OverlaySpec::new("menu", button));
        let tooltip = reg.open(OverlaySpec::new("tooltip", Rect::new(600.0, 600.0, 640.0, 620.0)));

        // The anchor is not overlay content...
        assert_eq!(reg.hit_test(Point::new(20.0, 20.0)), None);
        // ...but a click on it only dismisses what is stacked above the menu.
        let closed = reg.dismiss_outside_click(Point::new(20.0, 20.0));
        assert_eq!(closed.as_slice(), [tooltip]);
        assert!(reg.contains(menu));
    }

    #[test]
    fn subscribers_run_in_subscription_order() {
        let mut reg = registry();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut subs = Vec::new();
        for n in 0..4 {
            let l = log.clone();
            subs.push(reg.subscribe(move |_| l.borrow_mut().push(n)));
        }
        reg.open(OverlaySpec::new("a", anchor()));
        assert!(reg.flush());
        assert_eq!(*log.borrow(), [0, 1, 2, 3]);

        assert!(reg.unsubscribe(subs[1]));
        log.borrow_mut().clear();
        reg.open(OverlaySpec::new("b", anchor()));
        assert!(reg.flush());
        assert_eq!(*log.borrow(), [0, 2, 3]);
    }

    #[test]
    fn portal_hit_test_accounts_for_scroll() {
        let mut reg = OverlayRegistry::new(Viewport::new(800.0, 800.0).with_scroll(0.0, 400.0));
        let id = reg.open(
            OverlaySpec::new("a", Rect::from_origin_size((100.0, 100.0), (50.0, 20.0)))
                .with_placement(PlacementOption::Side(Side::Bottom, understory_placement::Align::Start))
                .with_content_size(Size::new(100.0, 50.0))
                .with_strategy(Strategy::Portal),
        );
        assert_eq!(reg.get(id).unwrap().position(), Some(Point::new(100.0, 520.0)));
        assert_eq!(reg.hit_test(Point::new(110.0, 130.0)), Some(id));
    }

    #[test]
    fn dispose_and_drop_close_everything() {
        let closed = Rc::new(Cell::new(0));
        let frames = Rc::new(Cell::new(0));
        let mut reg = registry();
        for _ in 0..3 {
            let c = closed.clone();
            reg.open(OverlaySpec::new("a", anchor()).with_on_close(move || c.set(c.get() + 1)));
        }
        let f = frames.clone();
        reg.subscribe(move |frame| {
            assert!(frame.entries().is_empty());
            f.set(f.get() + 1);
        });
        reg.dispose();
        assert_eq!(closed.get(), 3);
        assert_eq!(frames.get(), 1);

        let c = closed.clone();
        let mut reg = registry();
        reg.open(OverlaySpec::new("a", anchor()).with_on_close(move || c.set(c.get() + 1)));
        drop(reg);
        assert_eq!(closed.get(), 4);
    }
}
