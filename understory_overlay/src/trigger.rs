// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-overlay trigger state machine: when to open and when to close.
//!
//! ## States
//!
//! ```text
//! Closed ──enter──▶ OpeningScheduled ──open delay──▶ Open ──leave──▶ ClosingScheduled ──close delay──▶ Closed
//!                         │ leave                      ▲                  │ enter anchor/content
//!                         ▼                            └──────────────────┘
//!                       Closed
//! ```
//!
//! - **Hover** triggers open after [`TriggerConfig::open_delay`] once the pointer enters
//!   the anchor, and close after [`TriggerConfig::close_delay`] once the pointer has
//!   left *both* the anchor and the overlay content. Entering either one while the
//!   close is pending cancels it, so moving from the anchor onto the floating content
//!   does not flicker. Keyboard focus on the anchor opens without delay.
//! - **Click** triggers toggle on every click on the anchor, without delays.
//! - Outside clicks and Escape close either kind when enabled in [`TriggerConfig`].
//!
//! ## Time and timers
//!
//! The coordinator does not own a clock. Every event carries a timestamp in
//! milliseconds, and pending work is described by [`TriggerCoordinator::next_deadline`].
//! Hosts arm one real timer for that deadline and call
//! [`advance`](TriggerCoordinator::advance) when it fires. Alternatively, a host
//! timer can carry the [`TimerToken`] from [`TriggerCoordinator::pending_timer`] and
//! call [`fire_timer`](TriggerCoordinator::fire_timer); tokens from cancelled timers
//! are ignored. A pending open is always cancelled before a close is scheduled and
//! vice versa.
//!
//! ## Re-measurement
//!
//! While open, scroll and resize notifications
//! ([`viewport_changed`](TriggerCoordinator::viewport_changed)) are debounced and then
//! mark the anchor stale. The host measures it and reports back through
//! [`anchor_measured`](TriggerCoordinator::anchor_measured), which updates the registry.
//! A context built with [`TriggerContext::with_viewport_source`] also copies the
//! current viewport into the registry first, so scroll offsets and window sizes
//! stay current for [`Strategy::Portal`] overlays.
//! After each open the real content size is requested once
//! ([`needs_content_measure`](TriggerCoordinator::needs_content_measure)). The async
//! [`refresh`](TriggerCoordinator::refresh) helper does both with a
//! [`MeasurementAdapter`].
//!
//! ## Example
//!
//! ```rust
//! use kurbo::Rect;
//! use understory_overlay::registry::OverlayRegistry;
//! use understory_overlay::trigger::{
//!     NoListeners, TriggerConfig, TriggerContext, TriggerCoordinator, TriggerState,
//! };
//! use understory_placement::Viewport;
//!
//! let mut registry = OverlayRegistry::new(Viewport::new(800.0, 600.0));
//! let mut listeners = NoListeners;
//! let mut cx = TriggerContext::new(&mut registry, &mut listeners);
//!
//! let mut card = TriggerCoordinator::new(TriggerConfig::hover(), "Profile card");
//! card.anchor_measured(Rect::new(100.0, 100.0, 180.0, 120.0), &mut cx);
//!
//! card.pointer_enter_anchor(0, &mut cx);
//! assert!(matches!(card.state(), TriggerState::OpeningScheduled { .. }));
//! card.advance(300, &mut cx);
//! assert!(card.is_open());
//!
//! // Pointer travels from the anchor to the card: no close.
//! card.pointer_leave_anchor(1000, &mut cx);
//! card.pointer_enter_content(1050, &mut cx);
//! card.advance(5000, &mut cx);
//! assert!(card.is_open());
//! ```

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::fmt;

use kurbo::{Rect, Size};
use understory_placement::{PlacementOption, Strategy, is_measurable};

use crate::measure::{MeasurementAdapter, ViewportSource, get_viewport};
use crate::registry::{OverlayId, OverlayPatch, OverlayRegistry, OverlaySpec};

/// What opens and closes an overlay.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerKind {
    /// Pointer hover (and keyboard focus) with open/close delays.
    #[default]
    Hover,
    /// Click to toggle.
    Click,
}

/// Trigger configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriggerConfig {
    /// Hover or click.
    pub kind: TriggerKind,
    /// Milliseconds between hover start and open.
    pub open_delay: u64,
    /// Milliseconds between hover end and close.
    pub close_delay: u64,
    /// Milliseconds of quiet after a scroll/resize before re-measuring.
    pub reposition_debounce: u64,
    /// Disabled coordinators never open.
    pub disabled: bool,
    /// Whether Escape closes the overlay.
    pub close_on_escape: bool,
    /// Whether a click outside closes the overlay.
    pub close_on_click_outside: bool,
}

impl TriggerConfig {
    /// Hover card defaults: 300ms open delay, 150ms close delay.
    pub const fn hover() -> Self {
        Self {
            kind: TriggerKind::Hover,
            open_delay: 300,
            close_delay: 150,
            reposition_debounce: 16,
            disabled: false,
            close_on_escape: true,
            close_on_click_outside: true,
        }
    }

    /// Click-to-toggle defaults: no delays.
    pub const fn click() -> Self {
        Self {
            kind: TriggerKind::Click,
            open_delay: 0,
            close_delay: 0,
            reposition_debounce: 16,
            disabled: false,
            close_on_escape: true,
            close_on_click_outside: true,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::hover()
    }
}

bitflags::bitflags! {
    /// Which interaction sources currently keep a hover overlay alive.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HoverSources: u8 {
        /// Pointer is over the anchor.
        const ANCHOR  = 0b0000_0001;
        /// Pointer is over the overlay content.
        const CONTENT = 0b0000_0010;
        /// Anchor has keyboard focus.
        const FOCUS   = 0b0000_0100;
    }
}

/// Cancellation token of a scheduled open or close.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// State of a [`TriggerCoordinator`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerState {
    /// Nothing is shown and nothing is pending.
    Closed,
    /// An open is scheduled at `deadline`.
    OpeningScheduled {
        /// Token of the pending open.
        token: TimerToken,
        /// When the open fires, in host milliseconds.
        deadline: u64,
    },
    /// The overlay is open in the registry.
    Open {
        /// Registry id of the overlay.
        id: OverlayId,
    },
    /// The overlay is open and a close is scheduled at `deadline`.
    ClosingScheduled {
        /// Registry id of the overlay.
        id: OverlayId,
        /// Token of the pending close.
        token: TimerToken,
        /// When the close fires, in host milliseconds.
        deadline: u64,
    },
}

/// Handle for a scroll/resize subscription created by [`ViewportListeners::listen`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Wrap a host-chosen identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Failure to subscribe to viewport scroll/resize events.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    /// The host platform has no scroll or resize events.
    #[error("host does not provide scroll or resize events")]
    Unsupported,
    /// The host refused the subscription.
    #[error("viewport listener registration was rejected")]
    Rejected,
}

/// Host-side scroll/resize subscriptions.
///
/// While an overlay is open, its coordinator holds one subscription. The host
/// forwards the events it delivers to
/// [`TriggerCoordinator::viewport_changed`].
pub trait ViewportListeners {
    /// Start delivering scroll/resize events.
    fn listen(&mut self) -> Result<ListenerId, ListenerError>;
    /// Stop delivering events for `id`.
    fn unlisten(&mut self, id: ListenerId);
}

/// [`ViewportListeners`] for hosts without scroll/resize events.
///
/// Overlays still open and are positioned once; they just do not follow the
/// anchor when the page moves.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoListeners;

impl ViewportListeners for NoListeners {
    fn listen(&mut self) -> Result<ListenerId, ListenerError> {
        Err(ListenerError::Unsupported)
    }

    fn unlisten(&mut self, _id: ListenerId) {}
}

/// Borrowed collaborators for one coordinator call.
pub struct TriggerContext<'a, C> {
    /// The shared overlay registry.
    pub registry: &'a mut OverlayRegistry<C>,
    /// Scroll/resize subscriptions.
    pub listeners: &'a mut dyn ViewportListeners,
    /// Current window geometry, pushed into the registry before re-placing.
    pub viewport: Option<&'a dyn ViewportSource>,
}

impl<'a, C> TriggerContext<'a, C> {
    /// Bundle a registry and listener source.
    pub fn new(
        registry: &'a mut OverlayRegistry<C>,
        listeners: &'a mut dyn ViewportListeners,
    ) -> Self {
        Self {
            registry,
            listeners,
            viewport: None,
        }
    }

    /// Keep the registry's viewport in step with `source` whenever the overlay
    /// is opened or re-measured. Without one, hosts call
    /// [`OverlayRegistry::set_viewport`] themselves.
    #[must_use]
    pub fn with_viewport_source(mut self, source: &'a dyn ViewportSource) -> Self {
        self.viewport = Some(source);
        self
    }

    fn sync_viewport(&mut self) {
        if let Some(source) = self.viewport {
            self.registry.set_viewport(get_viewport(source));
        }
    }
}

impl<C> fmt::Debug for TriggerContext<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerContext")
            .field("registry", &self.registry)
            .field("tracks_viewport", &self.viewport.is_some())
            .finish_non_exhaustive()
    }
}

/// Decides when one overlay opens and closes.
///
/// One coordinator belongs to one anchor. It asks the [`OverlayRegistry`] to open,
/// update, and close its overlay, and never touches other entries.
pub struct TriggerCoordinator<C> {
    config: TriggerConfig,
    state: TriggerState,
    hovered: HoverSources,
    content: C,
    anchor: Rect,
    placement: PlacementOption,
    offset: f64,
    strategy: Strategy,
    content_size: Option<Size>,
    on_close: Option<Rc<dyn Fn()>>,
    next_token: u64,
    listener: Option<ListenerId>,
    reposition_at: Option<u64>,
    anchor_stale: bool,
    content_pending: bool,
    unmounted: bool,
}

impl<C> fmt::Debug for TriggerCoordinator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerCoordinator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("hovered", &self.hovered)
            .field("anchor", &self.anchor)
            .field("listener", &self.listener)
            .field("unmounted", &self.unmounted)
            .finish_non_exhaustive()
    }
}

impl<C: Clone> TriggerCoordinator<C> {
    /// Create a closed coordinator that opens `content` with automatic placement.
    pub fn new(config: TriggerConfig, content: C) -> Self {
        Self {
            config,
            state: TriggerState::Closed,
            hovered: HoverSources::empty(),
            content,
            anchor: Rect::ZERO,
            placement: PlacementOption::Auto,
            offset: 0.0,
            strategy: Strategy::Fixed,
            content_size: None,
            on_close: None,
            next_token: 0,
            listener: None,
            reposition_at: None,
            anchor_stale: false,
            content_pending: false,
            unmounted: false,
        }
    }

    /// Set the requested placement for future opens.
    #[must_use]
    pub fn with_placement(mut self, placement: PlacementOption) -> Self {
        self.placement = placement;
        self
    }

    /// Set the anchor offset for future opens.
    #[must_use]
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the positioning strategy for future opens.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Use a known content size instead of the registry's estimate. No content
    /// measurement is requested after open.
    #[must_use]
    pub fn with_content_size(mut self, size: Size) -> Self {
        self.content_size = Some(size);
        self
    }

    /// Callback run every time the overlay closes.
    #[must_use]
    pub fn with_on_close(mut self, on_close: impl Fn() + 'static) -> Self {
        self.on_close = Some(Rc::new(on_close));
        self
    }

    /// Current state.
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Configuration.
    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Sources currently hovering or focusing.
    pub fn hovered(&self) -> HoverSources {
        self.hovered
    }

    /// Whether the overlay is shown (open, possibly with a close pending).
    pub fn is_open(&self) -> bool {
        self.overlay_id().is_some()
    }

    /// Registry id of the shown overlay.
    pub fn overlay_id(&self) -> Option<OverlayId> {
        match self.state {
            TriggerState::Open { id } | TriggerState::ClosingScheduled { id, .. } => Some(id),
            TriggerState::Closed | TriggerState::OpeningScheduled { .. } => None,
        }
    }

    /// Whether [`unmount`](Self::unmount) was called.
    pub fn is_unmounted(&self) -> bool {
        self.unmounted
    }

    /// The pending open or close timer.
    pub fn pending_timer(&self) -> Option<(TimerToken, u64)> {
        match self.state {
            TriggerState::OpeningScheduled { token, deadline }
            | TriggerState::ClosingScheduled {
                token, deadline, ..
            } => Some((token, deadline)),
            TriggerState::Closed | TriggerState::Open { .. } => None,
        }
    }

    /// Earliest time at which [`advance`](Self::advance) has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        let timer = self.pending_timer().map(|(_, deadline)| deadline);
        match (timer, self.reposition_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Whether the anchor should be measured before the next render.
    pub fn needs_anchor_measure(&self) -> bool {
        !self.unmounted
            && self.state != TriggerState::Closed
            && (self.anchor_stale || !is_measurable(self.anchor))
    }

    /// Whether the rendered content should be measured once.
    pub fn needs_content_measure(&self) -> bool {
        !self.unmounted && self.content_pending && self.is_open()
    }

    /// Pointer entered the anchor.
    pub fn pointer_enter_anchor(&mut self, now: u64, cx: &mut TriggerContext<'_, C>) {
        if self.begin(cx) {
            self.hover_started(now, HoverSources::ANCHOR, cx);
        }
    }

    /// Pointer left the anchor.
    pub fn pointer_leave_anchor(&mut self, now: u64, cx: &mut TriggerContext<'_, C>) {
        if self.begin(cx) {
            self.hover_ended(now, HoverSources::ANCHOR, cx);
        }
    }

    /// Pointer entered the overlay content.
    pub fn pointer_enter_content(&mut self, now: u64, cx: &mut TriggerContext<'_, C>) {
        if self.begin(cx) {
            self.hover_started(now, HoverSources::CONTENT, cx);
        }
    }

    /// Pointer left the overlay content.
    pub fn pointer_leave_content(&mut self, now: u64, cx: &mut TriggerContext<'_, C>) {
        if self.begin(cx) {
            self.hover_ended(now, HoverSources::CONTENT, cx);
        }
    }

    /// The anchor gained keyboard focus.
    pub fn focus_anchor(&mut self, now: u64, cx: &mut TriggerContext<'_, C>) {
        if self.begin(cx) {
            self.hover_started(now, HoverSources::FOCUS, cx);
        }
    }

    /// The anchor lost keyboard focus.
    pub fn blur_anchor(&mut self, now: u64, cx: &mut TriggerContext<'_, C>) {
        if self.begin(cx) {
            self.hover_ended(now, HoverSources::FOCUS, cx);
        }
    }

    /// The anchor was clicked. Toggles click-triggered overlays.
    pub fn click_anchor(&mut self, cx: &mut TriggerContext<'_, C>) {
        if !self.begin(cx) || self.config.kind != TriggerKind::Click {
            return;
        }
        match self.state {
            TriggerState::Closed | TriggerState::OpeningScheduled { .. } => self.open_now(cx),
            TriggerState::Open { .. } | TriggerState::ClosingScheduled { .. } => {
                self.close_now(cx);
            }
        }
    }

    /// A click landed outside both anchor and content. Returns whether it closed
    /// the overlay.
    pub fn click_outside(&mut self, cx: &mut TriggerContext<'_, C>) -> bool {
        if !self.begin(cx)
            || !self.config.close_on_click_outside
            || self.state == TriggerState::Closed
        {
            return false;
        }
        self.close_now(cx);
        true
    }

    /// Escape was pressed. Returns whether it closed the overlay.
    pub fn escape(&mut self, cx: &mut TriggerContext<'_, C>) -> bool {
        if !self.begin(cx) || !self.config.close_on_escape || self.state == TriggerState::Closed
        {
            return false;
        }
        self.close_now(cx);
        true
    }

    /// Run every timer due at `now`. Returns whether anything fired.
    pub fn advance(&mut self, now: u64, cx: &mut TriggerContext<'_, C>) -> bool {
        if !self.begin(cx) {
            return false;
        }
        let mut fired = false;
        if let Some((token, deadline)) = self.pending_timer() {
            if deadline <= now {
                fired = self.fire(token, cx);
            }
        }
        if let Some(at) = self.reposition_at {
            if at <= now {
                self.reposition_at = None;
                self.anchor_stale = true;
                cx.sync_viewport();
                fired = true;
                tracing::trace!(now, "overlay anchor marked stale");
            }
        }
        fired
    }

    /// Fire the open/close timer identified by `token`, regardless of its deadline.
    ///
    /// Returns `false` if the token belongs to a timer that was already cancelled
    /// or has fired.
    pub fn fire_timer(&mut self, token: TimerToken, cx: &mut TriggerContext<'_, C>) -> bool {
        if !self.begin(cx) {
            return false;
        }
        self.fire(token, cx)
    }

    /// The viewport scrolled or resized.
    ///
    /// Re-measurement is debounced by [`TriggerConfig::reposition_debounce`]. Does
    /// nothing unless the overlay is open and tracking the viewport.
    pub fn viewport_changed(&mut self, now: u64, cx: &mut TriggerContext<'_, C>) {
        if !self.begin(cx) || self.listener.is_none() {
            return;
        }
        if self.config.reposition_debounce == 0 {
            self.anchor_stale = true;
            cx.sync_viewport();
        } else {
            self.reposition_at = Some(now.saturating_add(self.config.reposition_debounce));
        }
    }

    /// Report a fresh anchor measurement.
    ///
    /// Zero rectangles are ignored (the anchor stays stale and should be measured
    /// again on the next layout tick).
    pub fn anchor_measured(&mut self, rect: Rect, cx: &mut TriggerContext<'_, C>) {
        if !self.begin(cx) {
            return;
        }
        if !is_measurable(rect) {
            tracing::trace!("anchor not measurable yet");
            self.anchor_stale = self.state != TriggerState::Closed;
            return;
        }
        self.anchor = rect;
        self.anchor_stale = false;
        if let Some(id) = self.overlay_id() {
            cx.sync_viewport();
            cx.registry.update(id, OverlayPatch::anchor(rect));
        }
    }

    /// Report the rendered content size. Only the first report after each open is
    /// used; returns whether it was.
    pub fn content_measured(&mut self, size: Size, cx: &mut TriggerContext<'_, C>) -> bool {
        if !self.begin(cx) || !self.needs_content_measure() {
            return false;
        }
        if !size.is_finite() || (size.width <= 0.0 && size.height <= 0.0) {
            return false;
        }
        self.content_pending = false;
        match self.overlay_id() {
            Some(id) => {
                cx.registry.update(id, OverlayPatch::content_size(size));
                true
            }
            None => false,
        }
    }

    /// Enable or disable the trigger. Disabling closes the overlay.
    pub fn set_disabled(&mut self, disabled: bool, cx: &mut TriggerContext<'_, C>) {
        if !self.begin(cx) {
            return;
        }
        self.config.disabled = disabled;
        if disabled && self.state != TriggerState::Closed {
            self.close_now(cx);
        }
    }

    /// The anchor was unmounted: close, cancel every timer, drop listeners.
    ///
    /// Every later call is a no-op.
    pub fn unmount(&mut self, cx: &mut TriggerContext<'_, C>) {
        if !self.begin(cx) {
            return;
        }
        self.close_now(cx);
        self.hovered = HoverSources::empty();
        self.unmounted = true;
        tracing::debug!("overlay trigger unmounted");
    }

    /// Measure whatever is stale with `adapter` and feed the results back.
    ///
    /// `content` is the rendered overlay content, if it is mounted yet.
    pub async fn refresh<T, A>(
        &mut self,
        adapter: &A,
        anchor: &T,
        content: Option<&T>,
        cx: &mut TriggerContext<'_, C>,
    ) where
        T: ?Sized,
        A: MeasurementAdapter<T> + ?Sized,
    {
        if self.needs_anchor_measure() {
            let rect = adapter.measure(anchor).await;
            self.anchor_measured(rect, cx);
        }
        if let Some(content) = content {
            if self.needs_content_measure() {
                let rect = adapter.measure(content).await;
                self.content_measured(rect.size(), cx);
            }
        }
    }

    fn begin(&mut self, cx: &mut TriggerContext<'_, C>) -> bool {
        if self.unmounted {
            return false;
        }
        if let Some(id) = self.overlay_id() {
            if !cx.registry.contains(id) {
                tracing::debug!(%id, "overlay closed outside its trigger");
                self.reset(cx);
            }
        }
        true
    }

    fn hover_started(&mut self, now: u64, source: HoverSources, cx: &mut TriggerContext<'_, C>) {
        self.hovered.insert(source);
        if self.config.kind != TriggerKind::Hover {
            return;
        }
        match self.state {
            TriggerState::Closed => {
                if source == HoverSources::FOCUS {
                    self.open_now(cx);
                } else if source == HoverSources::ANCHOR {
                    self.schedule_open(now, cx);
                }
            }
            TriggerState::OpeningScheduled { .. } => {
                if source == HoverSources::FOCUS {
                    self.open_now(cx);
                }
            }
            TriggerState::ClosingScheduled { id, .. } => {
                tracing::trace!(%id, "pending close cancelled");
                self.state = TriggerState::Open { id };
            }
            TriggerState::Open { .. } => {}
        }
    }

    fn hover_ended(&mut self, now: u64, source: HoverSources, cx: &mut TriggerContext<'_, C>) {
        self.hovered.remove(source);
        if self.config.kind != TriggerKind::Hover || !self.hovered.is_empty() {
            return;
        }
        match self.state {
            TriggerState::OpeningScheduled { .. } => {
                tracing::trace!("pending open cancelled");
                self.state = TriggerState::Closed;
            }
            TriggerState::Open { id } => self.schedule_close(now, id, cx),
            TriggerState::Closed | TriggerState::ClosingScheduled { .. } => {}
        }
    }

    fn fire(&mut self, token: TimerToken, cx: &mut TriggerContext<'_, C>) -> bool {
        match self.state {
            TriggerState::OpeningScheduled { token: pending, .. } if pending == token => {
                self.open_now(cx);
                true
            }
            TriggerState::ClosingScheduled {
                id, token: pending, ..
            } if pending == token => {
                if self.hovered.is_empty() {
                    self.close_now(cx);
                } else {
                    self.state = TriggerState::Open { id };
                }
                true
            }
            _ => {
                tracing::trace!(?token, "stale timer ignored");
                false
            }
        }
    }

    fn fresh_token(&mut self) -> TimerToken {
        self.next_token += 1;
        TimerToken(self.next_token)
    }

    fn schedule_open(&mut self, now: u64, cx: &mut TriggerContext<'_, C>) {
        if self.config.disabled {
            return;
        }
        if self.config.open_delay == 0 {
            self.open_now(cx);
            return;
        }
        let token = self.fresh_token();
        let deadline = now.saturating_add(self.config.open_delay);
        tracing::trace!(?token, deadline, "open scheduled");
        self.state = TriggerState::OpeningScheduled { token, deadline };
    }

    fn schedule_close(&mut self, now: u64, id: OverlayId, cx: &mut TriggerContext<'_, C>) {
        if self.config.close_delay == 0 {
            self.close_now(cx);
            return;
        }
        let token = self.fresh_token();
        let deadline = now.saturating_add(self.config.close_delay);
        tracing::trace!(%id, ?token, deadline, "close scheduled");
        self.state = TriggerState::ClosingScheduled {
            id,
            token,
            deadline,
        };
    }

    fn open_now(&mut self, cx: &mut TriggerContext<'_, C>) {
        if self.config.disabled {
            self.state = TriggerState::Closed;
            return;
        }
        if let Some(id) = self.overlay_id() {
            self.state = TriggerState::Open { id };
            return;
        }
        let mut spec = OverlaySpec::new(self.content.clone(), self.anchor)
            .with_placement(self.placement)
            .with_offset(self.offset)
            .with_strategy(self.strategy)
            .with_trigger(self.config.kind)
            .with_dismissal(
                self.config.close_on_click_outside,
                self.config.close_on_escape,
            );
        spec.content_size = self.content_size;
        if let Some(on_close) = &self.on_close {
            let on_close = Rc::clone(on_close);
            spec.on_close = Some(Box::new(move || on_close()));
        }
        cx.sync_viewport();
        let id = cx.registry.open(spec);
        self.state = TriggerState::Open { id };
        self.anchor_stale = !is_measurable(self.anchor);
        self.content_pending = self.content_size.is_none();
        match cx.listeners.listen() {
            Ok(listener) => self.listener = Some(listener),
            Err(err) => {
                tracing::warn!(%id, %err, "overlay will not follow scroll or resize");
            }
        }
    }

    fn close_now(&mut self, cx: &mut TriggerContext<'_, C>) {
        if let Some(id) = self.overlay_id() {
            cx.registry.close(id);
        }
        self.reset(cx);
    }

    fn reset(&mut self, cx: &mut TriggerContext<'_, C>) {
        if let Some(listener) = self.listener.take() {
            cx.listeners.unlisten(listener);
        }
        // Closed content is unmounted and never reports a pointer leave.
        self.hovered.remove(HoverSources::CONTENT);
        self.state = TriggerState::Closed;
        self.reposition_at = None;
        self.anchor_stale = false;
        self.content_pending = false;
    }
}
