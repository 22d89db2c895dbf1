// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Anchor measurement over synchronous and asynchronous layout substrates.
//!
//! ## Overview
//!
//! Overlays are positioned against the on-screen rectangle of an anchor element.
//! How that rectangle is obtained depends on the host:
//!
//! - DOM-like hosts answer a bounding-box query synchronously ([`LayoutQuery`]).
//! - Native view hierarchies answer through a round trip to another thread
//!   ([`NativeLayoutBridge`]); the reply arrives later.
//!
//! [`MeasurementAdapter`] hides the difference behind a single future-returning
//! method. Pick one implementation at startup with [`select_adapter`] and hand it to
//! the code that needs measurements.
//!
//! ## Unmeasurable targets
//!
//! An unmounted or not-yet-laid-out target measures as [`Rect::ZERO`]. Callers
//! should treat that as "try again on the next layout tick" (see
//! [`is_measurable`](understory_placement::is_measurable)) rather than positioning
//! against the origin.
//!
//! ```
//! use kurbo::Rect;
//! use understory_overlay::measure::{LayoutQuery, SyncMeasurement, measure_element};
//!
//! struct Boxes;
//! impl LayoutQuery<u32> for Boxes {
//!     fn bounding_rect(&self, target: &u32) -> Option<Rect> {
//!         (*target == 1).then(|| Rect::new(10.0, 10.0, 50.0, 30.0))
//!     }
//! }
//!
//! let adapter = SyncMeasurement::new(Boxes);
//! let rect = pollster::block_on(measure_element(&adapter, &1_u32));
//! assert_eq!(rect, Rect::new(10.0, 10.0, 50.0, 30.0));
//! // Unknown elements are not an error.
//! assert_eq!(pollster::block_on(measure_element(&adapter, &2_u32)), Rect::ZERO);
//! ```

use alloc::boxed::Box;
use core::cell::Cell;

use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use kurbo::Rect;
use understory_placement::{Viewport, is_measurable};

/// Future returned by [`MeasurementAdapter::measure`].
pub type MeasureFuture<'a> = LocalBoxFuture<'a, Rect>;

/// Resolves the on-screen rectangle of an anchor.
///
/// Implementations must be stateless with respect to measurement: measuring the
/// same target twice without a layout change yields the same rectangle.
pub trait MeasurementAdapter<T: ?Sized> {
    /// Measure `target` in viewport coordinates, or [`Rect::ZERO`] if it cannot be
    /// measured yet.
    fn measure<'a>(&'a self, target: &'a T) -> MeasureFuture<'a>;
}

/// Synchronous bounding-box query, as offered by DOM-like hosts.
pub trait LayoutQuery<T: ?Sized> {
    /// The target's bounding box, or `None` when it is not mounted or laid out.
    fn bounding_rect(&self, target: &T) -> Option<Rect>;
}

impl<T: ?Sized, F: Fn(&T) -> Option<Rect>> LayoutQuery<T> for F {
    fn bounding_rect(&self, target: &T) -> Option<Rect> {
        self(target)
    }
}

/// Asynchronous layout request, as offered by native view hierarchies.
///
/// The bridge forwards the request to wherever layout lives and eventually sends
/// the answer through `reply`. Dropping `reply` without sending is treated as an
/// unmeasurable target.
pub trait NativeLayoutBridge<T: ?Sized> {
    /// Ask for the layout rectangle of `target`.
    fn request_layout(&self, target: &T, reply: oneshot::Sender<Option<Rect>>);
}

/// [`MeasurementAdapter`] over a synchronous [`LayoutQuery`].
///
/// The measurement completes immediately; the future exists only so both
/// substrates share one interface.
#[derive(Clone, Debug)]
pub struct SyncMeasurement<Q> {
    query: Q,
}

impl<Q> SyncMeasurement<Q> {
    /// Wrap a layout query.
    pub fn new(query: Q) -> Self {
        Self { query }
    }
}

impl<T: ?Sized, Q: LayoutQuery<T>> MeasurementAdapter<T> for SyncMeasurement<Q> {
    fn measure<'a>(&'a self, target: &'a T) -> MeasureFuture<'a> {
        let rect = normalize(self.query.bounding_rect(target));
        Box::pin(core::future::ready(rect))
    }
}

/// [`MeasurementAdapter`] over an asynchronous [`NativeLayoutBridge`].
#[derive(Clone, Debug)]
pub struct NativeMeasurement<B> {
    bridge: B,
}

impl<B> NativeMeasurement<B> {
    /// Wrap a native layout bridge.
    pub fn new(bridge: B) -> Self {
        Self { bridge }
    }
}

impl<T: ?Sized, B: NativeLayoutBridge<T>> MeasurementAdapter<T> for NativeMeasurement<B> {
    fn measure<'a>(&'a self, target: &'a T) -> MeasureFuture<'a> {
        let (tx, rx) = oneshot::channel();
        self.bridge.request_layout(target, tx);
        Box::pin(async move {
            match rx.await {
                Ok(rect) => normalize(rect),
                Err(oneshot::Canceled) => {
                    tracing::trace!("layout request dropped without a reply");
                    Rect::ZERO
                }
            }
        })
    }
}

/// Host substrate, used to pick a [`MeasurementAdapter`] at startup.
#[derive(Clone, Debug)]
pub enum Substrate<Q, B> {
    /// Synchronous bounding-box queries.
    Dom(Q),
    /// Asynchronous native layout round trips.
    Native(B),
}

/// Build the measurement adapter for the host substrate.
pub fn select_adapter<T, Q, B>(substrate: Substrate<Q, B>) -> Box<dyn MeasurementAdapter<T>>
where
    T: ?Sized,
    Q: LayoutQuery<T> + 'static,
    B: NativeLayoutBridge<T> + 'static,
{
    match substrate {
        Substrate::Dom(query) => Box::new(SyncMeasurement::new(query)),
        Substrate::Native(bridge) => Box::new(NativeMeasurement::new(bridge)),
    }
}

/// Measure `target` with `adapter`.
pub async fn measure_element<T, A>(adapter: &A, target: &T) -> Rect
where
    T: ?Sized,
    A: MeasurementAdapter<T> + ?Sized,
{
    adapter.measure(target).await
}

/// Supplies the current viewport snapshot.
///
/// Hosts implement this over window dimensions and scroll offsets, or over the
/// screen dimensions on native substrates.
pub trait ViewportSource {
    /// The current viewport.
    fn viewport(&self) -> Viewport;
}

impl ViewportSource for Viewport {
    fn viewport(&self) -> Viewport {
        *self
    }
}

/// A snapshot the host overwrites on scroll and resize.
impl ViewportSource for Cell<Viewport> {
    fn viewport(&self) -> Viewport {
        self.get()
    }
}

impl<F: Fn() -> Viewport> ViewportSource for F {
    fn viewport(&self) -> Viewport {
        self()
    }
}

/// Read the current viewport from `source`.
pub fn get_viewport<S: ViewportSource + ?Sized>(source: &S) -> Viewport {
    source.viewport()
}

fn normalize(rect: Option<Rect>) -> Rect {
    match rect {
        Some(rect) if is_measurable(rect) => rect.abs(),
        _ => Rect::ZERO,
    }
}
