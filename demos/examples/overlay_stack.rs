// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A hover card and a dropdown menu sharing one overlay registry.
//!
//! This example shows how to combine:
//! - `understory_overlay::measure` with a native-style layout bridge that answers
//!   from another thread,
//! - `understory_overlay::trigger` for hover delays and click toggling,
//! - `understory_overlay::registry` for stacking and batched render frames.
//!
//! Run:
//! - `RUST_LOG=understory_overlay=trace cargo run -p understory_examples --example overlay_stack`

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use futures::channel::oneshot;
use kurbo::{Point, Rect};
use tracing_subscriber::EnvFilter;
use understory_overlay::measure::{
    MeasurementAdapter, NativeLayoutBridge, Substrate, select_adapter,
};
use understory_overlay::registry::OverlayRegistry;
use understory_overlay::trigger::{
    ListenerError, ListenerId, TriggerConfig, TriggerContext, TriggerCoordinator,
    ViewportListeners,
};
use understory_placement::{PlacementOption, Viewport};

/// Elements of the pretend UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Element {
    Avatar,
    FileButton,
    ProfileCard,
    FileMenu,
}

/// Layout that lives on a "UI thread": every request is answered from a fresh thread.
#[derive(Clone, Debug)]
struct ThreadedLayout {
    frames: Arc<HashMap<Element, Rect>>,
}

impl NativeLayoutBridge<Element> for ThreadedLayout {
    fn request_layout(&self, target: &Element, reply: oneshot::Sender<Option<Rect>>) {
        let frames = Arc::clone(&self.frames);
        let target = *target;
        thread::spawn(move || {
            let _ = reply.send(frames.get(&target).copied());
        });
    }
}

/// Counts scroll/resize subscriptions so we can see them come and go.
#[derive(Debug, Default)]
struct Window {
    next: u64,
    active: usize,
}

impl ViewportListeners for Window {
    fn listen(&mut self) -> Result<ListenerId, ListenerError> {
        self.next += 1;
        self.active += 1;
        tracing::info!(listener = self.next, "window listener added");
        Ok(ListenerId::new(self.next))
    }

    fn unlisten(&mut self, id: ListenerId) {
        self.active -= 1;
        tracing::info!(listener = id.get(), "window listener removed");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let frames = HashMap::from([
        (Element::Avatar, Rect::new(900.0, 16.0, 940.0, 56.0)),
        (Element::FileButton, Rect::new(16.0, 16.0, 76.0, 40.0)),
        (Element::ProfileCard, Rect::new(0.0, 0.0, 280.0, 120.0)),
        (Element::FileMenu, Rect::new(0.0, 0.0, 200.0, 260.0)),
    ]);
    let native: Box<dyn MeasurementAdapter<Element>> =
        select_adapter::<Element, fn(&Element) -> Option<Rect>, _>(Substrate::Native(
            ThreadedLayout {
                frames: Arc::new(frames.clone()),
            },
        ));
    // Same layout, queried synchronously.
    let dom = select_adapter::<Element, _, ThreadedLayout>(Substrate::Dom(move |e: &Element| {
        frames.get(e).copied()
    }));

    let screen = Cell::new(Viewport::new(960.0, 640.0));
    let mut registry = OverlayRegistry::new(screen.get());
    registry.subscribe(|frame| {
        println!("-- frame ({} overlays)", frame.entries().len());
        for entry in frame.entries() {
            match entry.bounds() {
                Some(bounds) => println!(
                    "   z={} {:?} {} at {:?}",
                    entry.z_index(),
                    entry.content(),
                    entry
                        .resolved_placement()
                        .map(|p| p.to_string())
                        .unwrap_or_default(),
                    bounds,
                ),
                None => println!(
                    "   z={} {:?} (waiting for layout)",
                    entry.z_index(),
                    entry.content()
                ),
            }
        }
    });
    let mut window = Window::default();

    let mut card = TriggerCoordinator::new(TriggerConfig::hover(), Element::ProfileCard)
        .with_placement(PlacementOption::Auto)
        .with_offset(8.0);
    let mut menu = TriggerCoordinator::new(TriggerConfig::click(), Element::FileMenu)
        .with_placement(PlacementOption::parse_or_auto("bottom-start"))
        .with_offset(4.0);

    // Hover the avatar near the right edge; the card opens after its delay.
    {
        let mut cx =
            TriggerContext::new(&mut registry, &mut window).with_viewport_source(&screen);
        card.pointer_enter_anchor(0, &mut cx);
        if let Some(deadline) = card.next_deadline() {
            card.advance(deadline, &mut cx);
        }
        pollster::block_on(card.refresh(
            native.as_ref(),
            &Element::Avatar,
            Some(&Element::ProfileCard),
            &mut cx,
        ));
    }
    registry.flush();

    // Open the file menu on top of it, measured synchronously this time.
    {
        let mut cx =
            TriggerContext::new(&mut registry, &mut window).with_viewport_source(&screen);
        menu.click_anchor(&mut cx);
        pollster::block_on(menu.refresh(
            dom.as_ref(),
            &Element::FileButton,
            Some(&Element::FileMenu),
            &mut cx,
        ));
    }
    registry.flush();

    // The window shrinks: both overlays are re-placed in one frame.
    screen.set(Viewport::new(640.0, 320.0));
    registry.set_viewport(screen.get());
    registry.flush();

    // Escape closes the topmost overlay only.
    let closed = registry.dismiss_escape();
    println!("escape closed {closed:?}");
    registry.flush();

    // Clicking on empty space closes the card; the coordinator notices on its next event.
    registry.dismiss_outside_click(Point::new(320.0, 300.0));
    {
        let mut cx =
            TriggerContext::new(&mut registry, &mut window).with_viewport_source(&screen);
        card.pointer_leave_anchor(2000, &mut cx);
        menu.unmount(&mut cx);
        card.unmount(&mut cx);
    }
    registry.flush();
    println!(
        "open overlays: {}, window listeners: {}",
        registry.len(),
        window.active
    );
}
