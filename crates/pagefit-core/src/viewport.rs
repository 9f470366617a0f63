#![forbid(unsafe_code)]

//! Viewport height synchronizer.
//!
//! Mobile browsers shrink the visible area (on-screen keyboard, collapsing
//! URL bar) without changing `100vh`. [`ViewportSync`] keeps a CSS custom
//! property on the document root equal to `window.innerHeight`, so
//! stylesheets can size full-height layouts from it.
//!
//! # Triggers
//!
//! | Source | Event | Effect |
//! |---|---|---|
//! | window | `resize` (passive), `orientationchange`, `focus` | coalesced refresh |
//! | visual viewport (if present) | `resize`, `scroll` | coalesced refresh |
//! | app | `page:finish` | immediate publish |
//!
//! # Invariants
//!
//! 1. At most one refresh frame is pending.
//! 2. Any number of refresh requests between two frames produce one publish.
//! 3. `page:finish` publishes synchronously, whether or not a refresh is pending.
//! 4. After [`teardown`](ViewportSync::teardown) no listener is registered and
//!    no frame is pending; teardown is idempotent.

use crate::config::DEFAULT_VIEWPORT_PROPERTY;
use crate::host::{
    EventDisposition, EventKind, EventTarget, FrameHandle, Host, HostEvent, ListenOptions,
    ListenerId,
};
use crate::listeners::ListenerSet;
use crate::schedule::ScheduledTask;

#[derive(Debug, Clone)]
pub struct ViewportSync {
    property: String,
    listeners: ListenerSet,
    refresh: ScheduledTask,
    publish_count: u64,
}

impl Default for ViewportSync {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_PROPERTY)
    }
}

impl ViewportSync {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            listeners: ListenerSet::new(),
            refresh: ScheduledTask::new(),
            publish_count: 0,
        }
    }

    /// Publish once, then register every trigger. Attaching twice is a no-op.
    pub fn attach<H: Host + ?Sized>(&mut self, host: &mut H) {
        if !self.listeners.is_empty() {
            return;
        }

        self.publish(host);

        let l = &mut self.listeners;
        l.add(host, EventTarget::Window, EventKind::Resize, ListenOptions::PASSIVE);
        l.add(host, EventTarget::Window, EventKind::OrientationChange, ListenOptions::default());
        l.add(host, EventTarget::Window, EventKind::Focus, ListenOptions::default());
        if host.has_visual_viewport() {
            l.add(host, EventTarget::VisualViewport, EventKind::Resize, ListenOptions::default());
            l.add(host, EventTarget::VisualViewport, EventKind::Scroll, ListenOptions::default());
        }
        l.add(host, EventTarget::App, EventKind::PageFinish, ListenOptions::default());

        tracing::debug!(
            target: "pagefit.viewport",
            property = %self.property,
            listeners = self.listeners.len(),
            "viewport sync attached"
        );
    }

    /// Write the current inner height to the root style property.
    pub fn publish<H: Host + ?Sized>(&mut self, host: &mut H) {
        let height = host.inner_height();
        let value = format!("{height}px");
        if host.set_root_style_property(&self.property, &value) {
            self.publish_count += 1;
            tracing::trace!(
                target: "pagefit.viewport",
                property = %self.property,
                %value,
                "viewport height published"
            );
        } else {
            tracing::debug!(target: "pagefit.viewport", "no document root; publish skipped");
        }
    }

    /// Schedule a publish for the next frame. Returns `false` if one was
    /// already pending.
    pub fn request_refresh<H: Host + ?Sized>(&mut self, host: &mut H) -> bool {
        self.refresh.schedule(host)
    }

    #[must_use]
    pub fn owns_listener(&self, id: ListenerId) -> bool {
        self.listeners.contains(id)
    }

    #[must_use]
    pub fn owns_frame(&self, handle: FrameHandle) -> bool {
        self.refresh.handle() == Some(handle)
    }

    /// React to an event delivered on one of this adapter's listeners.
    pub fn handle_event<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        id: ListenerId,
        event: &HostEvent,
    ) -> EventDisposition {
        if !self.listeners.contains(id) {
            return EventDisposition::Proceed;
        }
        match event {
            HostEvent::Resize
            | HostEvent::OrientationChange
            | HostEvent::Focus
            | HostEvent::Scroll => {
                self.request_refresh(host);
            }
            HostEvent::PageFinish { .. } => self.publish(host),
            _ => {}
        }
        EventDisposition::Proceed
    }

    /// Run the coalesced publish if `handle` is this adapter's pending frame.
    pub fn handle_frame<H: Host + ?Sized>(&mut self, host: &mut H, handle: FrameHandle) -> bool {
        if !self.refresh.fire(handle) {
            return false;
        }
        self.publish(host);
        true
    }

    /// Detach every listener and cancel the pending refresh.
    pub fn teardown<H: Host + ?Sized>(&mut self, host: &mut H) {
        let removed = self.listeners.detach_all(host);
        let cancelled = self.refresh.cancel(host);
        if removed > 0 || cancelled {
            tracing::debug!(
                target: "pagefit.viewport",
                removed,
                cancelled,
                "viewport sync torn down"
            );
        }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.listeners.is_empty()
    }

    #[must_use]
    pub const fn refresh_pending(&self) -> bool {
        self.refresh.is_pending()
    }

    /// Number of successful style writes so far.
    #[must_use]
    pub const fn publish_count(&self) -> u64 {
        self.publish_count
    }

    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }
}
