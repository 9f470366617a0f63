#![forbid(unsafe_code)]

//! One client session: the three adapters plus the unmount hook.
//!
//! The host drives everything. It calls [`Session::attach`] once at startup,
//! delivers each fired listener through [`Session::dispatch`], each fired frame
//! through [`Session::on_frame`], and the session tears itself down when the
//! app's `beforeUnmount` hook fires.
//!
//! ```
//! use pagefit_core::{EventTarget, HeadlessHost, HostEvent, PageFitConfig, Session};
//!
//! let mut host = HeadlessHost::new().with_inner_height(640.0);
//! let mut session = Session::new(PageFitConfig::default());
//! session.attach(&mut host);
//!
//! host.set_inner_height(600.0);
//! host.fire(&mut session, EventTarget::Window, HostEvent::Resize);
//! host.run_frames(&mut session);
//! assert_eq!(host.style_property("--app-viewport-height"), Some("600px"));
//!
//! host.fire(&mut session, EventTarget::App, HostEvent::BeforeUnmount);
//! assert_eq!(host.active_listener_count(), 0);
//! ```

use crate::config::PageFitConfig;
use crate::host::{
    EventDisposition, EventKind, EventTarget, FrameHandle, Host, HostEvent, ListenOptions,
    ListenerId, SiteHost,
};
use crate::listeners::ListenerSet;
use crate::nav_tracker::NavTracker;
use crate::touch_guard::TouchGuard;
use crate::viewport::ViewportSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Detached,
    Attached,
    TornDown,
}

#[derive(Debug)]
pub struct Session {
    config: PageFitConfig,
    phase: SessionPhase,
    viewport: ViewportSync,
    touch_guard: TouchGuard,
    tracker: Option<NavTracker>,
    unmount: ListenerSet,
}

impl Session {
    #[must_use]
    pub fn new(config: PageFitConfig) -> Self {
        let viewport = ViewportSync::new(config.viewport_property.clone());
        Self {
            config,
            phase: SessionPhase::Detached,
            viewport,
            touch_guard: TouchGuard::new(),
            tracker: None,
            unmount: ListenerSet::new(),
        }
    }

    /// Attach every adapter. Only the first call on a fresh session has an effect.
    pub fn attach<H: SiteHost + ?Sized>(&mut self, host: &mut H) {
        if self.phase != SessionPhase::Detached {
            tracing::debug!(target: "pagefit.session", phase = ?self.phase, "attach ignored");
            return;
        }

        self.viewport.attach(host);
        if self.config.overscroll_guard {
            self.touch_guard.attach(host);
        }
        self.tracker = NavTracker::attach(&self.config, host);
        self.unmount.add(
            host,
            EventTarget::App,
            EventKind::BeforeUnmount,
            ListenOptions::default(),
        );
        self.phase = SessionPhase::Attached;

        tracing::info!(
            target: "pagefit.session",
            touch_guard = self.touch_guard.is_active(),
            tracking = self.tracker.is_some(),
            "session attached"
        );
    }

    /// Route an event fired on listener `id` to the adapter that owns it.
    pub fn dispatch<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        id: ListenerId,
        event: &HostEvent,
    ) -> EventDisposition {
        if self.unmount.contains(id) {
            self.teardown(host);
            return EventDisposition::Proceed;
        }
        if self.viewport.owns_listener(id) {
            return self.viewport.handle_event(host, id, event);
        }
        if self.touch_guard.owns_listener(id) {
            return self.touch_guard.handle_event(host, id, event);
        }
        if let Some(tracker) = self.tracker.as_mut()
            && tracker.owns_listener(id)
        {
            return tracker.handle_event(host, id, event);
        }
        tracing::trace!(
            target: "pagefit.session",
            id = id.get(),
            event = event.kind().host_name(),
            "event for unknown listener ignored"
        );
        EventDisposition::Proceed
    }

    /// Route a fired frame to the adapter that scheduled it.
    ///
    /// Returns `false` for frames nobody is waiting on.
    pub fn on_frame<H: Host + ?Sized>(&mut self, host: &mut H, handle: FrameHandle) -> bool {
        if self.viewport.handle_frame(host, handle) {
            return true;
        }
        self.tracker
            .as_mut()
            .is_some_and(|tracker| tracker.handle_frame(host, handle))
    }

    /// Tear down every adapter. Idempotent; a no-op before attach.
    pub fn teardown<H: Host + ?Sized>(&mut self, host: &mut H) {
        if self.phase != SessionPhase::Attached {
            return;
        }
        self.viewport.teardown(host);
        self.touch_guard.teardown(host);
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.teardown(host);
        }
        self.unmount.detach_all(host);
        self.phase = SessionPhase::TornDown;
        tracing::info!(target: "pagefit.session", "session torn down");
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub const fn config(&self) -> &PageFitConfig {
        &self.config
    }

    #[must_use]
    pub const fn viewport(&self) -> &ViewportSync {
        &self.viewport
    }

    #[must_use]
    pub const fn touch_guard(&self) -> &TouchGuard {
        &self.touch_guard
    }

    #[must_use]
    pub const fn tracker(&self) -> Option<&NavTracker> {
        self.tracker.as_ref()
    }

    /// Whether `handle` belongs to a pending refresh or deferred capture.
    #[must_use]
    pub fn owns_frame(&self, handle: FrameHandle) -> bool {
        self.viewport.owns_frame(handle)
            || self.tracker.as_ref().is_some_and(|t| t.owns_frame(handle))
    }
}
