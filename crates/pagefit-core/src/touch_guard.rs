#![forbid(unsafe_code)]

//! Pull-to-refresh guard for touch Apple devices.
//!
//! Safari on iPhone/iPad reloads the page when the user drags down while the
//! page is already scrolled to the top. [`TouchGuard`] cancels exactly that
//! gesture and nothing else.
//!
//! # State Machine
//!
//! - **Idle** → single-touch `touchstart`: record the start Y and whether the
//!   page is at the top → **Tracking**.
//! - **Tracking** → single-touch `touchmove`: the gesture pulls down when the
//!   current Y is greater than the recorded Y. At top + pulling down +
//!   cancelable ⇒ [`EventDisposition::PreventDefault`]. Then record the new Y
//!   and at-top flag.
//! - A `touchstart`/`touchmove` with any other number of touch points is
//!   ignored: no transition, no suppression. Pinch-zoom is never blocked.
//! - `scroll` refreshes the at-top flag.
//!
//! A single-touch move that arrives without a preceding start (the start was
//! delivered before attach) is compared against the initial Y of `0.0`, and
//! the guard enters **Tracking**.
//!
//! # Invariants
//!
//! 1. `at_top` is re-read from the host's scroll offset on every tracked
//!    start, move and scroll.
//! 2. Listeners are registered only when the platform probe matches.
//! 3. Teardown removes all three listeners and is idempotent.

use crate::host::{
    EventDisposition, EventKind, EventTarget, Host, HostEvent, ListenOptions, ListenerId,
    TouchSample,
};
use crate::listeners::ListenerSet;

/// Whether a scroll offset counts as the top of the page. Elastic
/// overscroll reports negative offsets, which also count.
#[must_use]
pub fn is_at_top(scroll_y: f64) -> bool {
    scroll_y <= 0.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Tracking,
}

/// Per-gesture state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchState {
    pub start_y: f64,
    pub at_top: bool,
}

impl Default for TouchState {
    fn default() -> Self {
        Self {
            start_y: 0.0,
            at_top: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TouchGuard {
    listeners: ListenerSet,
    state: TouchState,
    phase: GesturePhase,
    suppressed: u64,
}

impl TouchGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the touch and scroll listeners if the device matches.
    ///
    /// Returns whether the guard is active. Attaching an active guard again
    /// is a no-op.
    pub fn attach<H: Host + ?Sized>(&mut self, host: &mut H) -> bool {
        if self.is_active() {
            return true;
        }

        let probe = host.platform_probe();
        if !probe.is_touch_apple_device() {
            tracing::debug!(
                target: "pagefit.touch",
                platform = ?probe.platform,
                "platform not targeted; overscroll guard inactive"
            );
            return false;
        }

        self.state = TouchState {
            start_y: 0.0,
            at_top: is_at_top(host.scroll_y()),
        };
        self.phase = GesturePhase::Idle;

        let l = &mut self.listeners;
        l.add(host, EventTarget::Window, EventKind::TouchStart, ListenOptions::PASSIVE);
        l.add(host, EventTarget::Window, EventKind::TouchMove, ListenOptions::ACTIVE);
        l.add(host, EventTarget::Window, EventKind::Scroll, ListenOptions::PASSIVE);

        tracing::debug!(target: "pagefit.touch", at_top = self.state.at_top, "overscroll guard attached");
        true
    }

    pub fn on_touch_start(&mut self, sample: &TouchSample, scroll_y: f64) {
        if !sample.is_single_touch() {
            return;
        }
        self.state = TouchState {
            start_y: sample.client_y,
            at_top: is_at_top(scroll_y),
        };
        self.phase = GesturePhase::Tracking;
        tracing::trace!(
            target: "pagefit.touch",
            start_y = sample.client_y,
            at_top = self.state.at_top,
            "touch tracking started"
        );
    }

    pub fn on_touch_move(&mut self, sample: &TouchSample, scroll_y: f64) -> EventDisposition {
        if !sample.is_single_touch() {
            return EventDisposition::Proceed;
        }

        let pulling_down = sample.client_y > self.state.start_y;
        let disposition = if self.state.at_top && pulling_down && sample.cancelable {
            self.suppressed += 1;
            tracing::trace!(
                target: "pagefit.touch",
                from_y = self.state.start_y,
                to_y = sample.client_y,
                "pull-to-refresh suppressed"
            );
            EventDisposition::PreventDefault
        } else {
            EventDisposition::Proceed
        };

        self.state = TouchState {
            start_y: sample.client_y,
            at_top: is_at_top(scroll_y),
        };
        self.phase = GesturePhase::Tracking;
        disposition
    }

    pub fn on_scroll(&mut self, scroll_y: f64) {
        self.state.at_top = is_at_top(scroll_y);
    }

    #[must_use]
    pub fn owns_listener(&self, id: ListenerId) -> bool {
        self.listeners.contains(id)
    }

    /// React to an event delivered on one of this guard's listeners.
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
            HostEvent::TouchStart(sample) => {
                self.on_touch_start(sample, host.scroll_y());
                EventDisposition::Proceed
            }
            HostEvent::TouchMove(sample) => self.on_touch_move(sample, host.scroll_y()),
            HostEvent::Scroll => {
                self.on_scroll(host.scroll_y());
                EventDisposition::Proceed
            }
            _ => EventDisposition::Proceed,
        }
    }

    /// Detach the three listeners.
    pub fn teardown<H: Host + ?Sized>(&mut self, host: &mut H) {
        let removed = self.listeners.detach_all(host);
        if removed > 0 {
            tracing::debug!(
                target: "pagefit.touch",
                removed,
                suppressed = self.suppressed,
                "overscroll guard torn down"
            );
        }
        self.phase = GesturePhase::Idle;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.listeners.is_empty()
    }

    #[must_use]
    pub const fn state(&self) -> TouchState {
        self.state
    }

    #[must_use]
    pub const fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// Number of moves whose default action was cancelled.
    #[must_use]
    pub const fn suppressed_count(&self) -> u64 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use crate::platform::PlatformProbe;

    fn two_finger(client_y: f64) -> TouchSample {
        TouchSample {
            touch_count: 2,
            client_y,
            cancelable: true,
        }
    }

    fn iphone() -> HeadlessHost {
        HeadlessHost::new().with_platform(PlatformProbe::new(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X)",
            "iPhone",
            true,
        ))
    }

    #[test]
    fn pull_down_at_top_is_suppressed() {
        let mut guard = TouchGuard::new();
        guard.on_touch_start(&TouchSample::single(100.0), 0.0);
        assert_eq!(guard.phase(), GesturePhase::Tracking);
        let d = guard.on_touch_move(&TouchSample::single(120.0), 0.0);
        assert_eq!(d, EventDisposition::PreventDefault);
        assert_eq!(guard.state().start_y, 120.0);
        assert_eq!(guard.suppressed_count(), 1);
    }

    #[test]
    fn pull_down_below_top_is_allowed() {
        let mut guard = TouchGuard::new();
        guard.on_touch_start(&TouchSample::single(100.0), 250.0);
        let d = guard.on_touch_move(&TouchSample::single(140.0), 210.0);
        assert_eq!(d, EventDisposition::Proceed);
    }

    #[test]
    fn push_up_at_top_is_allowed() {
        let mut guard = TouchGuard::new();
        guard.on_touch_start(&TouchSample::single(300.0), 0.0);
        let d = guard.on_touch_move(&TouchSample::single(260.0), 40.0);
        assert_eq!(d, EventDisposition::Proceed);
        assert!(!guard.state().at_top);
    }

    #[test]
    fn non_cancelable_move_is_allowed() {
        let mut guard = TouchGuard::new();
        guard.on_touch_start(&TouchSample::single(10.0), 0.0);
        let sample = TouchSample {
            cancelable: false,
            ..TouchSample::single(50.0)
        };
        assert_eq!(guard.on_touch_move(&sample, 0.0), EventDisposition::Proceed);
        assert_eq!(guard.state().start_y, 50.0);
    }

    #[test]
    fn multi_touch_is_ignored_entirely() {
        let mut guard = TouchGuard::new();
        guard.on_touch_start(&TouchSample::single(100.0), 0.0);
        let before = guard.state();

        guard.on_touch_start(&two_finger(10.0), 500.0);
        assert_eq!(guard.on_touch_move(&two_finger(400.0), 0.0), EventDisposition::Proceed);
        assert_eq!(guard.state(), before);
    }

    #[test]
    fn multi_touch_from_idle_leaves_idle() {
        let mut guard = TouchGuard::new();
        guard.on_touch_start(&two_finger(10.0), 0.0);
        assert_eq!(guard.on_touch_move(&two_finger(40.0), 0.0), EventDisposition::Proceed);
        assert_eq!(guard.phase(), GesturePhase::Idle);
    }

    #[test]
    fn scroll_back_to_top_rearms_guard() {
        let mut guard = TouchGuard::new();
        guard.on_touch_start(&TouchSample::single(100.0), 80.0);
        assert_eq!(
            guard.on_touch_move(&TouchSample::single(110.0), 0.0),
            EventDisposition::Proceed
        );
        // The move above observed scroll 0, so the next pull is suppressed.
        assert_eq!(
            guard.on_touch_move(&TouchSample::single(130.0), 0.0),
            EventDisposition::PreventDefault
        );
    }

    #[test]
    fn scroll_listener_updates_at_top() {
        let mut guard = TouchGuard::new();
        guard.on_touch_start(&TouchSample::single(100.0), 0.0);
        guard.on_scroll(35.0);
        assert!(!guard.state().at_top);
        guard.on_scroll(-12.0);
        assert!(guard.state().at_top);
    }

    #[test]
    fn attach_registers_three_listeners_on_iphone() {
        let mut host = iphone();
        let mut guard = TouchGuard::new();
        assert!(guard.attach(&mut host));
        assert_eq!(host.active_listener_count(), 3);
        let touch_move = host
            .listener_options(EventTarget::Window, EventKind::TouchMove)
            .unwrap();
        assert!(!touch_move.passive);
        assert!(host
            .listener_options(EventTarget::Window, EventKind::TouchStart)
            .unwrap()
            .passive);
    }

    #[test]
    fn attach_is_inert_on_other_platforms() {
        let mut host = HeadlessHost::new().with_platform(PlatformProbe::new(
            "Mozilla/5.0 (X11; Linux x86_64)",
            "Linux x86_64",
            false,
        ));
        let mut guard = TouchGuard::new();
        assert!(!guard.attach(&mut host));
        assert_eq!(host.active_listener_count(), 0);
        assert!(!guard.is_active());
    }

    #[test]
    fn handle_event_routes_through_host_scroll() {
        let mut host = iphone().with_scroll_y(0.0);
        let mut guard = TouchGuard::new();
        guard.attach(&mut host);

        let start = host.listeners_for(EventTarget::Window, EventKind::TouchStart)[0];
        let moved = host.listeners_for(EventTarget::Window, EventKind::TouchMove)[0];
        let _ = guard.handle_event(&mut host, start, &HostEvent::TouchStart(TouchSample::single(5.0)));
        let d = guard.handle_event(&mut host, moved, &HostEvent::TouchMove(TouchSample::single(25.0)));
        assert!(d.prevents_default());
    }

    #[test]
    fn foreign_listener_id_is_ignored() {
        let mut host = iphone();
        let mut guard = TouchGuard::new();
        guard.attach(&mut host);
        let d = guard.handle_event(
            &mut host,
            ListenerId::new(424_242),
            &HostEvent::TouchMove(TouchSample::single(900.0)),
        );
        assert_eq!(d, EventDisposition::Proceed);
    }

    #[test]
    fn teardown_twice_is_clean() {
        let mut host = iphone();
        let mut guard = TouchGuard::new();
        guard.attach(&mut host);
        guard.teardown(&mut host);
        guard.teardown(&mut host);
        assert_eq!(host.active_listener_count(), 0);
        assert!(!guard.is_active());
    }
}
