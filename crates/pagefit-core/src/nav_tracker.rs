#![forbid(unsafe_code)]

//! Page-view tracker.
//!
//! The hosting framework announces a navigation up to three times: when the
//! app mounts (initial page only), when a page has rendered (`page:finish`),
//! and after the router completes a transition. The last one is deferred to
//! the next frame so `document.title` has settled. [`NavTracker::track`]
//! drops a report whose normalized path equals the last reported one, so all
//! three can fire for the same navigation without double counting.
//!
//! # Invariants
//!
//! 1. Two consecutive `track` calls with the same normalized path emit one
//!    report.
//! 2. `last_tracked_path` only ever changes inside `track`, and only forward.
//! 3. Each report is `event page_view` followed by `config <id>`, both with
//!    the same [`PageView`] fields.
//! 4. Without a collector id, [`NavTracker::attach`] returns `None` and the
//!    host sees no registration, no queue and no loader.
//! 5. Teardown cancels every deferred capture.

use crate::analytics::{AnalyticsSink, PageView, SinkCommand, SinkKind, select_sink};
use crate::config::PageFitConfig;
use crate::host::{
    CollectorHost, EventDisposition, EventKind, EventTarget, FrameHandle, Host, HostEvent,
    ListenOptions, ListenerId,
};
use crate::listeners::ListenerSet;
use crate::route::{Location, PageTarget, Route};

pub struct NavTracker {
    collector_id: String,
    sink: Option<Box<dyn AnalyticsSink>>,
    last_tracked_path: Option<String>,
    listeners: ListenerSet,
    deferred: Vec<(FrameHandle, Route)>,
    report_count: u64,
}

impl std::fmt::Debug for NavTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavTracker")
            .field("collector_id", &self.collector_id)
            .field("sink", &self.sink_kind())
            .field("last_tracked_path", &self.last_tracked_path)
            .field("deferred", &self.deferred.len())
            .field("report_count", &self.report_count)
            .finish()
    }
}

impl NavTracker {
    /// Tracker with an explicit sink and no host registrations.
    ///
    /// Used when the embedder wires navigation signals itself.
    #[must_use]
    pub fn with_sink(collector_id: impl Into<String>, sink: Option<Box<dyn AnalyticsSink>>) -> Self {
        Self {
            collector_id: collector_id.into(),
            sink,
            last_tracked_path: None,
            listeners: ListenerSet::new(),
            deferred: Vec::new(),
            report_count: 0,
        }
    }

    /// Bootstrap the collector and subscribe to the three navigation signals.
    ///
    /// Returns `None`, touching nothing on the host, when no collector id is
    /// configured.
    pub fn attach<H>(config: &PageFitConfig, host: &mut H) -> Option<Self>
    where
        H: Host + CollectorHost + ?Sized,
    {
        let Some(collector_id) = config.collector_id() else {
            tracing::debug!(target: "pagefit.nav", "no collector id; page-view tracking disabled");
            return None;
        };

        let queue = host.command_queue();
        if let Some(script_url) = config.collector_script_url() {
            let bootstrap = SinkCommand::bootstrap(collector_id, host.now_ms());
            host.load_collector(&script_url, &bootstrap);
        }

        let mut direct = host.collector_function();
        if direct.is_none() && queue.is_some() && host.install_collector_shim() {
            direct = host.collector_function();
        }
        let sink = select_sink(direct, queue);

        let mut tracker = Self::with_sink(collector_id, sink);
        let l = &mut tracker.listeners;
        l.add(host, EventTarget::App, EventKind::AppMounted, ListenOptions::default());
        l.add(host, EventTarget::App, EventKind::PageFinish, ListenOptions::default());
        l.add(host, EventTarget::Router, EventKind::AfterNavigate, ListenOptions::default());

        tracing::debug!(
            target: "pagefit.nav",
            collector_id = %tracker.collector_id,
            sink = ?tracker.sink_kind(),
            "page-view tracker attached"
        );
        Some(tracker)
    }

    /// Report a page view unless `route` normalizes to the last reported path.
    ///
    /// Returns `true` if a report was emitted.
    pub fn track(&mut self, route: Option<&Route>, title: &str, location: &Location) -> bool {
        let target = PageTarget::resolve(route, location);
        if self.last_tracked_path.as_deref() == Some(target.path.as_str()) {
            tracing::trace!(target: "pagefit.nav", path = %target.path, "duplicate page view dropped");
            return false;
        }
        self.last_tracked_path = Some(target.path.clone());

        let params = PageView {
            page_path: target.path,
            page_title: title.to_owned(),
            page_location: target.location,
        };
        tracing::debug!(
            target: "pagefit.nav",
            path = %params.page_path,
            location = %params.page_location,
            "page view"
        );

        if let Some(sink) = self.sink.as_mut() {
            sink.dispatch(&SinkCommand::page_view(params.clone()));
            sink.dispatch(&SinkCommand::page_config(&self.collector_id, params));
        }
        self.report_count += 1;
        true
    }

    #[must_use]
    pub fn owns_listener(&self, id: ListenerId) -> bool {
        self.listeners.contains(id)
    }

    #[must_use]
    pub fn owns_frame(&self, handle: FrameHandle) -> bool {
        self.deferred.iter().any(|(h, _)| *h == handle)
    }

    /// React to a navigation signal delivered on one of this tracker's listeners.
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
            HostEvent::AppMounted => {
                let route = host.current_route();
                self.track(route.as_ref(), &host.document_title(), &host.location());
            }
            HostEvent::PageFinish { route } => {
                self.track(route.as_ref(), &host.document_title(), &host.location());
            }
            HostEvent::AfterNavigate { route } => {
                let handle = host.request_frame();
                self.deferred.push((handle, route.clone()));
                tracing::trace!(
                    target: "pagefit.nav",
                    path = %route.full_path(),
                    frame = handle.get(),
                    "page view deferred to next frame"
                );
            }
            _ => {}
        }
        EventDisposition::Proceed
    }

    /// Capture a deferred navigation once its frame fires.
    pub fn handle_frame<H: Host + ?Sized>(&mut self, host: &mut H, handle: FrameHandle) -> bool {
        let Some(index) = self.deferred.iter().position(|(h, _)| *h == handle) else {
            return false;
        };
        let (_, route) = self.deferred.remove(index);
        self.track(Some(&route), &host.document_title(), &host.location());
        true
    }

    /// Detach listeners and cancel deferred captures.
    pub fn teardown<H: Host + ?Sized>(&mut self, host: &mut H) {
        let removed = self.listeners.detach_all(host);
        let cancelled = self.deferred.len();
        for (handle, _) in self.deferred.drain(..) {
            host.cancel_frame(handle);
        }
        if removed > 0 || cancelled > 0 {
            tracing::debug!(
                target: "pagefit.nav",
                removed,
                cancelled,
                reports = self.report_count,
                "page-view tracker torn down"
            );
        }
    }

    #[must_use]
    pub fn last_tracked_path(&self) -> Option<&str> {
        self.last_tracked_path.as_deref()
    }

    #[must_use]
    pub fn collector_id(&self) -> &str {
        &self.collector_id
    }

    #[must_use]
    pub fn sink_kind(&self) -> Option<SinkKind> {
        self.sink.as_ref().map(|s| s.kind())
    }

    /// Number of page views emitted (after dedup).
    #[must_use]
    pub const fn report_count(&self) -> u64 {
        self.report_count
    }

    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use pretty_assertions::assert_eq;

    fn loc() -> Location {
        Location::from_url("https://example.org/start?ref=home").unwrap()
    }

    fn recording() -> (NavTracker, std::rc::Rc<std::cell::RefCell<Vec<SinkCommand>>>) {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen = std::rc::Rc::clone(&log);
        let direct: crate::analytics::CollectorFn =
            Box::new(move |cmd| seen.borrow_mut().push(cmd.clone()));
        (NavTracker::with_sink("G-T", select_sink(Some(direct), None)), log)
    }

    #[test]
    fn same_path_twice_reports_once() {
        let (mut tracker, log) = recording();
        let route = Route::new("/a");
        assert!(tracker.track(Some(&route), "A", &loc()));
        assert!(!tracker.track(Some(&route), "A again", &loc()));
        assert_eq!(tracker.report_count(), 1);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn distinct_paths_report_in_order() {
        let (mut tracker, log) = recording();
        tracker.track(Some(&Route::new("/a")), "A", &loc());
        tracker.track(Some(&Route::new("/b")), "B", &loc());

        let paths: Vec<_> = log
            .borrow()
            .iter()
            .filter(|c| c.verb() == "event")
            .map(|c| c.page_view_params().unwrap().page_path.clone())
            .collect();
        assert_eq!(paths, vec!["/a".to_owned(), "/b".to_owned()]);
    }

    #[test]
    fn report_is_event_then_config_with_same_payload() {
        let (mut tracker, log) = recording();
        tracker.track(Some(&Route::new("/docs?q=1")), "Docs", &loc());

        let expected = PageView {
            page_path: "/docs?q=1".into(),
            page_title: "Docs".into(),
            page_location: "https://example.org/docs?q=1".into(),
        };
        assert_eq!(
            *log.borrow(),
            vec![
                SinkCommand::page_view(expected.clone()),
                SinkCommand::page_config("G-T", expected),
            ]
        );
    }

    #[test]
    fn missing_route_uses_location() {
        let (mut tracker, log) = recording();
        tracker.track(None, "Start", &loc());
        assert_eq!(tracker.last_tracked_path(), Some("/start?ref=home"));
        let first = log.borrow()[0].clone();
        assert_eq!(
            first.page_view_params().unwrap().page_location,
            "https://example.org/start?ref=home"
        );
    }

    #[test]
    fn query_change_is_a_new_page() {
        let (mut tracker, _) = recording();
        tracker.track(Some(&Route::new("/list?page=1")), "L", &loc());
        assert!(tracker.track(Some(&Route::new("/list?page=2")), "L", &loc()));
    }

    #[test]
    fn returning_to_earlier_path_reports_again() {
        let (mut tracker, _) = recording();
        tracker.track(Some(&Route::new("/a")), "A", &loc());
        tracker.track(Some(&Route::new("/b")), "B", &loc());
        assert!(tracker.track(Some(&Route::new("/a")), "A", &loc()));
        assert_eq!(tracker.report_count(), 3);
    }

    #[test]
    fn sinkless_tracker_still_dedups() {
        let mut tracker = NavTracker::with_sink("G-T", None);
        assert!(tracker.track(Some(&Route::new("/a")), "A", &loc()));
        assert!(!tracker.track(Some(&Route::new("/a")), "A", &loc()));
        assert_eq!(tracker.sink_kind(), None);
    }

    #[test]
    fn attach_without_collector_touches_nothing() {
        let mut host = HeadlessHost::new();
        let tracker = NavTracker::attach(&PageFitConfig::default(), &mut host);
        assert!(tracker.is_none());
        assert_eq!(host.active_listener_count(), 0);
        assert!(!host.command_queue_created());
        assert!(host.loaded_collectors().is_empty());
    }

    #[test]
    fn attach_bootstraps_collector() {
        let mut host = HeadlessHost::new().with_clock_ms(42.0);
        let config = PageFitConfig::with_collector("G-BOOT");
        let tracker = NavTracker::attach(&config, &mut host).unwrap();

        assert_eq!(host.active_listener_count(), 3);
        assert!(host.command_queue_created());
        assert!(host.collector_shim_installed());
        assert_eq!(tracker.sink_kind(), Some(SinkKind::Direct));

        let loaded = host.loaded_collectors();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "https://www.googletagmanager.com/gtag/js?id=G-BOOT");
        assert_eq!(loaded[0].1, SinkCommand::bootstrap("G-BOOT", 42.0));
    }

    #[test]
    fn attach_keeps_existing_collector_function() {
        let mut host = HeadlessHost::new().with_collector_function();
        let tracker =
            NavTracker::attach(&PageFitConfig::with_collector("G-1"), &mut host).unwrap();
        assert!(!host.collector_shim_installed());
        assert_eq!(tracker.sink_kind(), Some(SinkKind::Direct));
    }

    #[test]
    fn attach_falls_back_to_buffer_without_shim_support() {
        let mut host = HeadlessHost::new().with_shim_support(false);
        let tracker =
            NavTracker::attach(&PageFitConfig::with_collector("G-1"), &mut host).unwrap();
        assert_eq!(tracker.sink_kind(), Some(SinkKind::Buffered));
    }

    #[test]
    fn after_navigate_waits_for_frame_and_reads_settled_title() {
        let mut host = HeadlessHost::new().with_title("Loading");
        let mut tracker =
            NavTracker::attach(&PageFitConfig::with_collector("G-1"), &mut host).unwrap();
        let id = host.listeners_for(EventTarget::Router, EventKind::AfterNavigate)[0];

        let _ = tracker.handle_event(
            &mut host,
            id,
            &HostEvent::AfterNavigate {
                route: Route::new("/post/1"),
            },
        );
        assert_eq!(tracker.report_count(), 0);
        assert_eq!(tracker.deferred_count(), 1);

        host.set_title("Post 1");
        for handle in host.take_pending_frames() {
            assert!(tracker.handle_frame(&mut host, handle));
        }
        assert_eq!(tracker.report_count(), 1);
        let reports = host.collector_commands();
        assert_eq!(reports[0].page_view_params().unwrap().page_title, "Post 1");
    }

    #[test]
    fn teardown_cancels_deferred_captures() {
        let mut host = HeadlessHost::new();
        let mut tracker =
            NavTracker::attach(&PageFitConfig::with_collector("G-1"), &mut host).unwrap();
        let id = host.listeners_for(EventTarget::Router, EventKind::AfterNavigate)[0];
        for path in ["/x", "/y"] {
            let _ = tracker.handle_event(
                &mut host,
                id,
                &HostEvent::AfterNavigate {
                    route: Route::new(path),
                },
            );
        }
        assert_eq!(host.pending_frame_count(), 2);

        tracker.teardown(&mut host);
        tracker.teardown(&mut host);
        assert_eq!(host.pending_frame_count(), 0);
        assert_eq!(host.active_listener_count(), 0);
        assert_eq!(tracker.deferred_count(), 0);
    }
}
