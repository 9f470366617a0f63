#![forbid(unsafe_code)]

//! Deterministic in-memory host.
//!
//! [`HeadlessHost`] implements [`Host`], [`CollectorHost`] and [`AudioBridge`]
//! without a browser: listeners live in a registry, frames in a queue that
//! only advances when [`run_frames`](HeadlessHost::run_frames) is called, and
//! every collector command is recorded. Tests and the fuzz target drive a
//! [`Session`] through it.
//!
//! Delivery follows browser rules that matter here: removed listeners never
//! fire, cancelled frames never run, and a `PreventDefault` returned for a
//! passive listener is ignored.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use url::Url;

use crate::analytics::{CollectorFn, CommandQueue, PAGE_VIEW_EVENT, PageView, SinkCommand};
use crate::audio::AudioBridge;
use crate::error::BridgeError;
use crate::host::{
    CollectorHost, EventDisposition, EventKind, EventTarget, FrameHandle, Host, HostEvent,
    ListenOptions, ListenerId,
};
use crate::platform::PlatformProbe;
use crate::route::{Location, Route};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Registration {
    target: EventTarget,
    kind: EventKind,
    options: ListenOptions,
}

/// How a command reached the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorChannel {
    /// Through the reporting function (native or shim).
    Function,
    /// Pushed onto the command queue.
    Queue,
}

#[derive(Debug, Default)]
struct CollectorLog {
    queue_created: bool,
    shim_installed: bool,
    commands: Vec<(CollectorChannel, SinkCommand)>,
    loaded: Vec<(String, Vec<SinkCommand>)>,
}

struct RecordingQueue(Rc<RefCell<CollectorLog>>);

impl CommandQueue for RecordingQueue {
    fn push(&mut self, command: &SinkCommand) {
        self.0
            .borrow_mut()
            .commands
            .push((CollectorChannel::Queue, command.clone()));
    }
}

#[derive(Debug)]
pub struct HeadlessHost {
    next_listener: u64,
    listeners: BTreeMap<ListenerId, Registration>,
    next_frame: u64,
    frames: BTreeSet<FrameHandle>,
    inner_height: f64,
    scroll_y: f64,
    visual_viewport: bool,
    document_root: bool,
    style: HashMap<String, String>,
    style_writes: u64,
    title: String,
    location: Location,
    current_route: Option<Route>,
    platform: PlatformProbe,
    clock_ms: f64,
    collector: Rc<RefCell<CollectorLog>>,
    native_collector: bool,
    queue_support: bool,
    shim_support: bool,
    audio: Option<Result<(), BridgeError>>,
    audio_messages: Vec<String>,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    /// A desktop-like host at `http://localhost/` with a visual viewport,
    /// a document root, and a collector queue but no collector function.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_listener: 1,
            listeners: BTreeMap::new(),
            next_frame: 1,
            frames: BTreeSet::new(),
            inner_height: 768.0,
            scroll_y: 0.0,
            visual_viewport: true,
            document_root: true,
            style: HashMap::new(),
            style_writes: 0,
            title: String::new(),
            location: Location {
                href: "http://localhost/".to_owned(),
                origin: "http://localhost".to_owned(),
                pathname: "/".to_owned(),
                search: String::new(),
            },
            current_route: None,
            platform: PlatformProbe::new("Mozilla/5.0 (X11; Linux x86_64)", "Linux x86_64", false),
            clock_ms: 0.0,
            collector: Rc::new(RefCell::new(CollectorLog::default())),
            native_collector: false,
            queue_support: true,
            shim_support: true,
            audio: None,
            audio_messages: Vec::new(),
        }
    }

    // -- builders ---------------------------------------------------------

    #[must_use]
    pub fn with_inner_height(mut self, height: f64) -> Self {
        self.inner_height = height;
        self
    }

    #[must_use]
    pub fn with_scroll_y(mut self, scroll_y: f64) -> Self {
        self.scroll_y = scroll_y;
        self
    }

    #[must_use]
    pub fn with_visual_viewport(mut self, available: bool) -> Self {
        self.visual_viewport = available;
        self
    }

    #[must_use]
    pub fn with_document_root(mut self, present: bool) -> Self {
        self.document_root = present;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: PlatformProbe) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_clock_ms(mut self, now_ms: f64) -> Self {
        self.clock_ms = now_ms;
        self
    }

    /// The collector script has already defined its reporting function.
    #[must_use]
    pub fn with_collector_function(mut self) -> Self {
        self.native_collector = true;
        self
    }

    /// Whether the host can create the collector queue.
    #[must_use]
    pub fn with_queue_support(mut self, supported: bool) -> Self {
        self.queue_support = supported;
        self
    }

    /// Whether the host can define a stand-in reporting function.
    #[must_use]
    pub fn with_shim_support(mut self, supported: bool) -> Self {
        self.shim_support = supported;
        self
    }

    /// Install an audio-session bridge that answers with `result`.
    #[must_use]
    pub fn with_audio_bridge(mut self, result: Result<(), BridgeError>) -> Self {
        self.audio = Some(result);
        self
    }

    // -- environment mutation ---------------------------------------------

    pub fn set_inner_height(&mut self, height: f64) {
        self.inner_height = height;
    }

    pub fn set_scroll_y(&mut self, scroll_y: f64) {
        self.scroll_y = scroll_y;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Move the router and location to `route`, resolved against the
    /// current origin.
    pub fn navigate(&mut self, route: Route) {
        let next = Url::parse(&self.location.origin)
            .and_then(|base| base.join(route.full_path()))
            .and_then(|url| Location::from_url(url.as_str()));
        if let Ok(location) = next {
            self.location = location;
        }
        self.current_route = Some(route);
    }

    // -- delivery ---------------------------------------------------------

    /// Deliver `event` to every live listener registered for
    /// `(target, event.kind())`, in registration order.
    pub fn fire(
        &mut self,
        session: &mut Session,
        target: EventTarget,
        event: HostEvent,
    ) -> EventDisposition {
        let mut disposition = EventDisposition::Proceed;
        for id in self.listeners_for(target, event.kind()) {
            let Some(registration) = self.listeners.get(&id).copied() else {
                continue;
            };
            let verdict = session.dispatch(self, id, &event);
            if verdict.prevents_default() && registration.options.passive {
                tracing::warn!(
                    target: "pagefit.headless",
                    id = id.get(),
                    event = event.kind().host_name(),
                    "preventDefault inside passive listener ignored"
                );
                continue;
            }
            disposition = disposition.merge(verdict);
        }
        disposition
    }

    /// Run every frame pending right now. Frames requested while running
    /// wait for the next call. Returns how many frames a session claimed.
    pub fn run_frames(&mut self, session: &mut Session) -> usize {
        let due: Vec<FrameHandle> = self.frames.iter().copied().collect();
        let mut claimed = 0;
        for handle in due {
            if !self.frames.remove(&handle) {
                continue;
            }
            if session.on_frame(self, handle) {
                claimed += 1;
            }
        }
        claimed
    }

    /// Remove and return every pending frame, for driving a single adapter.
    pub fn take_pending_frames(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.frames).into_iter().collect()
    }

    // -- inspection -------------------------------------------------------

    #[must_use]
    pub fn active_listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Live listener ids for `(target, kind)`, in registration order.
    #[must_use]
    pub fn listeners_for(&self, target: EventTarget, kind: EventKind) -> Vec<ListenerId> {
        self.listeners
            .iter()
            .filter(|(_, r)| r.target == target && r.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Options of the first live listener for `(target, kind)`.
    #[must_use]
    pub fn listener_options(&self, target: EventTarget, kind: EventKind) -> Option<ListenOptions> {
        self.listeners
            .values()
            .find(|r| r.target == target && r.kind == kind)
            .map(|r| r.options)
    }

    #[must_use]
    pub fn pending_frame_count(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn style_property(&self, name: &str) -> Option<&str> {
        self.style.get(name).map(String::as_str)
    }

    /// Number of root style writes performed.
    #[must_use]
    pub const fn style_writes(&self) -> u64 {
        self.style_writes
    }

    #[must_use]
    pub fn command_queue_created(&self) -> bool {
        self.collector.borrow().queue_created
    }

    #[must_use]
    pub fn collector_shim_installed(&self) -> bool {
        self.collector.borrow().shim_installed
    }

    /// Loader script URLs with their bootstrap commands, in load order.
    #[must_use]
    pub fn loaded_collectors(&self) -> Vec<(String, Vec<SinkCommand>)> {
        self.collector.borrow().loaded.clone()
    }

    /// Every command the collector received, in order.
    #[must_use]
    pub fn collector_commands(&self) -> Vec<SinkCommand> {
        self.collector
            .borrow()
            .commands
            .iter()
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }

    /// Every command with the channel it arrived on.
    #[must_use]
    pub fn collector_deliveries(&self) -> Vec<(CollectorChannel, SinkCommand)> {
        self.collector.borrow().commands.clone()
    }

    /// Page-view events received, in order.
    #[must_use]
    pub fn page_views(&self) -> Vec<PageView> {
        self.collector
            .borrow()
            .commands
            .iter()
            .filter_map(|(_, cmd)| match cmd {
                SinkCommand::Event { name, params } if name == PAGE_VIEW_EVENT => {
                    Some(params.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn audio_messages(&self) -> &[String] {
        &self.audio_messages
    }
}

impl Host for HeadlessHost {
    fn add_listener(
        &mut self,
        target: EventTarget,
        kind: EventKind,
        options: ListenOptions,
    ) -> ListenerId {
        let id = ListenerId::new(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(
            id,
            Registration {
                target,
                kind,
                options,
            },
        );
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle::new(self.next_frame);
        self.next_frame += 1;
        self.frames.insert(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.frames.remove(&handle);
    }

    fn inner_height(&self) -> f64 {
        self.inner_height
    }

    fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    fn has_visual_viewport(&self) -> bool {
        self.visual_viewport
    }

    fn set_root_style_property(&mut self, name: &str, value: &str) -> bool {
        if !self.document_root {
            return false;
        }
        self.style.insert(name.to_owned(), value.to_owned());
        self.style_writes += 1;
        true
    }

    fn document_title(&self) -> String {
        self.title.clone()
    }

    fn location(&self) -> Location {
        self.location.clone()
    }

    fn current_route(&self) -> Option<Route> {
        self.current_route.clone()
    }

    fn platform_probe(&self) -> PlatformProbe {
        self.platform.clone()
    }
}

impl CollectorHost for HeadlessHost {
    fn command_queue(&mut self) -> Option<Box<dyn CommandQueue>> {
        if !self.queue_support {
            return None;
        }
        self.collector.borrow_mut().queue_created = true;
        Some(Box::new(RecordingQueue(Rc::clone(&self.collector))))
    }

    fn collector_function(&mut self) -> Option<CollectorFn> {
        let log = Rc::clone(&self.collector);
        if self.native_collector {
            return Some(Box::new(move |cmd: &SinkCommand| {
                log.borrow_mut()
                    .commands
                    .push((CollectorChannel::Function, cmd.clone()));
            }));
        }
        if self.collector.borrow().shim_installed {
            // The shim only forwards onto the queue.
            return Some(Box::new(move |cmd: &SinkCommand| {
                log.borrow_mut()
                    .commands
                    .push((CollectorChannel::Queue, cmd.clone()));
            }));
        }
        None
    }

    fn install_collector_shim(&mut self) -> bool {
        if !self.shim_support {
            return false;
        }
        let mut log = self.collector.borrow_mut();
        if !log.queue_created {
            return false;
        }
        log.shim_installed = true;
        true
    }

    fn load_collector(&mut self, script_url: &str, bootstrap: &[SinkCommand]) {
        self.collector
            .borrow_mut()
            .loaded
            .push((script_url.to_owned(), bootstrap.to_vec()));
    }

    fn now_ms(&self) -> f64 {
        self.clock_ms
    }
}

impl AudioBridge for HeadlessHost {
    fn post_audio_session_message(&mut self, message: &str) -> Option<Result<(), BridgeError>> {
        let result = self.audio.clone()?;
        self.audio_messages.push(message.to_owned());
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_listener_ids_are_not_reused() {
        let mut host = HeadlessHost::new();
        let a = host.add_listener(EventTarget::Window, EventKind::Resize, ListenOptions::PASSIVE);
        host.remove_listener(a);
        let b = host.add_listener(EventTarget::Window, EventKind::Resize, ListenOptions::PASSIVE);
        assert_ne!(a, b);
        assert_eq!(host.listeners_for(EventTarget::Window, EventKind::Resize), vec![b]);
    }

    #[test]
    fn cancelled_frame_is_not_pending() {
        let mut host = HeadlessHost::new();
        let f = host.request_frame();
        host.cancel_frame(f);
        host.cancel_frame(f);
        assert_eq!(host.pending_frame_count(), 0);
    }

    #[test]
    fn navigate_updates_location_and_route() {
        let mut host = HeadlessHost::new();
        host.navigate(Route::new("/blog?page=3"));
        assert_eq!(host.location().href, "http://localhost/blog?page=3");
        assert_eq!(host.location().search, "?page=3");
        assert_eq!(host.current_route(), Some(Route::new("/blog?page=3")));
    }

    #[test]
    fn shim_requires_queue() {
        let mut host = HeadlessHost::new();
        assert!(!host.install_collector_shim());
        assert!(host.collector_function().is_none());
        let _ = host.command_queue();
        assert!(host.install_collector_shim());
        assert!(host.collector_function().is_some());
    }

    #[test]
    fn shim_forwards_onto_queue() {
        let mut host = HeadlessHost::new();
        let _ = host.command_queue();
        host.install_collector_shim();
        let mut report = host.collector_function().unwrap();
        report(&SinkCommand::Js { timestamp_ms: 1.0 });
        assert_eq!(
            host.collector_deliveries(),
            vec![(CollectorChannel::Queue, SinkCommand::Js { timestamp_ms: 1.0 })]
        );
    }

    #[test]
    fn audio_without_bridge_records_nothing() {
        let mut host = HeadlessHost::new();
        assert!(host.post_audio_session_message("mixWithOthers").is_none());
        assert!(host.audio_messages().is_empty());
    }
}
