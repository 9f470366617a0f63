#![forbid(unsafe_code)]

//! Host capability traits and the event vocabulary shared by every adapter.
//!
//! The adapters never touch browser globals. The embedding environment
//! implements [`Host`] (event registration, layout reads, style writes,
//! frame scheduling) and [`CollectorHost`] (analytics collector plumbing),
//! then delivers each fired event back through
//! [`Session::dispatch`](crate::Session::dispatch) together with the
//! [`ListenerId`] it handed out at registration.
//!
//! Execution is single-threaded and run-to-completion: a handler never
//! observes another handler mid-flight, so none of these types lock.

use crate::analytics::{CollectorFn, CommandQueue, SinkCommand};
use crate::audio::AudioBridge;
use crate::platform::PlatformProbe;
use crate::route::{Location, Route};

/// Opaque id for one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Opaque handle for one scheduled rendering-opportunity callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Object an event listener is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    /// The browser window.
    Window,
    /// `window.visualViewport`, when the host exposes it.
    VisualViewport,
    /// The hosting framework's application lifecycle hooks.
    App,
    /// The hosting framework's router.
    Router,
}

/// Kind of event a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Resize,
    OrientationChange,
    Focus,
    Scroll,
    TouchStart,
    TouchMove,
    AppMounted,
    PageFinish,
    AfterNavigate,
    BeforeUnmount,
}

impl EventKind {
    /// Name of the event as the host knows it (DOM event type or framework hook).
    #[must_use]
    pub const fn host_name(self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::OrientationChange => "orientationchange",
            Self::Focus => "focus",
            Self::Scroll => "scroll",
            Self::TouchStart => "touchstart",
            Self::TouchMove => "touchmove",
            Self::AppMounted => "app:mounted",
            Self::PageFinish => "page:finish",
            Self::AfterNavigate => "router:afterEach",
            Self::BeforeUnmount => "app:beforeUnmount",
        }
    }
}

/// Registration options forwarded to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenOptions {
    /// A passive listener promises never to cancel the event.
    pub passive: bool,
}

impl ListenOptions {
    pub const PASSIVE: Self = Self { passive: true };
    pub const ACTIVE: Self = Self { passive: false };
}

/// The parts of a touch event the overscroll guard reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchSample {
    /// Number of touch points currently on the surface.
    pub touch_count: usize,
    /// Vertical client coordinate of the first touch point.
    pub client_y: f64,
    /// Whether the host still allows the default action to be cancelled.
    pub cancelable: bool,
}

impl TouchSample {
    #[must_use]
    pub const fn single(client_y: f64) -> Self {
        Self {
            touch_count: 1,
            client_y,
            cancelable: true,
        }
    }

    #[must_use]
    pub const fn is_single_touch(&self) -> bool {
        self.touch_count == 1
    }
}

/// One event delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Resize,
    OrientationChange,
    Focus,
    Scroll,
    TouchStart(TouchSample),
    TouchMove(TouchSample),
    /// Fired once when the application has mounted.
    AppMounted,
    /// Fired after each route's content is ready; may carry the new route.
    PageFinish { route: Option<Route> },
    /// Fired after each completed route transition.
    AfterNavigate { route: Route },
    /// Fired once before the session's UI is torn down.
    BeforeUnmount,
}

impl HostEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Resize => EventKind::Resize,
            Self::OrientationChange => EventKind::OrientationChange,
            Self::Focus => EventKind::Focus,
            Self::Scroll => EventKind::Scroll,
            Self::TouchStart(_) => EventKind::TouchStart,
            Self::TouchMove(_) => EventKind::TouchMove,
            Self::AppMounted => EventKind::AppMounted,
            Self::PageFinish { .. } => EventKind::PageFinish,
            Self::AfterNavigate { .. } => EventKind::AfterNavigate,
            Self::BeforeUnmount => EventKind::BeforeUnmount,
        }
    }
}

/// What the host should do with the event's default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDisposition {
    #[default]
    Proceed,
    PreventDefault,
}

impl EventDisposition {
    #[must_use]
    pub const fn prevents_default(self) -> bool {
        matches!(self, Self::PreventDefault)
    }

    /// Combine the verdicts of two listeners on the same event.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        if self.prevents_default() || other.prevents_default() {
            Self::PreventDefault
        } else {
            Self::Proceed
        }
    }
}

/// Window/document capabilities the adapters depend on.
pub trait Host {
    /// Register a listener. The host must deliver matching events through
    /// [`Session::dispatch`](crate::Session::dispatch) with the returned id
    /// until [`remove_listener`](Self::remove_listener) is called.
    fn add_listener(
        &mut self,
        target: EventTarget,
        kind: EventKind,
        options: ListenOptions,
    ) -> ListenerId;

    /// Stop delivering events for `id`. Unknown ids are ignored.
    fn remove_listener(&mut self, id: ListenerId);

    /// Schedule a callback for the next rendering opportunity.
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancel a scheduled callback. Already fired or unknown handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// `window.innerHeight` in CSS pixels.
    fn inner_height(&self) -> f64;

    /// Vertical scroll offset of the page in CSS pixels.
    fn scroll_y(&self) -> f64;

    /// Whether a visual-viewport object is available for listening.
    fn has_visual_viewport(&self) -> bool;

    /// Set a style property on the document root element.
    ///
    /// Returns `false` when the host has no document root.
    fn set_root_style_property(&mut self, name: &str, value: &str) -> bool;

    /// Current `document.title`.
    fn document_title(&self) -> String;

    /// Current `window.location`.
    fn location(&self) -> Location;

    /// The router's current route, if the host has a router.
    fn current_route(&self) -> Option<Route>;

    /// Device identification used to gate the overscroll guard.
    fn platform_probe(&self) -> PlatformProbe;
}

/// Plumbing for the asynchronously loaded analytics collector.
pub trait CollectorHost {
    /// Ensure the collector's buffered command queue exists and return a
    /// handle that appends to it, or `None` if the host cannot provide one.
    fn command_queue(&mut self) -> Option<Box<dyn CommandQueue>>;

    /// The collector's direct reporting function, if one is defined.
    fn collector_function(&mut self) -> Option<CollectorFn>;

    /// Define a stand-in reporting function that forwards its arguments onto
    /// the command queue. Returns `false` if the host cannot define one.
    fn install_collector_shim(&mut self) -> bool;

    /// Inject the collector loader script and its bootstrap commands.
    fn load_collector(&mut self, script_url: &str, bootstrap: &[SinkCommand]);

    /// Wall-clock time in milliseconds since the epoch, for the loader's
    /// `js` command.
    fn now_ms(&self) -> f64;
}

/// Everything a [`Session`](crate::Session) needs from its host.
pub trait SiteHost: Host + CollectorHost + AudioBridge {}

impl<T: Host + CollectorHost + AudioBridge + ?Sized> SiteHost for T {}
