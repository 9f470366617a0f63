#![forbid(unsafe_code)]

//! Core: host-driven runtime adapters for the PageFit content site.
//!
//! # Role in PageFit
//! `pagefit-core` owns the three small behaviors the site needs inside the
//! browser session, written against an injected [`Host`] instead of the
//! window/document singletons:
//!
//! - **[`ViewportSync`]**: republishes the visible viewport height as a CSS
//!   custom property, coalesced to one write per rendering frame.
//! - **[`TouchGuard`]**: cancels the native pull-to-refresh overscroll on
//!   touch-capable Apple devices without touching multi-touch gestures.
//! - **[`NavTracker`]**: reports exactly one page view per distinct path,
//!   whichever of the three navigation signals arrives first.
//!
//! [`Session`] composes them, routes host events by listener id and fired
//! frames by handle, and tears everything down on the host's unmount signal.
//!
//! # How it fits in the system
//! `pagefit-web` implements [`Host`] over `web-sys` and exports the session to
//! the hosting framework. [`HeadlessHost`] implements the same traits in
//! memory so every behavior here is deterministic under test.

pub mod analytics;
pub mod audio;
pub mod config;
pub mod error;
pub mod headless;
pub mod host;
pub mod listeners;
pub mod nav_tracker;
pub mod platform;
pub mod route;
pub mod schedule;
pub mod session;
pub mod touch_guard;
pub mod viewport;

pub use analytics::{
    AnalyticsSink, BufferedSink, CollectorFn, CommandQueue, ConfigParams, DirectSink, PageView,
    SinkCommand, SinkKind,
};
pub use audio::{AudioBridge, AudioHintOutcome, enable_mix_with_others};
pub use config::PageFitConfig;
pub use error::{BridgeError, ConfigError};
pub use headless::{CollectorChannel, HeadlessHost};
pub use host::{
    CollectorHost, EventDisposition, EventKind, EventTarget, FrameHandle, Host, HostEvent,
    ListenOptions, ListenerId, SiteHost, TouchSample,
};
pub use nav_tracker::NavTracker;
pub use platform::PlatformProbe;
pub use route::{Location, PageTarget, Route};
pub use schedule::ScheduledTask;
pub use session::{Session, SessionPhase};
pub use touch_guard::{GesturePhase, TouchGuard, TouchState};
pub use viewport::ViewportSync;
