#![forbid(unsafe_code)]

//! `web-sys` implementation of the PageFit host traits.
//!
//! DOM listeners are `gloo` [`EventListener`]s and frames are `gloo`
//! [`AnimationFrame`]s, both keyed by the id handed to the session, so
//! removing an id from its map detaches or cancels it. Callbacks reach the
//! session through a weak reference to the shared [`Runtime`]; a callback
//! that fires while the runtime is already borrowed is dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use gloo::events::{EventListener, EventListenerOptions, EventListenerPhase};
use gloo::render::{AnimationFrame, request_animation_frame};
use js_sys::{Array, Function, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Event, HtmlElement, HtmlScriptElement, TouchEvent, Window};

use pagefit_core::{
    AudioBridge, BridgeError, CollectorFn, CollectorHost, CommandQueue, EventDisposition,
    EventKind, EventTarget, FrameHandle, Host, HostEvent, ListenOptions, ListenerId, Location,
    PageFitConfig, PlatformProbe, Route, Session, SinkCommand, TouchSample,
};

use crate::hooks::HookRegistry;
use crate::js_args::{JsArg, command_args};

const COMMAND_QUEUE: &str = "dataLayer";
const COLLECTOR_FUNCTION: &str = "gtag";
const AUDIO_BRIDGE: &str = "audioSession";
/// Body of both the collector shim and the queue pusher. The collector only
/// accepts `arguments` objects, not arrays.
const PUSH_ARGUMENTS: &str = "window.dataLayer.push(arguments);";

pub(crate) struct Runtime {
    pub(crate) session: Session,
    pub(crate) host: WebHost,
}

impl Runtime {
    pub(crate) fn shared(config: PageFitConfig) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|weak| {
            RefCell::new(Self {
                session: Session::new(config),
                host: WebHost::new(weak.clone()),
            })
        })
    }

    pub(crate) fn attach(&mut self) {
        let Self { session, host } = self;
        session.attach(host);
    }

    /// Record the router's current route, when the framework reports one.
    pub(crate) fn set_route(&mut self, route: Option<Route>) {
        if route.is_some() {
            self.host.current_route = route;
        }
    }

    /// Deliver a framework hook to every listener registered for it.
    pub(crate) fn fire_hook(&mut self, target: EventTarget, event: &HostEvent) -> EventDisposition {
        let mut disposition = EventDisposition::Proceed;
        for id in self.host.hooks.ids_for(target, event.kind()) {
            if !self.host.hooks.contains(id) {
                continue;
            }
            disposition = disposition.merge(self.deliver(id, event));
        }
        disposition
    }

    fn deliver(&mut self, id: ListenerId, event: &HostEvent) -> EventDisposition {
        let Self { session, host } = self;
        session.dispatch(host, id, event)
    }

    fn run_frame(&mut self, handle: FrameHandle) {
        if self.host.frames.remove(&handle).is_none() {
            return;
        }
        let Self { session, host } = self;
        session.on_frame(host, handle);
    }
}

pub(crate) struct WebHost {
    runtime: Weak<RefCell<Runtime>>,
    window: Option<Window>,
    next_listener: u64,
    dom_listeners: HashMap<ListenerId, EventListener>,
    hooks: HookRegistry,
    next_frame: u64,
    frames: HashMap<FrameHandle, AnimationFrame>,
    current_route: Option<Route>,
    queue_pusher: Option<Function>,
}

impl WebHost {
    fn new(runtime: Weak<RefCell<Runtime>>) -> Self {
        Self {
            runtime,
            window: web_sys::window(),
            next_listener: 1,
            dom_listeners: HashMap::new(),
            hooks: HookRegistry::new(),
            next_frame: 1,
            frames: HashMap::new(),
            current_route: None,
            queue_pusher: None,
        }
    }

    fn document(&self) -> Option<Document> {
        self.window.as_ref().and_then(Window::document)
    }

    fn dom_listener(
        &self,
        target: &web_sys::EventTarget,
        id: ListenerId,
        kind: EventKind,
        options: ListenOptions,
    ) -> EventListener {
        let runtime = self.runtime.clone();
        let options = EventListenerOptions {
            phase: EventListenerPhase::Bubble,
            passive: options.passive,
        };
        EventListener::new_with_options(target, kind.host_name(), options, move |event: &Event| {
            let Some(host_event) = host_event(kind, event) else {
                return;
            };
            let Some(shared) = runtime.upgrade() else {
                return;
            };
            let Ok(mut rt) = shared.try_borrow_mut() else {
                tracing::debug!(target: "pagefit.web", event = kind.host_name(), "re-entrant event dropped");
                return;
            };
            if rt.deliver(id, &host_event).prevents_default() {
                event.prevent_default();
            }
        })
    }
}

fn host_event(kind: EventKind, event: &Event) -> Option<HostEvent> {
    match kind {
        EventKind::Resize => Some(HostEvent::Resize),
        EventKind::OrientationChange => Some(HostEvent::OrientationChange),
        EventKind::Focus => Some(HostEvent::Focus),
        EventKind::Scroll => Some(HostEvent::Scroll),
        EventKind::TouchStart => touch_sample(event).map(HostEvent::TouchStart),
        EventKind::TouchMove => touch_sample(event).map(HostEvent::TouchMove),
        _ => None,
    }
}

fn touch_sample(event: &Event) -> Option<TouchSample> {
    let touch = event.dyn_ref::<TouchEvent>()?;
    let touches = touch.touches();
    let client_y = touches.get(0).map_or(0.0, |t| f64::from(t.client_y()));
    Some(TouchSample {
        touch_count: touches.length() as usize,
        client_y,
        cancelable: event.cancelable(),
    })
}

/// Build the positional argument list for one collector command.
fn command_array(command: &SinkCommand) -> Array {
    let args = Array::new();
    for arg in command_args(command) {
        let value = match arg {
            JsArg::Date(ms) => js_sys::Date::new(&JsValue::from_f64(ms)).into(),
            JsArg::Json(text) => js_sys::JSON::parse(&text).unwrap_or(JsValue::UNDEFINED),
        };
        args.push(&value);
    }
    args
}

fn describe_js_error(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            Reflect::get(err, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{err:?}"))
}

/// Pushes `arguments` objects onto the collector's queue.
struct ArgumentsQueue {
    pusher: Function,
}

impl CommandQueue for ArgumentsQueue {
    fn push(&mut self, command: &SinkCommand) {
        if let Err(err) = self.pusher.apply(&JsValue::NULL, &command_array(command)) {
            tracing::debug!(
                target: "pagefit.web",
                verb = command.verb(),
                error = %describe_js_error(&err),
                "queue push failed"
            );
        }
    }
}

impl Host for WebHost {
    fn add_listener(
        &mut self,
        target: EventTarget,
        kind: EventKind,
        options: ListenOptions,
    ) -> ListenerId {
        let id = ListenerId::new(self.next_listener);
        self.next_listener += 1;

        if HookRegistry::handles(target) {
            self.hooks.register(id, target, kind);
            return id;
        }

        let listener = match target {
            EventTarget::Window => self
                .window
                .as_ref()
                .map(|w| self.dom_listener(w, id, kind, options)),
            EventTarget::VisualViewport => self
                .window
                .as_ref()
                .and_then(Window::visual_viewport)
                .map(|vv| self.dom_listener(&vv, id, kind, options)),
            EventTarget::App | EventTarget::Router => None,
        };
        match listener {
            Some(listener) => {
                self.dom_listeners.insert(id, listener);
            }
            None => {
                tracing::debug!(
                    target: "pagefit.web",
                    target_object = ?target,
                    event = kind.host_name(),
                    "no DOM object to listen on"
                );
            }
        }
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        if !self.hooks.remove(id) {
            self.dom_listeners.remove(&id);
        }
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle::new(self.next_frame);
        self.next_frame += 1;
        if self.window.is_none() {
            return handle;
        }

        let runtime = self.runtime.clone();
        let frame = request_animation_frame(move |_timestamp| {
            let Some(shared) = runtime.upgrade() else {
                return;
            };
            if let Ok(mut rt) = shared.try_borrow_mut() {
                rt.run_frame(handle);
            }
        });
        self.frames.insert(handle, frame);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.frames.remove(&handle);
    }

    fn inner_height(&self) -> f64 {
        self.window
            .as_ref()
            .and_then(|w| w.inner_height().ok())
            .and_then(|h| h.as_f64())
            .unwrap_or(0.0)
    }

    fn scroll_y(&self) -> f64 {
        self.window
            .as_ref()
            .and_then(|w| w.scroll_y().ok())
            .unwrap_or(0.0)
    }

    fn has_visual_viewport(&self) -> bool {
        self.window
            .as_ref()
            .and_then(Window::visual_viewport)
            .is_some()
    }

    fn set_root_style_property(&mut self, name: &str, value: &str) -> bool {
        let Some(root) = self.document().and_then(|d| d.document_element()) else {
            return false;
        };
        let Ok(root) = root.dyn_into::<HtmlElement>() else {
            return false;
        };
        root.style().set_property(name, value).is_ok()
    }

    fn document_title(&self) -> String {
        self.document().map(|d| d.title()).unwrap_or_default()
    }

    fn location(&self) -> Location {
        let Some(loc) = self.window.as_ref().map(Window::location) else {
            return Location::default();
        };
        Location {
            href: loc.href().unwrap_or_default(),
            origin: loc.origin().unwrap_or_default(),
            pathname: loc.pathname().unwrap_or_default(),
            search: loc.search().unwrap_or_default(),
        }
    }

    fn current_route(&self) -> Option<Route> {
        self.current_route.clone()
    }

    fn platform_probe(&self) -> PlatformProbe {
        let Some(window) = self.window.as_ref() else {
            return PlatformProbe::unavailable();
        };
        let navigator = window.navigator();
        let touch_end = self
            .document()
            .and_then(|d| Reflect::has(&d, &JsValue::from_str("ontouchend")).ok())
            .unwrap_or(false);
        PlatformProbe::new(
            &navigator.user_agent().unwrap_or_default(),
            &navigator.platform().unwrap_or_default(),
            touch_end,
        )
    }
}

impl CollectorHost for WebHost {
    fn command_queue(&mut self) -> Option<Box<dyn CommandQueue>> {
        let window = self.window.as_ref()?;
        let key = JsValue::from_str(COMMAND_QUEUE);
        let exists = Reflect::get(window, &key)
            .ok()
            .is_some_and(|queue| Array::is_array(&queue));
        if !exists && !Reflect::set(window, &key, &Array::new()).unwrap_or(false) {
            return None;
        }
        let pusher = Function::new_no_args(PUSH_ARGUMENTS);
        self.queue_pusher = Some(pusher.clone());
        Some(Box::new(ArgumentsQueue { pusher }))
    }

    fn collector_function(&mut self) -> Option<CollectorFn> {
        let window = self.window.as_ref()?;
        let report = Reflect::get(window, &JsValue::from_str(COLLECTOR_FUNCTION))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        Some(Box::new(move |command: &SinkCommand| {
            if let Err(err) = report.apply(&JsValue::NULL, &command_array(command)) {
                tracing::debug!(
                    target: "pagefit.web",
                    verb = command.verb(),
                    error = %describe_js_error(&err),
                    "collector call failed"
                );
            }
        }))
    }

    fn install_collector_shim(&mut self) -> bool {
        let Some(window) = self.window.as_ref() else {
            return false;
        };
        let shim = Function::new_no_args(PUSH_ARGUMENTS);
        Reflect::set(window, &JsValue::from_str(COLLECTOR_FUNCTION), &shim).unwrap_or(false)
    }

    fn load_collector(&mut self, script_url: &str, bootstrap: &[SinkCommand]) {
        if let Some(pusher) = self.queue_pusher.clone() {
            let mut queue = ArgumentsQueue { pusher };
            for command in bootstrap {
                queue.push(command);
            }
        }

        let Some(document) = self.document() else {
            return;
        };
        let script = document
            .create_element("script")
            .ok()
            .and_then(|el| el.dyn_into::<HtmlScriptElement>().ok());
        let (Some(script), Some(head)) = (script, document.head()) else {
            tracing::debug!(target: "pagefit.web", "collector loader not injected");
            return;
        };
        script.set_async(true);
        script.set_src(script_url);
        if let Err(err) = head.append_child(&script) {
            tracing::debug!(
                target: "pagefit.web",
                error = %describe_js_error(&err),
                "collector loader not injected"
            );
        }
    }

    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

impl AudioBridge for WebHost {
    fn post_audio_session_message(&mut self, message: &str) -> Option<Result<(), BridgeError>> {
        let window: JsValue = self.window.clone()?.into();
        let handler = ["webkit", "messageHandlers", AUDIO_BRIDGE]
            .iter()
            .try_fold(window, |object, key| {
                let next = Reflect::get(&object, &JsValue::from_str(key)).ok()?;
                (!next.is_undefined() && !next.is_null()).then_some(next)
            })?;

        let post = Reflect::get(&handler, &JsValue::from_str("postMessage"))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok());
        let Some(post) = post else {
            return Some(Err(BridgeError::NotCallable(AUDIO_BRIDGE)));
        };
        Some(
            post.call1(&handler, &JsValue::from_str(message))
                .map(|_| ())
                .map_err(|err| BridgeError::Rejected {
                    bridge: AUDIO_BRIDGE,
                    message: describe_js_error(&err),
                }),
        )
    }
}
