#![forbid(unsafe_code)]

//! `wasm-bindgen` exports for the PageFit runtime.
//!
//! Only compiled on `wasm32` targets.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Reflect;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use pagefit_core::{
    AudioHintOutcome, EventTarget, HostEvent, Route, SessionPhase, enable_mix_with_others,
};
use tracing_subscriber::layer::SubscriberExt;

use crate::js_args::config_from_json;
use crate::web_host::Runtime;

fn console_call(method: &str, msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(func) = Reflect::get(&console, &method.into()) else {
        return;
    };
    let Ok(func) = func.dyn_into::<js_sys::Function>() else {
        return;
    };
    let _ = func.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_call("error", &msg);
        }));
    });
}

/// Forwards WARN and ERROR events to the browser console.
struct ConsoleLayer;

struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ConsoleLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);
        let meta = event.metadata();
        let mut line = format!("[{}] {}", meta.target(), visitor.message);
        if !visitor.fields.is_empty() {
            line.push_str(": ");
            line.push_str(&visitor.fields.join(" "));
        }
        let method = if *meta.level() == tracing::Level::ERROR {
            "error"
        } else {
            "warn"
        };
        console_call(method, &line);
    }
}

fn install_console_logging() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::filter::LevelFilter::WARN)
            .with(ConsoleLayer);
        // The embedder may already have installed a subscriber; keep theirs.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Client-side PageFit runtime.
///
/// Host-driven: the framework calls `attach()` once and forwards its
/// lifecycle hooks; DOM events and animation frames are handled internally.
#[wasm_bindgen]
pub struct PageFitRuntime {
    inner: Rc<RefCell<Runtime>>,
}

#[wasm_bindgen(start)]
pub fn wasm_start() {
    install_panic_hook();
    install_console_logging();
}

impl PageFitRuntime {
    fn with<R>(&self, f: impl FnOnce(&mut Runtime) -> R) -> Option<R> {
        match self.inner.try_borrow_mut() {
            Ok(mut rt) => Some(f(&mut rt)),
            Err(_) => {
                console_call("warn", "pagefit: runtime call ignored while busy");
                None
            }
        }
    }

    fn hook(&self, target: EventTarget, event: HostEvent, route: Option<Route>) {
        self.with(|rt| {
            rt.set_route(route);
            let _ = rt.fire_hook(target, &event);
        });
    }
}

#[wasm_bindgen]
impl PageFitRuntime {
    /// Create a runtime from the public runtime config.
    ///
    /// Accepts a config object, its JSON text, or nothing for the inert
    /// default.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<PageFitRuntime, JsError> {
        install_panic_hook();
        let raw = if config.is_undefined() || config.is_null() {
            None
        } else if let Some(text) = config.as_string() {
            Some(text)
        } else {
            js_sys::JSON::stringify(&config)
                .ok()
                .and_then(|s| s.as_string())
        };
        let config = config_from_json(raw.as_deref()).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Self {
            inner: Runtime::shared(config),
        })
    }

    /// Attach every adapter. Later calls are ignored.
    pub fn attach(&self) {
        self.with(Runtime::attach);
    }

    #[wasm_bindgen(js_name = appMounted)]
    pub fn app_mounted(&self, path: Option<String>) {
        self.hook(EventTarget::App, HostEvent::AppMounted, path.map(Route::new));
    }

    #[wasm_bindgen(js_name = pageFinish)]
    pub fn page_finish(&self, path: Option<String>) {
        let route = path.map(Route::new);
        self.hook(
            EventTarget::App,
            HostEvent::PageFinish {
                route: route.clone(),
            },
            route,
        );
    }

    #[wasm_bindgen(js_name = afterNavigate)]
    pub fn after_navigate(&self, path: String) {
        let route = Route::new(path);
        self.hook(
            EventTarget::Router,
            HostEvent::AfterNavigate {
                route: route.clone(),
            },
            Some(route),
        );
    }

    #[wasm_bindgen(js_name = beforeUnmount)]
    pub fn before_unmount(&self) {
        self.hook(EventTarget::App, HostEvent::BeforeUnmount, None);
    }

    /// Ask the iOS app shell to mix page audio with other apps.
    ///
    /// Returns whether the hint was delivered.
    #[wasm_bindgen(js_name = enableMixWithOthers)]
    pub fn enable_mix_with_others(&self) -> bool {
        self.with(|rt| enable_mix_with_others(&mut rt.host)) == Some(AudioHintOutcome::Delivered)
    }

    /// `"detached"`, `"attached"`, `"torn-down"`, or `"busy"` while a
    /// callback holds the runtime.
    pub fn phase(&self) -> String {
        let Ok(rt) = self.inner.try_borrow() else {
            return "busy".to_owned();
        };
        match rt.session.phase() {
            SessionPhase::Detached => "detached",
            SessionPhase::Attached => "attached",
            SessionPhase::TornDown => "torn-down",
        }
        .to_owned()
    }

    #[wasm_bindgen(js_name = trackingEnabled)]
    pub fn tracking_enabled(&self) -> bool {
        self.inner
            .try_borrow()
            .is_ok_and(|rt| rt.session.tracker().is_some())
    }
}
