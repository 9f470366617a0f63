#![cfg(target_arch = "wasm32")]
#![forbid(unsafe_code)]

use pagefit_web::PageFitRuntime;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::wasm_bindgen_test;

fn root_style(name: &str) -> Option<String> {
    let root = web_sys::window()?
        .document()?
        .document_element()?
        .dyn_into::<web_sys::HtmlElement>()
        .ok()?;
    root.style().get_property_value(name).ok()
}

fn runtime(config: JsValue) -> PageFitRuntime {
    PageFitRuntime::new(config).unwrap_or_else(|_| panic!("config rejected"))
}

#[wasm_bindgen_test]
fn runtime_lifecycle_phases() {
    let runtime = runtime(JsValue::UNDEFINED);
    assert_eq!(runtime.phase(), "detached");
    runtime.attach();
    assert_eq!(runtime.phase(), "attached");
    runtime.attach();
    assert_eq!(runtime.phase(), "attached");
    runtime.before_unmount();
    assert_eq!(runtime.phase(), "torn-down");
}

#[wasm_bindgen_test]
fn blank_collector_disables_tracking() {
    let runtime = runtime(JsValue::from_str(r#"{"collector_id":"  "}"#));
    runtime.attach();
    assert!(!runtime.tracking_enabled());
    runtime.app_mounted(Some("/".into()));
    runtime.before_unmount();
}

#[wasm_bindgen_test]
fn invalid_config_is_rejected() {
    let result = PageFitRuntime::new(JsValue::from_str(r#"{"viewport_property":"height"}"#));
    assert!(result.is_err());
}

#[wasm_bindgen_test]
fn attach_publishes_viewport_height_when_document_exists() {
    let runtime = runtime(JsValue::from_str(r#"{"viewport_property":"--pagefit-test-vh"}"#));
    runtime.attach();
    if let Some(value) = root_style("--pagefit-test-vh") {
        assert!(value.ends_with("px"), "unexpected value {value}");
    }
    runtime.before_unmount();
}

#[wasm_bindgen_test]
fn audio_hint_without_app_shell_is_not_delivered() {
    let runtime = runtime(JsValue::NULL);
    assert!(!runtime.enable_mix_with_others());
}
