#![forbid(unsafe_code)]

//! Collector command arguments in the shape the browser side needs.
//!
//! The collector inspects argument types: `js` must receive a `Date`, the
//! rest are plain JSON. Conversion to actual JS values happens in the wasm
//! layer; this module decides what each argument is.

use pagefit_core::{PageFitConfig, SinkCommand};

use crate::RuntimeError;

/// One positional argument of a collector command.
#[derive(Debug, Clone, PartialEq)]
pub enum JsArg {
    /// A `Date` built from milliseconds since the epoch.
    Date(f64),
    /// Any JSON value, as serialized text.
    Json(String),
}

/// Positional arguments for `command`, verb first.
#[must_use]
pub fn command_args(command: &SinkCommand) -> Vec<JsArg> {
    if let SinkCommand::Js { timestamp_ms } = command {
        return vec![
            JsArg::Json(format!("\"{}\"", command.verb())),
            JsArg::Date(*timestamp_ms),
        ];
    }
    command
        .to_args()
        .iter()
        .map(|value| JsArg::Json(value.to_string()))
        .collect()
}

/// Parse the runtime config handed over from JavaScript.
///
/// `None` (or a JSON `null`) yields the default, inert config.
pub fn config_from_json(raw: Option<&str>) -> Result<PageFitConfig, RuntimeError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(PageFitConfig::default());
    };
    if serde_json::from_str::<serde_json::Value>(raw)?.is_null() {
        return Ok(PageFitConfig::default());
    }
    Ok(PageFitConfig::from_json_str(raw)?)
}
