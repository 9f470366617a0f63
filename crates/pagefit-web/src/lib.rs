#![forbid(unsafe_code)]

//! Browser binding for PageFit.
//!
//! [`PageFitRuntime`] is a `wasm-bindgen` export that owns a
//! [`pagefit_core::Session`] and a `web-sys` implementation of its host
//! traits. The hosting framework constructs it with its public runtime config,
//! calls `attach()` once on the client, and forwards its lifecycle hooks
//! (`appMounted`, `pageFinish`, `afterNavigate`, `beforeUnmount`). DOM events
//! and animation frames are wired internally.
//!
//! Only the wasm layer touches browser APIs; the hook registry and argument
//! shaping are plain Rust and tested natively.

use pagefit_core::ConfigError;
use thiserror::Error;

pub mod hooks;
pub mod js_args;

#[cfg(target_arch = "wasm32")]
mod wasm;
#[cfg(target_arch = "wasm32")]
mod web_host;

#[cfg(target_arch = "wasm32")]
pub use wasm::PageFitRuntime;

/// Failure to build a runtime from the config handed over by JavaScript.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime config is not JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
