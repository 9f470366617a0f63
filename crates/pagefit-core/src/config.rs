#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! The hosting framework hands the session its public runtime config. Only the
//! collector id is required to enable page-view tracking; everything else has
//! a default matching the site's stylesheets.
//!
//! ```toml
//! collector_id = "G-ABC123"
//! viewport_property = "--app-viewport-height"
//! overscroll_guard = true
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_VIEWPORT_PROPERTY: &str = "--app-viewport-height";
pub const DEFAULT_COLLECTOR_LOADER_URL: &str = "https://www.googletagmanager.com/gtag/js";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFitConfig {
    /// Analytics collector id. Absent or blank disables tracking entirely.
    pub collector_id: Option<String>,
    /// Loader script for the collector; `?id=<collector_id>` is appended.
    pub collector_loader_url: String,
    /// CSS custom property that receives the viewport height.
    pub viewport_property: String,
    /// Whether to suppress pull-to-refresh on touch Apple devices.
    pub overscroll_guard: bool,
}

impl Default for PageFitConfig {
    fn default() -> Self {
        Self {
            collector_id: None,
            collector_loader_url: DEFAULT_COLLECTOR_LOADER_URL.to_owned(),
            viewport_property: DEFAULT_VIEWPORT_PROPERTY.to_owned(),
            overscroll_guard: true,
        }
    }
}

impl PageFitConfig {
    /// Default config with tracking enabled for `collector_id`.
    pub fn with_collector(collector_id: impl Into<String>) -> Self {
        Self {
            collector_id: Some(collector_id.into()),
            ..Self::default()
        }
    }

    /// Load and validate from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Load and validate from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// The collector id, with blank values treated as absent.
    #[must_use]
    pub fn collector_id(&self) -> Option<&str> {
        self.collector_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn tracking_enabled(&self) -> bool {
        self.collector_id().is_some()
    }

    /// Full loader script URL for the configured collector.
    #[must_use]
    pub fn collector_script_url(&self) -> Option<String> {
        self.collector_id()
            .map(|id| format!("{}?id={id}", self.collector_loader_url))
    }

    /// Validate all parameters. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.viewport_property.starts_with("--") || self.viewport_property.len() <= 2 {
            errors.push(format!(
                "viewport_property must be a CSS custom property (`--name`), got `{}`",
                self.viewport_property
            ));
        }

        if self.tracking_enabled() && self.collector_loader_url.trim().is_empty() {
            errors.push("collector_loader_url must be set when collector_id is set".into());
        }

        errors
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}
