#![no_main]

use libfuzzer_sys::fuzz_target;
use pagefit_core::PageFitConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for parsed in [PageFitConfig::from_json_str(text), PageFitConfig::from_toml_str(text)] {
        // Anything that loads must already be valid.
        if let Ok(config) = parsed {
            assert!(config.validate().is_empty(), "loaded config failed validation");
            assert!(config.viewport_property.starts_with("--"));
            if let Some(id) = config.collector_id() {
                assert!(!id.trim().is_empty());
                assert!(config.collector_script_url().is_some());
            }
        }
    }
});
