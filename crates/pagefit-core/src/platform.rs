#![forbid(unsafe_code)]

//! Device identification for the overscroll guard.
//!
//! The heuristic matches handheld Apple platform strings, or a `Mac`
//! user-agent on a document that exposes `ontouchend` (iPadOS reports a
//! desktop identity). Any probe the host cannot answer counts as "no".

const HANDHELD_PLATFORMS: [&str; 3] = ["iPad", "iPhone", "iPod"];

/// Raw answers to the platform probes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlatformProbe {
    /// `navigator.userAgent`.
    pub user_agent: Option<String>,
    /// `navigator.platform`.
    pub platform: Option<String>,
    /// Whether `'ontouchend' in document`.
    pub touch_end_supported: Option<bool>,
}

impl PlatformProbe {
    /// A probe where nothing could be read.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            user_agent: None,
            platform: None,
            touch_end_supported: None,
        }
    }

    #[must_use]
    pub fn new(user_agent: &str, platform: &str, touch_end_supported: bool) -> Self {
        Self {
            user_agent: Some(user_agent.to_owned()),
            platform: Some(platform.to_owned()),
            touch_end_supported: Some(touch_end_supported),
        }
    }

    /// Whether the device is a touch-capable Apple device whose browser
    /// offers pull-to-refresh at the top of the page.
    #[must_use]
    pub fn is_touch_apple_device(&self) -> bool {
        let handheld = self
            .platform
            .as_deref()
            .is_some_and(|p| HANDHELD_PLATFORMS.iter().any(|name| p.contains(name)));
        if handheld {
            return true;
        }

        let mac_agent = self.user_agent.as_deref().is_some_and(|ua| ua.contains("Mac"));
        mac_agent && self.touch_end_supported == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15";
    const MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15";
    const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36";

    #[test]
    fn iphone_platform_matches() {
        assert!(PlatformProbe::new(IPHONE_UA, "iPhone", true).is_touch_apple_device());
    }

    #[test]
    fn ipad_with_desktop_identity_matches_on_touch_probe() {
        assert!(PlatformProbe::new(MAC_UA, "MacIntel", true).is_touch_apple_device());
    }

    #[test]
    fn desktop_mac_without_touch_is_excluded() {
        assert!(!PlatformProbe::new(MAC_UA, "MacIntel", false).is_touch_apple_device());
    }

    #[test]
    fn android_is_excluded() {
        assert!(!PlatformProbe::new(ANDROID_UA, "Linux armv8l", true).is_touch_apple_device());
    }

    #[test]
    fn unavailable_probe_is_excluded() {
        assert!(!PlatformProbe::unavailable().is_touch_apple_device());
    }

    #[test]
    fn missing_touch_probe_is_treated_as_no() {
        let probe = PlatformProbe {
            user_agent: Some(MAC_UA.into()),
            platform: Some("MacIntel".into()),
            touch_end_supported: None,
        };
        assert!(!probe.is_touch_apple_device());
    }
}
