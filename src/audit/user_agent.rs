//! User-agent classification.
//!
//! Classification is an ordered list of `(predicate, classification)` rules
//! evaluated first-match-wins. Order matters because most engines embed each
//! other's tokens: every Chromium browser says `Safari/`, Edge and Opera also
//! say `Chrome/`. Chrome is checked first and its predicate excludes the
//! Edge and Opera tokens. This is best-effort and will misclassify browsers
//! that do not follow these conventions.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BrowserFamily {
    Chrome,
    Safari,
    Edge,
    Firefox,
    Opera,
    InternetExplorer,
    Unknown,
}

impl BrowserFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chrome => "Chrome",
            Self::Safari => "Safari",
            Self::Edge => "Edge",
            Self::Firefox => "Firefox",
            Self::Opera => "Opera",
            Self::InternetExplorer => "Internet Explorer",
            Self::Unknown => UNKNOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Android,
    Ios,
    ChromeOs,
    MacOs,
    Linux,
    Unknown,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Android => "Android",
            Self::Ios => "iOS",
            Self::ChromeOs => "ChromeOS",
            Self::MacOs => "macOS",
            Self::Linux => "Linux",
            Self::Unknown => UNKNOWN,
        }
    }
}

/// Classified browser and platform for one user agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser: BrowserFamily,
    pub browser_version: String,
    pub platform: Platform,
}

struct BrowserRule {
    family: BrowserFamily,
    predicate: fn(&str) -> bool,
    version: Regex,
}

struct PlatformRule {
    platform: Platform,
    predicate: fn(&str) -> bool,
}

fn version_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid version pattern {pattern}: {e}"))
}

static BROWSER_RULES: LazyLock<Vec<BrowserRule>> = LazyLock::new(|| {
    vec![
        BrowserRule {
            family: BrowserFamily::Chrome,
            predicate: |ua| {
                (ua.contains("Chrome/") || ua.contains("CriOS/"))
                    && !ua.contains("Edg")
                    && !ua.contains("OPR/")
            },
            version: version_pattern(r"(?:Chrome|CriOS)/([\d.]+)"),
        },
        BrowserRule {
            family: BrowserFamily::Safari,
            predicate: |ua| {
                ua.contains("Safari/")
                    && !ua.contains("Chrome/")
                    && !ua.contains("Chromium/")
                    && !ua.contains("CriOS/")
                    && !ua.contains("FxiOS/")
                    && !ua.contains("Edg")
                    && !ua.contains("OPR/")
            },
            version: version_pattern(r"Version/([\d.]+)"),
        },
        BrowserRule {
            family: BrowserFamily::Edge,
            predicate: |ua| ua.contains("Edg"),
            version: version_pattern(r"Edg(?:e|A|iOS)?/([\d.]+)"),
        },
        BrowserRule {
            family: BrowserFamily::Firefox,
            predicate: |ua| ua.contains("Firefox/") || ua.contains("FxiOS/"),
            version: version_pattern(r"(?:Firefox|FxiOS)/([\d.]+)"),
        },
        BrowserRule {
            family: BrowserFamily::Opera,
            predicate: |ua| ua.contains("OPR/") || ua.contains("Opera"),
            version: version_pattern(r"(?:OPR|Opera)[/ ]([\d.]+)"),
        },
        BrowserRule {
            family: BrowserFamily::InternetExplorer,
            predicate: |ua| ua.contains("MSIE ") || ua.contains("Trident/"),
            version: version_pattern(r"(?:MSIE |rv:)([\d.]+)"),
        },
    ]
});

// Android before Linux, iOS before macOS: both embed the later token.
const PLATFORM_RULES: &[PlatformRule] = &[
    PlatformRule {
        platform: Platform::Windows,
        predicate: |ua| ua.contains("Windows"),
    },
    PlatformRule {
        platform: Platform::Android,
        predicate: |ua| ua.contains("Android"),
    },
    PlatformRule {
        platform: Platform::Ios,
        predicate: |ua| ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod"),
    },
    PlatformRule {
        platform: Platform::ChromeOs,
        predicate: |ua| ua.contains("CrOS"),
    },
    PlatformRule {
        platform: Platform::MacOs,
        predicate: |ua| ua.contains("Macintosh") || ua.contains("Mac OS X"),
    },
    PlatformRule {
        platform: Platform::Linux,
        predicate: |ua| ua.contains("Linux") || ua.contains("X11"),
    },
];

/// Classify a user agent string.
pub fn classify(user_agent: &str) -> UserAgentInfo {
    let (browser, browser_version) = BROWSER_RULES
        .iter()
        .find(|rule| (rule.predicate)(user_agent))
        .map(|rule| {
            let version = rule
                .version
                .captures(user_agent)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| UNKNOWN.to_string());
            (rule.family, version)
        })
        .unwrap_or((BrowserFamily::Unknown, UNKNOWN.to_string()));

    let platform = PLATFORM_RULES
        .iter()
        .find(|rule| (rule.predicate)(user_agent))
        .map(|rule| rule.platform)
        .unwrap_or(Platform::Unknown);

    UserAgentInfo {
        browser,
        browser_version,
        platform,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const EDGE_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
    const OPERA_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 OPR/105.0.0.0";
    const SAFARI_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
    const CHROME_ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.144 Mobile Safari/537.36";
    const FIREFOX_LINUX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const FIREFOX_IOS: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) FxiOS/120.0 Mobile/15E148 Safari/605.1.15";
    const IE11: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64; Trident/7.0; rv:11.0) like Gecko";

    #[test]
    fn chrome_is_not_mistaken_for_safari() {
        let info = classify(CHROME_WIN);
        assert_eq!(info.browser, BrowserFamily::Chrome);
        assert_eq!(info.browser_version, "120.0.0.0");
        assert_eq!(info.platform, Platform::Windows);
    }

    #[test]
    fn chromium_derivatives_keep_their_own_family() {
        let edge = classify(EDGE_WIN);
        assert_eq!(edge.browser, BrowserFamily::Edge);
        assert_eq!(edge.browser_version, "120.0.2210.91");

        let opera = classify(OPERA_WIN);
        assert_eq!(opera.browser, BrowserFamily::Opera);
        assert_eq!(opera.browser_version, "105.0.0.0");
    }

    #[test]
    fn safari_versions_come_from_version_token() {
        let mac = classify(SAFARI_MAC);
        assert_eq!(mac.browser, BrowserFamily::Safari);
        assert_eq!(mac.browser_version, "17.1");
        assert_eq!(mac.platform, Platform::MacOs);

        let iphone = classify(SAFARI_IPHONE);
        assert_eq!(iphone.browser, BrowserFamily::Safari);
        assert_eq!(iphone.platform, Platform::Ios);
    }

    #[test]
    fn mobile_platforms_win_over_desktop_tokens() {
        let android = classify(CHROME_ANDROID);
        assert_eq!(android.browser, BrowserFamily::Chrome);
        assert_eq!(android.platform, Platform::Android);

        let fx_ios = classify(FIREFOX_IOS);
        assert_eq!(fx_ios.browser, BrowserFamily::Firefox);
        assert_eq!(fx_ios.browser_version, "120.0");
        assert_eq!(fx_ios.platform, Platform::Ios);
    }

    #[test]
    fn firefox_and_legacy_ie() {
        let fx = classify(FIREFOX_LINUX);
        assert_eq!(fx.browser, BrowserFamily::Firefox);
        assert_eq!(fx.browser_version, "121.0");
        assert_eq!(fx.platform, Platform::Linux);

        let ie = classify(IE11);
        assert_eq!(ie.browser, BrowserFamily::InternetExplorer);
        assert_eq!(ie.browser_version, "11.0");
    }

    #[test]
    fn novel_agents_fall_back_to_unknown() {
        let info = classify("curl/8.4.0");
        assert_eq!(info.browser, BrowserFamily::Unknown);
        assert_eq!(info.browser_version, UNKNOWN);
        assert_eq!(info.platform, Platform::Unknown);
        assert_eq!(info.platform.as_str(), "Unknown");
    }
}
