use serde::{Deserialize, Serialize};

/// One authenticated device/browser instance, stored newest-first under
/// `sessions:<userId>`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub device: String,
    pub browser: String,
    pub location: String,
    /// Unix seconds, set at creation
    pub last_active: i64,
    /// The only field mutated after creation
    pub is_current: bool,
}

/// Best-effort description of the requesting client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device: String,
    pub browser: String,
    pub location: String,
}

const UNKNOWN_LOCATION: &str = "Unknown location";

// Order matters: Edge and Opera agents also contain "Chrome" and "Safari",
// Chrome agents also contain "Safari", iOS agents also contain "Mac OS".
const DEVICE_MARKERS: &[(&str, &str)] = &[
    ("iPhone", "iPhone"),
    ("iPad", "iPad"),
    ("Android", "Android Device"),
    ("Windows", "Windows PC"),
    ("Macintosh", "Mac"),
    ("Mac OS", "Mac"),
    ("CrOS", "Chromebook"),
    ("Linux", "Linux Desktop"),
];

const BROWSER_MARKERS: &[(&str, &str)] = &[
    ("Edg/", "Edge"),
    ("OPR/", "Opera"),
    ("Opera", "Opera"),
    ("Firefox/", "Firefox"),
    ("Chrome/", "Chrome"),
    ("Safari/", "Safari"),
];

impl DeviceInfo {
    pub fn new(device: impl Into<String>, browser: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            browser: browser.into(),
            location: location.into(),
        }
    }

    /// Derive device and browser labels from a User-Agent header
    pub fn from_user_agent(user_agent: &str) -> Self {
        let device = DEVICE_MARKERS
            .iter()
            .find(|(marker, _)| user_agent.contains(marker))
            .map(|(_, label)| *label)
            .unwrap_or("Unknown Device");

        let browser = BROWSER_MARKERS
            .iter()
            .find(|(marker, _)| user_agent.contains(marker))
            .map(|(_, label)| *label)
            .unwrap_or("Unknown Browser");

        Self::new(device, browser, UNKNOWN_LOCATION)
    }

    /// Describe the local host, for non-browser clients
    pub fn detect() -> Self {
        let device = match std::env::consts::OS {
            "linux" => "Linux Desktop",
            "macos" => "Mac",
            "windows" => "Windows PC",
            "android" => "Android Device",
            "ios" => "iPhone",
            other => other,
        };

        Self::new(device, "Console", UNKNOWN_LOCATION)
    }
}
