//! Known browser bundle identifiers and their tab URL query scripts.
//!
//! Classification is by exact match against fixed lists; there is no prefix
//! or pattern matching, so an unknown Chromium fork is simply unsupported.

/// Chromium-based browsers that answer the "active tab of front window" query.
pub const CHROME_FAMILY: &[&str] = &[
    "com.google.Chrome",
    "com.google.Chrome.beta",
    "com.google.Chrome.dev",
    "com.google.Chrome.canary",
    "com.brave.Browser",
    "com.brave.Browser.beta",
    "com.brave.Browser.nightly",
    "com.microsoft.edgemac",
    "com.microsoft.edgemac.Beta",
    "com.microsoft.edgemac.Dev",
    "com.microsoft.edgemac.Canary",
    "com.mighty.app",
    "com.ghostbrowser.gb1",
    "com.bookry.wavebox",
    "com.pushplaylabs.sidekick",
    "com.operasoftware.Opera",
    "com.operasoftware.OperaNext",
    "com.operasoftware.OperaDeveloper",
    "com.operasoftware.OperaGX",
    "com.vivaldi.Vivaldi",
    "company.thebrowser.Browser",
];

/// Safari variants that answer the "front document" query.
pub const SAFARI_FAMILY: &[&str] = &[
    "com.apple.Safari",
    "com.apple.SafariTechnologyPreview",
    "com.apple.Safari.canary",
];

/// Scripting dialect a browser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    /// Chromium-based: URL of the active tab of the front window.
    Chrome,
    /// Safari: URL of the front document.
    Safari,
}

impl BrowserFamily {
    /// Build the AppleScript query for `app_id` in this family's dialect.
    pub fn query_script(self, app_id: &str) -> String {
        match self {
            Self::Chrome => {
                format!("tell app id \"{app_id}\" to get the URL of active tab of front window")
            }
            Self::Safari => format!("tell app id \"{app_id}\" to get URL of front document"),
        }
    }
}

/// Classify `app_id` as a known browser family.
pub fn classify(app_id: &str) -> Option<BrowserFamily> {
    if CHROME_FAMILY.contains(&app_id) {
        Some(BrowserFamily::Chrome)
    } else if SAFARI_FAMILY.contains(&app_id) {
        Some(BrowserFamily::Safari)
    } else {
        None
    }
}

/// True if `app_id` is a browser whose tab URL can be queried.
pub fn is_supported_browser(app_id: &str) -> bool {
    classify(app_id).is_some()
}

/// Tab URL query for `app_id`, or `None` for unsupported applications.
pub fn query_script(app_id: &str) -> Option<String> {
    classify(app_id).map(|f| f.query_script(app_id))
}
