//! AppKit lookups for running applications.

use std::ffi::CStr;

use objc2_app_kit::NSRunningApplication;

/// Bundle identifier of the running application with `pid`, if any.
///
/// Processes without a bundle (command-line tools, helpers) yield `None`.
pub(crate) fn bundle_id_for_pid(pid: i32) -> Option<String> {
    if pid <= 0 {
        return None;
    }
    unsafe {
        let app = NSRunningApplication::runningApplicationWithProcessIdentifier(pid)?;
        let bid = app.bundleIdentifier()?;
        let c = bid.UTF8String();
        if c.is_null() {
            return None;
        }
        CStr::from_ptr(c).to_str().ok().map(str::to_string)
    }
}
