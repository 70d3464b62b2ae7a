//! CoreGraphics window-list queries.

use core_foundation::{
    base::{CFRelease, CFTypeRef, TCFType},
    dictionary::CFDictionaryRef,
    number::CFNumberRef,
    string::{CFString, CFStringRef},
};
use core_graphics::window as cgw;

/// Owner and title of the frontmost normal-layer window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FrontWindow {
    /// Owning application's display name.
    pub(crate) owner: String,
    /// Window title; empty without Screen Recording permission.
    pub(crate) title: String,
    /// Owning process id.
    pub(crate) pid: i32,
}

/// `kCFNumberSInt32Type`.
const CF_NUMBER_SINT32: isize = 9;

/// Read a string value from a CF dictionary.
unsafe fn dict_string(dict: CFDictionaryRef, key: CFStringRef) -> Option<String> {
    let value = unsafe {
        core_foundation::dictionary::CFDictionaryGetValue(dict, key as *const core::ffi::c_void)
    };
    if value.is_null() {
        return None;
    }
    // SAFETY: window-info string values follow the get rule
    let cf = unsafe { CFString::wrap_under_get_rule(value as CFStringRef) };
    Some(cf.to_string())
}

/// Read an i32 value from a CF dictionary.
unsafe fn dict_i32(dict: CFDictionaryRef, key: CFStringRef) -> Option<i32> {
    let value = unsafe {
        core_foundation::dictionary::CFDictionaryGetValue(dict, key as *const core::ffi::c_void)
    };
    if value.is_null() {
        return None;
    }
    let mut out: i32 = 0;
    let ok = unsafe {
        core_foundation::number::CFNumberGetValue(
            value as CFNumberRef,
            CF_NUMBER_SINT32,
            &mut out as *mut i32 as *mut core::ffi::c_void,
        )
    };
    if ok { Some(out) } else { None }
}

/// Query the frontmost on-screen layer-0 window using CGWindowList.
///
/// The list is ordered front to back, so the first layer-0 entry belongs to
/// the active application.
pub(crate) fn front_window() -> Option<FrontWindow> {
    unsafe {
        let options: cgw::CGWindowListOption =
            cgw::kCGWindowListOptionOnScreenOnly | cgw::kCGWindowListExcludeDesktopElements;
        let arr = cgw::CGWindowListCopyWindowInfo(options, cgw::kCGNullWindowID);
        if arr.is_null() {
            return None;
        }
        let count = core_foundation::array::CFArrayGetCount(arr);
        let mut found = None;
        for i in 0..count {
            let item = core_foundation::array::CFArrayGetValueAtIndex(arr, i);
            if item.is_null() {
                continue;
            }
            let dict = item as CFDictionaryRef;
            if let Some(layer) = dict_i32(dict, cgw::kCGWindowLayer)
                && layer != 0
            {
                continue;
            }
            let Some(pid) = dict_i32(dict, cgw::kCGWindowOwnerPID) else {
                continue;
            };
            found = Some(FrontWindow {
                owner: dict_string(dict, cgw::kCGWindowOwnerName).unwrap_or_default(),
                title: dict_string(dict, cgw::kCGWindowName).unwrap_or_default(),
                pid,
            });
            break;
        }
        CFRelease(arr as CFTypeRef);
        found
    }
}
