//! focus-watcher: native focus-observation sources behind a small lifecycle adapter.
//!
//! The crate exposes three layers:
//! - [`FocusEvent`]: an application identifier plus opaque platform attributes.
//! - [`NativeSource`]: a push-style capability with `start(sink)` / `stop()`.
//!   Sinks may be invoked from any thread and at any rate.
//! - [`SourceAdapter`]: loads the capability once, caches the handle, and makes
//!   redundant `start`/`stop` calls harmless.
//!
//! On macOS, [`SourceAdapter::platform`] loads a source that polls the
//! CoreGraphics window list for the frontmost application and resolves its
//! bundle identifier through `NSRunningApplication`. On other platforms the
//! platform loader reports the capability as unavailable.
//!
//! [`test_support::ManualSource`] is an in-process source for tests and demos.

#[cfg(target_os = "macos")]
mod cg;
mod event;
#[cfg(target_os = "macos")]
mod ns;
mod source;
pub mod test_support;
#[cfg(target_os = "macos")]
mod watcher;

use std::{sync::Arc, time::Duration};

pub use event::FocusEvent;
pub use source::{
    Deregistration, EventSink, NativeSource, Registration, SourceAdapter, SourceLoader,
};
use thiserror::Error;

/// Errors from focus sources and the source adapter.
#[derive(Debug, Error)]
pub enum Error {
    /// The native capability could not be acquired.
    #[error("focus source unavailable: {0}")]
    Unavailable(String),
    /// The native source refused the sink.
    #[error("failed to register focus sink: {0}")]
    Register(String),
    /// The native source failed to release the sink.
    #[error("failed to deregister focus sink: {0}")]
    Deregister(String),
    /// `start`/`stop` was called before a successful `load`.
    #[error("focus source not loaded")]
    NotLoaded,
}

/// Load the platform's native focus source.
///
/// `poll` is the sampling interval for sources that poll.
#[cfg(target_os = "macos")]
pub fn load_platform_source(poll: Duration) -> Result<Arc<dyn NativeSource>, Error> {
    Ok(Arc::new(watcher::CgFocusSource::new(poll)))
}

/// Load the platform's native focus source.
///
/// Always unavailable on this platform.
#[cfg(not(target_os = "macos"))]
pub fn load_platform_source(_poll: Duration) -> Result<Arc<dyn NativeSource>, Error> {
    Err(Error::Unavailable(format!(
        "no native focus source for {}",
        std::env::consts::OS
    )))
}
