//! Native source abstraction and the lifecycle adapter around it.

use std::{sync::Arc, time::Duration};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{Error, FocusEvent};

/// Callback invoked by a native source for every focus change.
///
/// Sources may call this from their own threads, at any rate.
pub type EventSink = Arc<dyn Fn(FocusEvent) + Send + Sync>;

/// A platform capability that pushes focus changes into a sink.
///
/// Implementations perform no throttling; every change the platform reports is
/// forwarded.
pub trait NativeSource: Send + Sync {
    /// Begin delivering events to `sink`.
    fn start(&self, sink: EventSink) -> Result<(), Error>;
    /// Stop delivering events and release the sink.
    fn stop(&self) -> Result<(), Error>;
}

/// Loader used by [`SourceAdapter`] to acquire the native capability.
pub type SourceLoader = Box<dyn Fn() -> Result<Arc<dyn NativeSource>, Error> + Send + Sync>;

/// Outcome of [`SourceAdapter::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The sink was registered with the native source.
    Registered,
    /// A sink was already registered; nothing changed.
    AlreadyRunning,
}

/// Outcome of [`SourceAdapter::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deregistration {
    /// The sink was removed from the native source.
    Deregistered,
    /// No sink was registered; nothing changed.
    NotRunning,
}

/// Owns the handle to a native focus source.
///
/// `load` acquires the capability once and caches it. A failed load is
/// reported as [`Error::Unavailable`] and attempted again on the next call.
pub struct SourceAdapter {
    /// Acquisition routine for the native capability.
    loader: SourceLoader,
    /// Cached handle; immutable after the first successful load.
    handle: OnceCell<Arc<dyn NativeSource>>,
    /// True while a sink is registered with the source.
    started: Mutex<bool>,
}

impl SourceAdapter {
    /// Create an adapter around `loader`. Nothing is loaded until [`load`](Self::load).
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn NativeSource>, Error> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            handle: OnceCell::new(),
            started: Mutex::new(false),
        }
    }

    /// Create an adapter around an already constructed source.
    pub fn with_source(source: Arc<dyn NativeSource>) -> Self {
        Self::new(move || Ok(source.clone()))
    }

    /// Adapter over the platform's native focus source.
    pub fn platform(poll: Duration) -> Self {
        Self::new(move || crate::load_platform_source(poll))
    }

    /// Acquire the native capability, or return the cached handle.
    pub fn load(&self) -> Result<Arc<dyn NativeSource>, Error> {
        if let Some(h) = self.handle.get() {
            return Ok(h.clone());
        }
        let loaded = self.handle.get_or_try_init(|| {
            let src = (self.loader)()?;
            info!("native focus source loaded");
            Ok::<_, Error>(src)
        });
        match loaded {
            Ok(h) => Ok(h.clone()),
            Err(e) => {
                warn!("native focus source unavailable: {}", e);
                Err(match e {
                    Error::Unavailable(_) => e,
                    other => Error::Unavailable(other.to_string()),
                })
            }
        }
    }

    /// The cached handle, without attempting a load.
    pub fn handle(&self) -> Option<Arc<dyn NativeSource>> {
        self.handle.get().cloned()
    }

    /// Whether a sink is currently registered.
    pub fn is_started(&self) -> bool {
        *self.started.lock()
    }

    /// Register `sink` with the loaded source.
    ///
    /// Calling this while already started leaves the existing registration in
    /// place and reports [`Registration::AlreadyRunning`].
    pub fn start(&self, sink: EventSink) -> Result<Registration, Error> {
        let src = self.handle().ok_or(Error::NotLoaded)?;
        let mut started = self.started.lock();
        if *started {
            debug!("native source already started");
            return Ok(Registration::AlreadyRunning);
        }
        src.start(sink)?;
        *started = true;
        Ok(Registration::Registered)
    }

    /// Deregister the sink from the loaded source.
    pub fn stop(&self) -> Result<Deregistration, Error> {
        let src = self.handle().ok_or(Error::NotLoaded)?;
        let mut started = self.started.lock();
        if !*started {
            debug!("native source not started");
            return Ok(Deregistration::NotRunning);
        }
        src.stop()?;
        *started = false;
        Ok(Deregistration::Deregistered)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_support::ManualSource;

    fn sink() -> EventSink {
        Arc::new(|_ev| {})
    }

    #[test]
    fn load_is_cached_after_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let adapter = SourceAdapter::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ManualSource::new()) as Arc<dyn NativeSource>)
        });
        assert!(adapter.handle().is_none());
        let a = adapter.load().unwrap();
        let b = adapter.load().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_reports_unavailable_and_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let adapter = SourceAdapter::new(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(Error::Register("addon missing".into()))
            } else {
                Ok(Arc::new(ManualSource::new()) as Arc<dyn NativeSource>)
            }
        });
        match adapter.load() {
            Err(Error::Unavailable(msg)) => assert!(msg.contains("addon missing")),
            other => panic!("expected unavailable, got {:?}", other.map(|_| ())),
        }
        assert!(adapter.load().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let src = Arc::new(ManualSource::new());
        let adapter = SourceAdapter::with_source(src.clone());
        assert!(matches!(adapter.start(sink()), Err(Error::NotLoaded)));

        adapter.load().unwrap();
        assert_eq!(adapter.start(sink()).unwrap(), Registration::Registered);
        assert_eq!(adapter.start(sink()).unwrap(), Registration::AlreadyRunning);
        assert_eq!(src.start_count(), 1);

        assert_eq!(adapter.stop().unwrap(), Deregistration::Deregistered);
        assert_eq!(adapter.stop().unwrap(), Deregistration::NotRunning);
        assert_eq!(src.stop_count(), 1);
    }

    #[test]
    fn failed_registration_leaves_adapter_stopped() {
        let src = Arc::new(ManualSource::new());
        src.fail_next_start("observer rejected");
        let adapter = SourceAdapter::with_source(src.clone());
        adapter.load().unwrap();
        assert!(matches!(adapter.start(sink()), Err(Error::Register(_))));
        assert!(!adapter.is_started());
        assert_eq!(adapter.start(sink()).unwrap(), Registration::Registered);
    }
}
