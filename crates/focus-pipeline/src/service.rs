//! Observation service: native source -> coalescer -> tab resolver -> consumer.

use std::{
    result::Result as StdResult,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use focus_watcher::{self as watcher, EventSink, FocusEvent, SourceAdapter};
use parking_lot::Mutex;
use serde::{Serialize, Serializer, ser::SerializeMap};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::{Result, coalescer::Coalescer, config::PipelineCfg, resolver::TabResolver};

/// Serialized key carrying the resolved URL.
const URL_KEY: &str = "url";

/// A focus event with the active tab URL resolved (when applicable).
///
/// Serializes flat: the event's fields plus `url` (`null` when unresolved).
/// A source attribute named `url` is replaced by the resolved value.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedFocusEvent {
    /// The raw event as reported by the source.
    pub event: FocusEvent,
    /// Active tab URL for supported browsers, if it could be resolved.
    pub url: Option<String>,
}

impl Serialize for EnrichedFocusEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> StdResult<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("app_id", self.event.app_id())?;
        for (k, v) in self.event.attrs() {
            if k != URL_KEY {
                map.serialize_entry(k, v)?;
            }
        }
        map.serialize_entry(URL_KEY, &self.url)?;
        map.end()
    }
}

/// Consumer callback for enriched events. Invoked serially, never concurrently.
pub type Consumer = Arc<dyn Fn(EnrichedFocusEvent) + Send + Sync>;

/// Service lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not observing (initial and terminal state).
    Stopped,
    /// Registered with the native source and delivering events.
    Running,
}

/// State shared with the native sink and the enrichment step.
struct Shared {
    /// Current coalescer; replaced on every `initialize`.
    coalescer: Mutex<Option<Coalescer>>,
    /// Bumped on `initialize` and `stop`; results from older generations are dropped.
    generation: AtomicU64,
    /// Mirrors `Lifecycle::Running` for lock-free checks off the service thread.
    running: AtomicBool,
}

impl Shared {
    /// Hand a raw event to the current coalescer.
    fn forward(&self, event: FocusEvent) {
        match self.coalescer.lock().as_ref() {
            Some(c) => c.schedule(event),
            None => trace!(app_id = event.app_id(), "no coalescer; event dropped"),
        }
    }

    /// True if work started under `generation` may still deliver.
    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }
}

/// Resolve the tab URL for `event` and deliver it unless the service moved on.
async fn enrich(
    resolver: TabResolver,
    consumer: Consumer,
    shared: Weak<Shared>,
    generation: u64,
    event: FocusEvent,
) -> Result<()> {
    let url = resolver.resolve_active_tab_url(event.app_id()).await;
    let Some(shared) = shared.upgrade() else {
        return Ok(());
    };
    if !shared.is_current(generation) {
        debug!(app_id = event.app_id(), "discarding enrichment from stopped generation");
        return Ok(());
    }
    debug!(app_id = event.app_id(), url = ?url, "delivering focus event");
    consumer(EnrichedFocusEvent { event, url });
    Ok(())
}

/// Lifecycle-managed focus observation pipeline.
///
/// The host application constructs and owns one instance. Typical use:
///
/// ```no_run
/// # async fn run() -> focus_pipeline::Result<()> {
/// use focus_pipeline::{ObservationService, PipelineCfg};
///
/// let service = ObservationService::from_cfg(&PipelineCfg::default());
/// service.initialize(|ev| println!("{} {:?}", ev.event.app_id(), ev.url))?;
/// if service.start() {
///     // ... later
///     service.stop();
/// }
/// # Ok(())
/// # }
/// ```
pub struct ObservationService {
    /// Native source lifecycle.
    adapter: SourceAdapter,
    /// Tab URL enrichment.
    resolver: TabResolver,
    /// Coalescing delay for new coalescers.
    delay: Duration,
    /// Current lifecycle state; also serializes `start`/`stop`.
    lifecycle: Mutex<Lifecycle>,
    /// State reachable from the native sink.
    shared: Arc<Shared>,
}

impl ObservationService {
    /// Compose a service from its parts. Starts in [`Lifecycle::Stopped`].
    pub fn new(adapter: SourceAdapter, resolver: TabResolver, delay: Duration) -> Self {
        Self {
            adapter,
            resolver,
            delay,
            lifecycle: Mutex::new(Lifecycle::Stopped),
            shared: Arc::new(Shared {
                coalescer: Mutex::new(None),
                generation: AtomicU64::new(0),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Service over the platform native source and the `osascript` resolver.
    pub fn from_cfg(cfg: &PipelineCfg) -> Self {
        Self::new(
            SourceAdapter::platform(cfg.poll_interval()),
            TabResolver::from_cfg(&cfg.resolver),
            cfg.coalesce_delay(),
        )
    }

    /// Install `consumer` and a fresh coalescer.
    ///
    /// May be called repeatedly, including while running; any event pending in
    /// the previous coalescer is discarded. Fails with [`crate::Error::Runtime`]
    /// outside a Tokio runtime, leaving the previous consumer in place.
    pub fn initialize<F>(&self, consumer: F) -> Result<()>
    where
        F: Fn(EnrichedFocusEvent) + Send + Sync + 'static,
    {
        let consumer: Consumer = Arc::new(consumer);
        let resolver = self.resolver.clone();
        let weak = Arc::downgrade(&self.shared);
        let coalescer = Coalescer::spawn(self.delay, move |event| {
            // Capture the generation when processing starts, not when it ends.
            let generation = weak
                .upgrade()
                .map(|s| s.generation.load(Ordering::Acquire))
                .unwrap_or_default();
            enrich(
                resolver.clone(),
                consumer.clone(),
                weak.clone(),
                generation,
                event,
            )
        })?;
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        // Dropping the previous coalescer stops its actor and cancels its work.
        let _previous = self.shared.coalescer.lock().replace(coalescer);
        info!("focus observation initialized");
        Ok(())
    }

    /// Install a consumer that forwards enriched events into a channel.
    pub fn initialize_channel(&self) -> Result<mpsc::UnboundedReceiver<EnrichedFocusEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.initialize(move |ev| {
            let _ = tx.send(ev);
        })?;
        Ok(rx)
    }

    /// Start observing. Returns true if running afterwards.
    ///
    /// Already running: no-op, true. Source unavailable or registration
    /// refused: false, state unchanged.
    pub fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if *lifecycle == Lifecycle::Running {
            info!("focus events already running");
            return true;
        }
        if let Err(e) = self.adapter.load() {
            warn!("focus source not available: {}", e);
            return false;
        }
        let weak = Arc::downgrade(&self.shared);
        let sink: EventSink = Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.forward(event);
            }
        });
        match self.adapter.start(sink) {
            Ok(registration) => {
                self.shared.running.store(true, Ordering::Release);
                *lifecycle = Lifecycle::Running;
                info!(?registration, "focus events started");
                true
            }
            Err(e) => {
                error!("Failed to start focus events: {}", e);
                false
            }
        }
    }

    /// Stop observing. Returns true if stopped afterwards.
    ///
    /// Already stopped: no-op, true. On success the coalescer is cleared and any
    /// enrichment still in flight is discarded.
    pub fn stop(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if *lifecycle == Lifecycle::Stopped {
            info!("focus events not running");
            return true;
        }
        match self.adapter.stop() {
            Ok(_) => {
                self.shared.running.store(false, Ordering::Release);
                self.shared.generation.fetch_add(1, Ordering::AcqRel);
                if let Some(c) = self.shared.coalescer.lock().as_ref() {
                    c.clear();
                }
                *lifecycle = Lifecycle::Stopped;
                info!("focus events stopped");
                true
            }
            Err(watcher::Error::NotLoaded) => {
                warn!("focus source not available");
                false
            }
            Err(e) => {
                error!("Failed to stop focus events: {}", e);
                false
            }
        }
    }

    /// True while running.
    pub fn status(&self) -> bool {
        self.state() == Lifecycle::Running
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }
}

impl Drop for ObservationService {
    fn drop(&mut self) {
        if self.status() {
            self.stop();
        }
    }
}
