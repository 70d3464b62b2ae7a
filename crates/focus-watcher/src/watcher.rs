//! Polling focus source for macOS built on the CoreGraphics window list.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{Error, EventSink, FocusEvent, NativeSource, cg, ns};

/// Running poll thread and its stop flag.
struct PollThread {
    /// Set to request the thread to exit.
    stop: Arc<AtomicBool>,
    /// Join handle for the poll loop.
    handle: JoinHandle<()>,
}

/// Focus source that samples the CoreGraphics window list on a background thread.
///
/// An event is emitted whenever the frontmost application (pid) or its window
/// title changes. The sink runs on the poll thread.
pub(crate) struct CgFocusSource {
    /// Sampling interval.
    poll: Duration,
    /// Active poll thread, if started.
    thread: Mutex<Option<PollThread>>,
}

impl CgFocusSource {
    /// Source that samples every `poll`; nothing runs until `start`.
    pub(crate) fn new(poll: Duration) -> Self {
        Self {
            poll,
            thread: Mutex::new(None),
        }
    }
}

/// Last observed frontmost state, used to suppress duplicate events.
#[derive(Default, PartialEq, Eq)]
struct Seen {
    /// Frontmost process id; -1 before the first sample.
    pid: i32,
    /// Frontmost window title.
    title: String,
}

/// Sample the frontmost window until `stop` is set, emitting on change.
fn poll_loop(sink: EventSink, stop: Arc<AtomicBool>, poll: Duration) {
    let mut last = Seen {
        pid: -1,
        title: String::new(),
    };
    let mut warned_no_bundle = false;
    debug!("focus poll thread started");
    while !stop.load(Ordering::Acquire) {
        if let Some(w) = cg::front_window() {
            let now = Seen {
                pid: w.pid,
                title: w.title.clone(),
            };
            if now != last {
                match ns::bundle_id_for_pid(w.pid) {
                    Some(bid) => {
                        sink(
                            FocusEvent::new(bid)
                                .with_attr("pid", w.pid)
                                .with_attr("app_name", w.owner)
                                .with_attr("title", w.title),
                        );
                        warned_no_bundle = false;
                    }
                    None if !warned_no_bundle => {
                        debug!("no bundle identifier for '{}' (pid {})", w.owner, w.pid);
                        warned_no_bundle = true;
                    }
                    None => {}
                }
                last = now;
            }
        }
        thread::sleep(poll);
    }
    debug!("focus poll thread exiting");
}

impl NativeSource for CgFocusSource {
    fn start(&self, sink: EventSink) -> Result<(), Error> {
        let mut guard = self.thread.lock();
        if guard.is_some() {
            return Ok(());
        }
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let poll = self.poll;
        let handle = thread::Builder::new()
            .name("focus-poll".into())
            .spawn(move || poll_loop(sink, stop_thread, poll))
            .map_err(|e| Error::Register(e.to_string()))?;
        *guard = Some(PollThread { stop, handle });
        Ok(())
    }

    fn stop(&self) -> Result<(), Error> {
        let Some(t) = self.thread.lock().take() else {
            return Ok(());
        };
        t.stop.store(true, Ordering::Release);
        if t.handle.join().is_err() {
            warn!("focus poll thread panicked");
            return Err(Error::Deregister("poll thread panicked".into()));
        }
        Ok(())
    }
}
