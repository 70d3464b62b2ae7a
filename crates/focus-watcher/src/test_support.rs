//! In-process focus source for tests and demos.

use parking_lot::Mutex;

use crate::{Error, EventSink, FocusEvent, NativeSource};

/// Mutable state behind [`ManualSource`].
#[derive(Default)]
struct ManualState {
    /// Registered sink, if started.
    sink: Option<EventSink>,
    /// Successful `start` calls.
    starts: usize,
    /// Successful `stop` calls.
    stops: usize,
    /// When set, the next `start` fails with this message.
    fail_start: Option<String>,
}

/// A [`NativeSource`] driven by explicit [`emit`](ManualSource::emit) calls.
///
/// `emit` invokes the registered sink synchronously on the caller's thread,
/// the same way a native callback would.
#[derive(Default)]
pub struct ManualSource {
    /// Shared state.
    state: Mutex<ManualState>,
}

impl ManualSource {
    /// Create a source with no sink registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `start` call fail with `message`.
    pub fn fail_next_start(&self, message: &str) {
        self.state.lock().fail_start = Some(message.to_string());
    }

    /// Deliver `event` to the registered sink. Returns false when no sink is registered.
    pub fn emit(&self, event: FocusEvent) -> bool {
        // Clone out of the lock so a sink may call back into the source.
        let sink = self.state.lock().sink.clone();
        match sink {
            Some(sink) => {
                sink(event);
                true
            }
            None => false,
        }
    }

    /// Whether a sink is registered.
    pub fn is_started(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    /// Number of successful `start` calls.
    pub fn start_count(&self) -> usize {
        self.state.lock().starts
    }

    /// Number of successful `stop` calls.
    pub fn stop_count(&self) -> usize {
        self.state.lock().stops
    }
}

impl NativeSource for ManualSource {
    fn start(&self, sink: EventSink) -> Result<(), Error> {
        let mut st = self.state.lock();
        if let Some(msg) = st.fail_start.take() {
            return Err(Error::Register(msg));
        }
        st.sink = Some(sink);
        st.starts += 1;
        Ok(())
    }

    fn stop(&self) -> Result<(), Error> {
        let mut st = self.state.lock();
        st.sink = None;
        st.stops += 1;
        Ok(())
    }
}
