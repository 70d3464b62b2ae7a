//! Trailing-edge coalescing of bursty focus events.
//!
//! A [`Coalescer`] turns an unbounded push stream into a rate-limited stream
//! with at most one processing call in flight, always carrying the most recent
//! event forward. Intermediate events are dropped, not queued.
//!
//! Producers write into a single-slot mailbox: `schedule` overwrites the
//! slot and `clear` empties it, both under a short lock, then wake the actor.
//! The actor task owns the rest of the state:
//! - `deadline`: the armed delivery timer, if any
//! - `in_flight`: the processing call currently running, if any
//!
//! A flood of `schedule` calls therefore costs one slot write each and never
//! grows a queue, and the actor checks the timer before the mailbox so a
//! continuous flood cannot starve deliveries.

use std::{future::Future, mem, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use focus_watcher::FocusEvent;
use futures::{FutureExt, future::BoxFuture};
use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    sync::{Notify, mpsc},
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use crate::{Error, Result};

/// Boxed processing future.
pub type ProcessFuture = BoxFuture<'static, Result<()>>;

/// Processing step invoked with each coalesced event.
pub type ProcessFn = Arc<dyn Fn(FocusEvent) -> ProcessFuture + Send + Sync>;

/// Producer-side state of the mailbox.
#[derive(Default)]
struct Slot {
    /// Latest unprocessed event.
    pending: Option<FocusEvent>,
    /// A `clear` has not yet been applied by the actor.
    cleared: bool,
    /// The handle was dropped.
    closed: bool,
}

/// Single-slot hand-off between producers and the actor.
#[derive(Default)]
struct Mailbox {
    /// Slot contents.
    slot: Mutex<Slot>,
    /// Wakes the actor after a slot change.
    wake: Notify,
}

impl Mailbox {
    /// Overwrite the pending event.
    fn put(&self, event: FocusEvent) {
        if let Some(prev) = self.slot.lock().pending.replace(event) {
            trace!(app_id = prev.app_id(), "coalesce_superseded");
        }
        self.wake.notify_one();
    }

    /// Empty the slot and ask the actor to cancel its work.
    fn clear(&self) {
        {
            let mut slot = self.slot.lock();
            slot.pending = None;
            slot.cleared = true;
        }
        self.wake.notify_one();
    }

    /// Mark the mailbox closed and wake the actor so it can exit.
    fn close(&self) {
        {
            let mut slot = self.slot.lock();
            slot.pending = None;
            slot.closed = true;
        }
        self.wake.notify_one();
    }

    /// Take the pending event.
    fn take(&self) -> Option<FocusEvent> {
        self.slot.lock().pending.take()
    }

    /// Whether an event is waiting.
    fn has_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    /// Consume an outstanding clear request; returns `(cleared, closed)`.
    fn take_flags(&self) -> (bool, bool) {
        let mut slot = self.slot.lock();
        (mem::take(&mut slot.cleared), slot.closed)
    }
}

/// How a processing call ended.
enum Outcome {
    /// The processing future returned `Ok`.
    Completed,
    /// The processing future returned an error.
    Failed(Error),
    /// The processing future panicked.
    Panicked(String),
    /// The call was cancelled by `clear`.
    Cancelled,
}

/// Completion report from a processing task.
struct Done {
    /// Cycle the report belongs to.
    cycle: u64,
    /// Result of the call.
    outcome: Outcome,
}

/// Record of the processing call currently running.
struct InFlight {
    /// Cycle number assigned when the call started.
    cycle: u64,
    /// Cancels the call.
    token: CancellationToken,
}

/// Actor-owned coalescing state.
struct Slots {
    /// Shared single-slot mailbox.
    mailbox: Arc<Mailbox>,
    /// When the armed timer fires.
    deadline: Option<Instant>,
    /// Processing call in progress.
    in_flight: Option<InFlight>,
    /// Monotonic counter of started processing calls.
    cycle: u64,
    /// Minimum spacing before a delivery.
    delay: Duration,
}

impl Slots {
    /// Idle state over `mailbox`.
    fn new(mailbox: Arc<Mailbox>, delay: Duration) -> Self {
        Self {
            mailbox,
            deadline: None,
            in_flight: None,
            cycle: 0,
            delay,
        }
    }

    /// Arm the timer unless one is already armed.
    fn arm(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.delay);
            trace!(delay_ms = self.delay.as_millis() as u64, "coalesce_armed");
        }
    }

    /// Drop the timer and cancel in-flight work.
    fn reset(&mut self) {
        self.deadline = None;
        if let Some(f) = self.in_flight.take() {
            f.token.cancel();
            trace!(cycle = f.cycle, "coalesce_cancel_in_flight");
        }
    }

    /// Apply mailbox changes. Returns false once the mailbox is closed.
    fn sync(&mut self) -> bool {
        let (cleared, closed) = self.mailbox.take_flags();
        if cleared || closed {
            self.reset();
        }
        if closed {
            return false;
        }
        if self.mailbox.has_pending() {
            self.arm();
        }
        true
    }

    /// Timer elapsed: start processing, or re-arm if busy.
    fn fire(&mut self, process: &ProcessFn, done_tx: &mpsc::UnboundedSender<Done>) {
        self.deadline = None;
        // An unapplied clear voids this deadline; a newer event waits a full delay.
        let (cleared, _) = self.mailbox.take_flags();
        if cleared {
            self.reset();
            if self.mailbox.has_pending() {
                self.arm();
            }
            return;
        }
        if self.in_flight.is_some() {
            if self.mailbox.has_pending() {
                trace!("coalesce_busy_rearm");
                self.arm();
            }
            return;
        }
        let Some(event) = self.mailbox.take() else {
            return;
        };
        self.cycle += 1;
        let cycle = self.cycle;
        let token = CancellationToken::new();
        self.in_flight = Some(InFlight {
            cycle,
            token: token.clone(),
        });
        trace!(cycle, app_id = event.app_id(), "coalesce_process");
        spawn_process(process.clone(), event, cycle, token, done_tx.clone());
    }

    /// A processing call reported back.
    fn finish(&mut self, done: Done) {
        let current = self.in_flight.as_ref().map(|f| f.cycle);
        if current != Some(done.cycle) {
            trace!(cycle = done.cycle, "coalesce_stale_completion");
            return;
        }
        self.in_flight = None;
        match done.outcome {
            Outcome::Completed => trace!(cycle = done.cycle, "coalesce_done"),
            Outcome::Cancelled => trace!(cycle = done.cycle, "coalesce_cancelled"),
            Outcome::Failed(e) => error!("Error processing coalesced event: {}", e),
            Outcome::Panicked(msg) => error!("Panic processing coalesced event: {}", msg),
        }
        if self.mailbox.has_pending() {
            self.arm();
        }
    }
}

/// Run one processing call on its own task, catching errors and panics.
fn spawn_process(
    process: ProcessFn,
    event: FocusEvent,
    cycle: u64,
    token: CancellationToken,
    done_tx: mpsc::UnboundedSender<Done>,
) {
    tokio::spawn(async move {
        let call = AssertUnwindSafe(async move { process(event).await }).catch_unwind();
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Outcome::Cancelled,
            r = call => match r {
                Ok(Ok(())) => Outcome::Completed,
                Ok(Err(e)) => Outcome::Failed(e),
                Err(p) => Outcome::Panicked(
                    p.downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| p.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string()),
                ),
            },
        };
        let _ = done_tx.send(Done { cycle, outcome });
    });
}

/// Actor loop: timer first, then completions, then mailbox wake-ups.
async fn run_actor(mailbox: Arc<Mailbox>, delay: Duration, process: ProcessFn) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Done>();
    let mut st = Slots::new(mailbox.clone(), delay);
    loop {
        let deadline = st.deadline;
        tokio::select! {
            biased;
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                st.fire(&process, &done_tx);
            }
            Some(done) = done_rx.recv() => st.finish(done),
            () = mailbox.wake.notified() => {
                if !st.sync() {
                    break;
                }
            }
        }
    }
    trace!("coalescer actor exiting");
}

/// Handle to a coalescing actor.
///
/// Dropping the handle stops the actor and cancels any in-flight processing.
pub struct Coalescer {
    /// Single-slot mailbox shared with the actor.
    mailbox: Arc<Mailbox>,
    /// Configured delivery delay.
    delay: Duration,
}

impl Coalescer {
    /// Spawn a coalescer that calls `process` at most once per `delay`, one call at a time.
    ///
    /// Fails when called outside a Tokio runtime. A returned error or a panic
    /// inside `process` is logged and counts as a completed call.
    pub fn spawn<F, Fut>(delay: Duration, process: F) -> Result<Self>
    where
        F: Fn(FocusEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = Handle::try_current()?;
        let process: ProcessFn = Arc::new(move |event| process(event).boxed());
        let mailbox = Arc::new(Mailbox::default());
        handle.spawn(run_actor(mailbox.clone(), delay, process));
        Ok(Self { mailbox, delay })
    }

    /// Make `event` the pending event, arming the delivery timer if none is armed.
    ///
    /// Never blocks on processing; safe to call from any thread.
    pub fn schedule(&self, event: FocusEvent) {
        self.mailbox.put(event);
    }

    /// Cancel the timer, drop the pending event, and cancel in-flight processing.
    pub fn clear(&self) {
        self.mailbox.clear();
    }

    /// Configured delivery delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for Coalescer {
    fn drop(&mut self) {
        self.mailbox.close();
    }
}
