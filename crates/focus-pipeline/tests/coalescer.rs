use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use focus_pipeline::{Coalescer, Error, FocusEvent, Result};
use parking_lot::Mutex;
use tokio::time::{Instant, sleep};

const DELAY: Duration = Duration::from_millis(200);

fn ev(name: &str) -> FocusEvent {
    FocusEvent::new(name)
}

/// Decrements the in-flight counter even when the call is cancelled.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Processing step that records invocations and overlap.
#[derive(Default)]
struct Recorder {
    /// App ids in the order processing started.
    started: Mutex<Vec<String>>,
    /// App ids whose processing ran to completion.
    completed: Mutex<Vec<String>>,
    inflight: AtomicUsize,
    peak: AtomicUsize,
    /// Simulated processing time.
    work: Duration,
}

impl Recorder {
    fn new(work: Duration) -> Arc<Self> {
        Arc::new(Self {
            work,
            ..Self::default()
        })
    }

    fn coalescer(self: &Arc<Self>, delay: Duration) -> Coalescer {
        let rec = self.clone();
        Coalescer::spawn(delay, move |event| {
            let rec = rec.clone();
            async move { rec.process(event).await }
        })
        .expect("inside a runtime")
    }

    async fn process(&self, event: FocusEvent) -> Result<()> {
        let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.inflight);
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.started.lock().push(event.app_id().to_string());
        match event.app_id() {
            "fail" => return Err(Error::Process("simulated failure".into())),
            "boom" => panic!("simulated panic"),
            _ => {}
        }
        sleep(self.work).await;
        self.completed.lock().push(event.app_id().to_string());
        Ok(())
    }

    fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[tokio::test(start_paused = true)]
async fn burst_delivers_only_latest_event() {
    let rec = Recorder::new(Duration::ZERO);
    let c = rec.coalescer(DELAY);
    for name in ["a", "b", "c", "d", "e"] {
        c.schedule(ev(name));
        sleep(Duration::from_millis(10)).await;
    }
    sleep(Duration::from_millis(150)).await;
    assert!(rec.started().is_empty(), "nothing before the delay elapses");

    sleep(Duration::from_millis(500)).await;
    assert_eq!(rec.started(), vec!["e"]);
    assert_eq!(rec.completed(), vec!["e"]);
}

#[tokio::test(start_paused = true)]
async fn arrivals_during_processing_collapse_to_one_call() {
    let rec = Recorder::new(Duration::from_millis(500));
    let c = rec.coalescer(DELAY);

    c.schedule(ev("a"));
    sleep(Duration::from_millis(300)).await;
    assert_eq!(rec.started(), vec!["a"]);

    c.schedule(ev("b"));
    sleep(Duration::from_millis(50)).await;
    c.schedule(ev("c"));

    sleep(Duration::from_secs(2)).await;
    assert_eq!(rec.started(), vec!["a", "c"]);
    assert_eq!(rec.completed(), vec!["a", "c"]);
    assert_eq!(rec.peak(), 1);
}

#[tokio::test(start_paused = true)]
async fn spaced_events_are_each_processed() {
    let rec = Recorder::new(Duration::from_millis(10));
    let c = rec.coalescer(DELAY);
    for name in ["a", "b", "c"] {
        c.schedule(ev(name));
        sleep(Duration::from_millis(400)).await;
    }
    assert_eq!(rec.completed(), vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn clear_before_timer_processes_nothing() {
    let rec = Recorder::new(Duration::ZERO);
    let c = rec.coalescer(DELAY);
    c.clear();
    c.schedule(ev("a"));
    sleep(Duration::from_millis(50)).await;
    c.clear();
    sleep(Duration::from_secs(1)).await;
    assert!(rec.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failures_and_panics_do_not_wedge_the_coalescer() {
    let rec = Recorder::new(Duration::ZERO);
    let c = rec.coalescer(DELAY);
    for name in ["fail", "boom", "ok"] {
        c.schedule(ev(name));
        sleep(Duration::from_millis(300)).await;
    }
    assert_eq!(rec.started(), vec!["fail", "boom", "ok"]);
    assert_eq!(rec.completed(), vec!["ok"]);
    assert_eq!(rec.inflight.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn clear_cancels_in_flight_processing() {
    let rec = Recorder::new(Duration::from_secs(1));
    let c = rec.coalescer(DELAY);

    c.schedule(ev("a"));
    sleep(Duration::from_millis(300)).await;
    assert_eq!(rec.started(), vec!["a"]);

    c.clear();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(rec.inflight.load(Ordering::SeqCst), 0);

    c.schedule(ev("b"));
    sleep(Duration::from_secs(3)).await;
    assert_eq!(rec.started(), vec!["a", "b"]);
    assert_eq!(rec.completed(), vec!["b"]);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_discards_pending_work() {
    let rec = Recorder::new(Duration::ZERO);
    let c = rec.coalescer(DELAY);
    c.schedule(ev("a"));
    drop(c);
    sleep(Duration::from_secs(1)).await;
    assert!(rec.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sustained_load_keeps_one_call_in_flight() {
    let rec = Recorder::new(Duration::from_millis(50));
    let c = rec.coalescer(DELAY);
    let total = 200;
    for i in 0..total {
        c.schedule(ev(&format!("app.{i}")));
        sleep(Duration::from_millis(3)).await;
    }
    sleep(Duration::from_secs(2)).await;

    let started = rec.started();
    assert_eq!(rec.peak(), 1);
    assert!(started.len() < total);
    assert_eq!(
        started.last().map(String::as_str),
        Some(format!("app.{}", total - 1).as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn schedule_is_callable_from_native_threads() {
    let rec = Recorder::new(Duration::from_millis(20));
    let c = Arc::new(rec.coalescer(DELAY));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let c = c.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    c.schedule(ev(&format!("thread.{t}.{i}")));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("emitter thread");
    }
    sleep(Duration::from_secs(1)).await;

    assert_eq!(rec.started().len(), 1);
    assert_eq!(rec.peak(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn continuous_flood_keeps_delivering() {
    let delay = Duration::from_millis(50);
    let rec = Recorder::new(Duration::ZERO);
    let c = Arc::new(rec.coalescer(delay));
    let stop = Arc::new(AtomicBool::new(false));
    let handles: Vec<_> = (0..3)
        .map(|t| {
            let c = c.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut i = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    c.schedule(ev(&format!("flood.{t}.{i}")));
                    i += 1;
                }
            })
        })
        .collect();

    let start = Instant::now();
    sleep(Duration::from_secs(1)).await;
    let during = rec.started().len();
    stop.store(true, Ordering::Relaxed);
    for h in handles {
        h.join().expect("flood thread");
    }

    // Roughly one delivery per delay; allow generous scheduling slack.
    let expected = (start.elapsed().as_millis() / delay.as_millis()) as usize;
    assert!(
        during >= 5,
        "only {during} deliveries during the flood, expected about {expected}"
    );
    assert_eq!(rec.peak(), 1);

    sleep(Duration::from_millis(300)).await;
    let last = rec.started().last().cloned();
    assert!(last.is_some_and(|id| id.starts_with("flood.")));
}

#[test]
fn spawn_outside_runtime_is_an_error() {
    let r = Coalescer::spawn(DELAY, |_event| async { Ok(()) });
    assert!(matches!(r, Err(Error::Runtime(_))));
}
