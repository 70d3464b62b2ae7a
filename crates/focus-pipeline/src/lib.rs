//! focus-pipeline: coalesced, URL-enriched focus observation.
//!
//! Raw [`FocusEvent`]s from a native source flow through three stages:
//!
//! 1. [`Coalescer`]: trailing-edge rate limiting with at most one processing
//!    call in flight; bursts collapse to their most recent event.
//! 2. [`TabResolver`]: for known Chromium-family and Safari-family browsers,
//!    the active tab URL is queried through a bounded subprocess.
//! 3. The consumer installed with [`ObservationService::initialize`] receives an
//!    [`EnrichedFocusEvent`].
//!
//! [`ObservationService`] owns the lifecycle (`start`, `stop`, `status`) and is
//! configured through [`PipelineCfg`].

pub mod browser;
mod coalescer;
pub mod config;
mod error;
pub mod resolver;
mod service;

pub use coalescer::{Coalescer, ProcessFn, ProcessFuture};
pub use config::{PipelineCfg, ResolverCfg};
pub use error::{Error, Result};
pub use focus_watcher::FocusEvent;
pub use resolver::{OsaScript, RunError, ScriptRunner, TabResolver};
pub use service::{Consumer, EnrichedFocusEvent, Lifecycle, ObservationService};

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn enriched_event_serializes_flat() {
        let ev = EnrichedFocusEvent {
            event: FocusEvent::new("com.google.Chrome").with_attr("pid", 42),
            url: Some("https://www.rust-lang.org/".into()),
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({
                "app_id": "com.google.Chrome",
                "pid": 42,
                "url": "https://www.rust-lang.org/",
            })
        );
    }

    #[test]
    fn unresolved_url_serializes_as_null() {
        let ev = EnrichedFocusEvent {
            event: FocusEvent::new("com.apple.finder"),
            url: None,
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({"app_id": "com.apple.finder", "url": null})
        );
    }

    #[test]
    fn resolved_url_replaces_source_url_attribute() {
        let ev = EnrichedFocusEvent {
            event: FocusEvent::new("com.apple.Safari")
                .with_attr("url", "https://stale.example/")
                .with_attr("title", "Docs"),
            url: Some("https://webkit.org/".into()),
        };
        let text = serde_json::to_string(&ev).unwrap();
        assert_eq!(text.matches("\"url\"").count(), 1, "{text}");
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({
                "app_id": "com.apple.Safari",
                "title": "Docs",
                "url": "https://webkit.org/",
            })
        );
    }
}
