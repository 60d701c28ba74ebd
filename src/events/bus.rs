//! In-process publish/subscribe hub.
//!
//! Handlers register per [`EventKind`]. `publish` snapshots the handler list under the lock,
//! releases it, then drives every handler future to completion with `join_all`. A handler
//! that returns an error or panics is logged and counted; siblings still run and the
//! publisher never sees the failure.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use log::{debug, error, warn};

use super::event::{EventKind, GameEvent};
use crate::errors::HandlerError;
use crate::metrics;

/// Subscriber callback. Identity for subscribe/unsubscribe is the `Arc` allocation.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn handle(&self, event: &GameEvent) -> Result<(), HandlerError>;
}

/// Outcome of one `publish` call, for callers that want to log or assert on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers invoked for this event
    pub invoked: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

type HandlerList = Vec<Arc<dyn EventHandler>>;

/// Owned event bus. Construct one per process and inject it where needed.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<EventKind, HandlerList>>,
    log_unhandled: bool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, publishes with no subscribers are logged at debug level.
    pub fn with_unhandled_logging(mut self, enabled: bool) -> Self {
        self.log_unhandled = enabled;
        self
    }

    // The lock is never held across handler code, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, HandlerList>> {
        self.handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `handler` for `kind`. Returns `false` if it was already registered.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> bool {
        let mut map = self.lock();
        let list = map.entry(kind).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            debug!("handler {} already subscribed to {}", handler.name(), kind);
            return false;
        }
        debug!("handler {} subscribed to {}", handler.name(), kind);
        list.push(handler);
        true
    }

    /// Remove `handler` from `kind`. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, kind: EventKind, handler: &Arc<dyn EventHandler>) -> bool {
        let mut map = self.lock();
        let Some(list) = map.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !Arc::ptr_eq(h, handler));
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(&kind);
        }
        if removed {
            debug!("handler {} unsubscribed from {}", handler.name(), kind);
        }
        removed
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Fan `event` out to every handler subscribed to its kind and wait for all of them.
    ///
    /// Accepts `None` as a no-op (logged), so call sites holding an optional event can
    /// forward it directly.
    pub async fn publish(&self, event: impl Into<Option<GameEvent>>) -> PublishReport {
        let Some(event) = event.into() else {
            warn!("publish called without an event; ignoring");
            return PublishReport::default();
        };
        let kind = event.kind();

        let snapshot: HandlerList = match self.lock().get(&kind) {
            Some(list) => list.clone(),
            None => Vec::new(),
        };
        metrics::inc_events_published();
        if snapshot.is_empty() {
            if self.log_unhandled {
                debug!("no handlers for {} event {}", kind, event.id());
            }
            return PublishReport::default();
        }

        let event = Arc::new(event);
        let runs = snapshot.iter().map(|handler| {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            async move {
                let outcome = AssertUnwindSafe(handler.handle(&event)).catch_unwind().await;
                match outcome {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        warn!(
                            "handler {} failed on {} event {}: {}",
                            handler.name(),
                            kind,
                            event.id(),
                            e
                        );
                        false
                    }
                    Err(_) => {
                        error!(
                            "handler {} panicked on {} event {}",
                            handler.name(),
                            kind,
                            event.id()
                        );
                        false
                    }
                }
            }
        });
        let results = join_all(runs).await;

        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            metrics::add_handler_failures(failed as u64);
        }
        PublishReport {
            invoked: results.len(),
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TraitFlags;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        name: String,
        hits: AtomicUsize,
    }

    impl Counter {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Counter {
                name: name.to_string(),
                hits: AtomicUsize::new(0),
            })
        }
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for Counter {
        fn name(&self) -> &str {
            &self.name
        }
        async fn handle(&self, _event: &GameEvent) -> Result<(), HandlerError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn handle(&self, _event: &GameEvent) -> Result<(), HandlerError> {
            Err(HandlerError::failed("boom"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl EventHandler for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }
        async fn handle(&self, _event: &GameEvent) -> Result<(), HandlerError> {
            panic!("handler bug");
        }
    }

    fn catch() -> GameEvent {
        GameEvent::fish_caught(1, "Bass", 1.0, 10.0, TraitFlags::NONE)
    }

    #[tokio::test]
    async fn duplicate_subscribe_is_noop() {
        let bus = EventBus::new();
        let c = Counter::new("c");
        let h: Arc<dyn EventHandler> = c.clone();
        assert!(bus.subscribe(EventKind::FishCaught, h.clone()));
        assert!(!bus.subscribe(EventKind::FishCaught, h.clone()));
        assert_eq!(bus.subscriber_count(EventKind::FishCaught), 1);
        bus.publish(catch()).await;
        assert_eq!(c.hits(), 1);
    }

    #[tokio::test]
    async fn routes_by_kind_only() {
        let bus = EventBus::new();
        let c = Counter::new("c");
        bus.subscribe(EventKind::DigFind, c.clone());
        let report = bus.publish(catch()).await;
        assert_eq!(report, PublishReport::default());
        assert_eq!(c.hits(), 0);
    }

    #[tokio::test]
    async fn failures_and_panics_are_isolated() {
        let bus = EventBus::new();
        let before = Counter::new("before");
        let after = Counter::new("after");
        bus.subscribe(EventKind::FishCaught, before.clone());
        bus.subscribe(EventKind::FishCaught, Arc::new(Failing));
        bus.subscribe(EventKind::FishCaught, Arc::new(Panicking));
        bus.subscribe(EventKind::FishCaught, after.clone());

        let report = bus.publish(catch()).await;
        assert_eq!(report.invoked, 4);
        assert_eq!(report.failed, 2);
        assert_eq!(before.hits(), 1);
        assert_eq!(after.hits(), 1);
    }

    #[tokio::test]
    async fn absent_event_is_ignored() {
        let bus = EventBus::new();
        let c = Counter::new("c");
        bus.subscribe(EventKind::FishCaught, c.clone());
        let report = bus.publish(None::<GameEvent>).await;
        assert_eq!(report.invoked, 0);
        assert_eq!(c.hits(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_missing_is_noop() {
        let bus = EventBus::new();
        let h: Arc<dyn EventHandler> = Counter::new("c");
        assert!(!bus.unsubscribe(EventKind::FishCaught, &h));
        bus.subscribe(EventKind::FishCaught, h.clone());
        assert!(bus.unsubscribe(EventKind::FishCaught, &h));
        assert!(!bus.unsubscribe(EventKind::FishCaught, &h));
        assert_eq!(bus.subscriber_count(EventKind::FishCaught), 0);
    }
}
