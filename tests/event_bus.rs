use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reelbot::errors::HandlerError;
use reelbot::events::{EventBus, EventHandler, EventKind, GameEvent, TraitFlags};

struct Recorder {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EventHandler for Recorder {
    fn name(&self) -> &str {
        &self.name
    }
    async fn handle(&self, _event: &GameEvent) -> Result<(), HandlerError> {
        self.log.lock().unwrap().push(self.name.clone());
        Ok(())
    }
}

struct Broken;

#[async_trait]
impl EventHandler for Broken {
    fn name(&self) -> &str {
        "broken"
    }
    async fn handle(&self, _event: &GameEvent) -> Result<(), HandlerError> {
        Err(HandlerError::failed("storage offline"))
    }
}

struct Exploding;

#[async_trait]
impl EventHandler for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }
    async fn handle(&self, _event: &GameEvent) -> Result<(), HandlerError> {
        panic!("handler bug");
    }
}

/// Subscribes `late` the first time it runs.
struct Subscriber {
    bus: Arc<EventBus>,
    late: Arc<dyn EventHandler>,
    runs: AtomicUsize,
}

#[async_trait]
impl EventHandler for Subscriber {
    fn name(&self) -> &str {
        "subscriber"
    }
    async fn handle(&self, _event: &GameEvent) -> Result<(), HandlerError> {
        if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            self.bus.subscribe(EventKind::DigFind, self.late.clone());
        }
        Ok(())
    }
}

fn recorder(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn EventHandler> {
    Arc::new(Recorder {
        name: name.to_string(),
        log: log.clone(),
    })
}

fn catch() -> GameEvent {
    GameEvent::fish_caught(1, "Bass", 10.0, 20.0, TraitFlags::NONE)
}

#[tokio::test]
async fn handlers_start_in_subscription_order() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        assert!(bus.subscribe(EventKind::FishCaught, recorder(name, &log)));
    }

    let report = bus.publish(catch()).await;
    assert_eq!(report.invoked, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn failing_and_panicking_handlers_do_not_block_others() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(EventKind::FishCaught, Arc::new(Exploding));
    bus.subscribe(EventKind::FishCaught, Arc::new(Broken));
    bus.subscribe(EventKind::FishCaught, recorder("survivor", &log));

    let report = bus.publish(catch()).await;
    assert_eq!(report.invoked, 3);
    assert_eq!(report.failed, 2);
    assert_eq!(*log.lock().unwrap(), vec!["survivor"]);

    // The bus is still usable afterwards
    let again = bus.publish(catch()).await;
    assert_eq!(again.invoked, 3);
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn same_handler_registered_twice_runs_once() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let h = recorder("only", &log);
    assert!(bus.subscribe(EventKind::FishCaught, h.clone()));
    assert!(!bus.subscribe(EventKind::FishCaught, h.clone()));
    assert_eq!(bus.subscriber_count(EventKind::FishCaught), 1);

    bus.publish(catch()).await;
    assert_eq!(log.lock().unwrap().len(), 1);

    assert!(bus.unsubscribe(EventKind::FishCaught, &h));
    assert!(!bus.unsubscribe(EventKind::FishCaught, &h));
    bus.publish(catch()).await;
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn no_subscribers_and_absent_event_are_noops() {
    let bus = EventBus::new().with_unhandled_logging(true);
    let report = bus.publish(GameEvent::crop_harvested(3, "Wheat", 2)).await;
    assert_eq!(report.invoked, 0);

    let report = bus.publish(None::<GameEvent>).await;
    assert_eq!(report.invoked, 0);
    assert_eq!(report.failed, 0);
}

// A handler that subscribes during fan-out neither deadlocks nor joins the in-flight publish.
#[tokio::test]
async fn subscribe_during_publish_applies_to_next_event() {
    let bus = Arc::new(EventBus::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Arc::new(Subscriber {
        bus: bus.clone(),
        late: recorder("late", &log),
        runs: AtomicUsize::new(0),
    });
    bus.subscribe(EventKind::DigFind, subscriber);

    let first = bus.publish(GameEvent::dig_find(1, 0, 0)).await;
    assert_eq!(first.invoked, 1);
    assert!(log.lock().unwrap().is_empty());

    let second = bus.publish(GameEvent::dig_find(1, 0, 1)).await;
    assert_eq!(second.invoked, 2);
    assert_eq!(*log.lock().unwrap(), vec!["late"]);
}

#[tokio::test]
async fn concurrent_publishers_all_deliver() {
    let bus = Arc::new(EventBus::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(EventKind::FishCaught, recorder("sink", &log));

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish(catch()).await })
        })
        .collect();
    for t in tasks {
        assert_eq!(t.await.unwrap().invoked, 1);
    }
    assert_eq!(log.lock().unwrap().len(), 20);
}

/// Records itself, then unsubscribes every handler in `targets`.
struct Leaver {
    bus: Arc<EventBus>,
    targets: Mutex<Vec<Arc<dyn EventHandler>>>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EventHandler for Leaver {
    fn name(&self) -> &str {
        "leaver"
    }
    async fn handle(&self, _event: &GameEvent) -> Result<(), HandlerError> {
        self.log.lock().unwrap().push("leaver".to_string());
        let targets: Vec<_> = self.targets.lock().unwrap().drain(..).collect();
        for target in &targets {
            self.bus.unsubscribe(EventKind::FishCaught, target);
        }
        Ok(())
    }
}

// Unsubscribing mid-dispatch leaves the in-flight fan-out intact and takes effect next publish.
#[tokio::test]
async fn unsubscribe_self_and_sibling_during_publish() {
    let bus = Arc::new(EventBus::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let leaver = Arc::new(Leaver {
        bus: bus.clone(),
        targets: Mutex::new(Vec::new()),
        log: log.clone(),
    });
    let leaver_dyn: Arc<dyn EventHandler> = leaver.clone();
    let sibling = recorder("sibling", &log);
    bus.subscribe(EventKind::FishCaught, leaver_dyn.clone());
    bus.subscribe(EventKind::FishCaught, sibling.clone());
    leaver.targets.lock().unwrap().extend([leaver_dyn, sibling]);

    let first = bus.publish(catch()).await;
    assert_eq!((first.invoked, first.failed), (2, 0));
    assert_eq!(*log.lock().unwrap(), vec!["leaver", "sibling"]);
    assert_eq!(bus.subscriber_count(EventKind::FishCaught), 0);

    let second = bus.publish(catch()).await;
    assert_eq!(second.invoked, 0);
    assert_eq!(log.lock().unwrap().len(), 2);
}
