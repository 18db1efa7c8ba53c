//! Event Bus (C1, §4.1): process-wide typed pub/sub.
//!
//! Delivery is FIFO per event, handlers receive events in publish order.
//! Synchronous handlers run first, sequentially; asynchronous handlers run
//! concurrently after them. A handler panic is logged and never prevents
//! delivery to the others.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    UserCancel,
    TodoUpdated,
    SessionStart,
}

#[derive(Debug, Clone)]
pub struct BusEvent {
    pub event_type: EventType,
    pub payload: Value,
}

impl BusEvent {
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self { event_type, payload }
    }
}

pub type SyncHandler = Arc<dyn Fn(&BusEvent) + Send + Sync>;
pub type AsyncHandler = Arc<dyn Fn(BusEvent) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

impl Handler {
    fn same_target(&self, other: &Handler) -> bool {
        match (self, other) {
            (Handler::Sync(a), Handler::Sync(b)) => Arc::ptr_eq(a, b),
            (Handler::Async(a), Handler::Async(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

struct Inner {
    handlers: Mutex<HashMap<EventType, Vec<Handler>>>,
    tx: Mutex<Option<mpsc::UnboundedSender<BusEvent>>>,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// A process-wide pub/sub fabric. Cheap to clone; clones share the same
/// subscriber table and dispatcher.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: Mutex::new(HashMap::new()),
                tx: Mutex::new(None),
                started: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }

    /// Idempotent per (event_type, handler) pair.
    pub fn subscribe_sync(&self, event_type: EventType, handler: SyncHandler) {
        self.subscribe(event_type, Handler::Sync(handler));
    }

    pub fn subscribe_async(&self, event_type: EventType, handler: AsyncHandler) {
        self.subscribe(event_type, Handler::Async(handler));
    }

    fn subscribe(&self, event_type: EventType, handler: Handler) {
        let mut handlers = match self.inner.handlers.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = handlers.entry(event_type).or_default();
        if !entry.iter().any(|h| h.same_target(&handler)) {
            entry.push(handler);
        }
    }

    pub fn unsubscribe_sync(&self, event_type: EventType, handler: &SyncHandler) {
        self.unsubscribe(event_type, &Handler::Sync(handler.clone()));
    }

    pub fn unsubscribe_async(&self, event_type: EventType, handler: &AsyncHandler) {
        self.unsubscribe(event_type, &Handler::Async(handler.clone()));
    }

    fn unsubscribe(&self, event_type: EventType, handler: &Handler) {
        let mut handlers = match self.inner.handlers.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(entry) = handlers.get_mut(&event_type) {
            entry.retain(|h| !h.same_target(handler));
        }
    }

    /// Enqueues `event`; returns immediately. Dropped with a warning if
    /// called before `start()`.
    pub fn publish(&self, event: BusEvent) {
        let tx = self.inner.tx.lock().ok().and_then(|g| g.clone());
        match tx {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!("event bus: dispatcher not running, event dropped");
                }
            }
            None => warn!("event bus: publish() called before start(), event dropped"),
        }
    }

    /// Starts the background dispatcher. Calling `start()` twice is a no-op.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel::<BusEvent>();
        *self.inner.tx.lock().unwrap_or_else(|p| p.into_inner()) = Some(tx);

        let handlers = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatch(&handlers, event).await;
            }
        });
        *self.inner.task.lock().unwrap_or_else(|p| p.into_inner()) = Some(task);
    }

    /// Drains the queue, stops the dispatcher. Safe to call when not
    /// started.
    pub async fn stop(&self) {
        self.inner.tx.lock().unwrap_or_else(|p| p.into_inner()).take();
        let task = self.inner.task.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.inner.started.store(false, Ordering::SeqCst);
    }
}

async fn dispatch(inner: &Arc<Inner>, event: BusEvent) {
    let handlers = {
        let guard = inner.handlers.lock().unwrap_or_else(|p| p.into_inner());
        guard.get(&event.event_type).cloned().unwrap_or_default()
    };

    let mut async_handlers = Vec::new();
    for handler in handlers {
        match handler {
            Handler::Sync(f) => {
                let event_ref = &event;
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| f(event_ref)));
                if result.is_err() {
                    error!("event bus: synchronous handler panicked");
                }
            }
            Handler::Async(f) => async_handlers.push(f),
        }
    }

    if !async_handlers.is_empty() {
        let futures = async_handlers
            .into_iter()
            .map(|f| AssertUnwindSafe(f(event.clone())).catch_unwind());
        for result in join_all(futures).await {
            if result.is_err() {
                error!("event bus: asynchronous handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn publish_before_start_drops() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        bus.subscribe_sync(
            EventType::UserCancel,
            Arc::new(move |_| {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.publish(BusEvent::new(EventType::UserCancel, Value::Null));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sync_and_async_handlers_both_run_in_order() {
        let bus = EventBus::new();
        bus.start();
        let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));

        let order_sync = Arc::clone(&order);
        bus.subscribe_sync(
            EventType::TodoUpdated,
            Arc::new(move |_| order_sync.lock().unwrap().push("sync")),
        );
        let order_async = Arc::clone(&order);
        bus.subscribe_async(
            EventType::TodoUpdated,
            Arc::new(move |_| {
                let order_async = Arc::clone(&order_async);
                async move {
                    order_async.lock().unwrap().push("async");
                }
                .boxed()
            }),
        );

        bus.publish(BusEvent::new(EventType::TodoUpdated, Value::Null));
        bus.stop().await;

        assert_eq!(*order.lock().unwrap(), vec!["sync", "async"]);
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_per_handler() {
        let bus = EventBus::new();
        bus.start();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let handler: SyncHandler = Arc::new(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.subscribe_sync(EventType::SessionStart, handler.clone());
        bus.subscribe_sync(EventType::SessionStart, handler);

        bus.publish(BusEvent::new(EventType::SessionStart, Value::Null));
        bus.stop().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
