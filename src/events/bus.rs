//! Ordered pub/sub with one-shot listeners and middleware.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::future::LocalBoxFuture;
use parking_lot::Mutex;
use serde_json::Value;

use super::namespace::NamespacedBus;

/// Soft per-event listener limit used when none is configured.
pub const DEFAULT_MAX_LISTENERS: usize = 100;

pub type SyncListener = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;
pub type AsyncListener =
    Arc<dyn Fn(Value) -> LocalBoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Middleware sees every emission before delivery. Returning `None` cancels
/// delivery; returning `Some` passes the (possibly rewritten) payload on.
pub type Middleware = Arc<dyn Fn(&str, Value) -> Option<Value> + Send + Sync>;

/// Handle returned by `on`/`once`, used to deregister a single listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
enum Callback {
    Sync(SyncListener),
    Async(AsyncListener),
}

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    once: bool,
    callback: Callback,
}

/// Outcome of [`EventBus::emit_async`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Listeners that ran to completion.
    pub delivered: usize,
    /// Listeners that returned an error (logged, not propagated).
    pub failed: usize,
    /// A middleware cancelled the emission.
    pub cancelled: bool,
}

struct BusInner {
    listeners: HashMap<String, Vec<Listener>>,
    middleware: Vec<Middleware>,
    max_listeners: usize,
    warned: HashSet<String>,
    next_id: u64,
}

/// Cheaply clonable event bus. Clones share listeners.
///
/// Delivery is synchronous and in registration order. The listener list for
/// an emission is snapshotted before any listener runs, so listeners may
/// freely register or remove listeners (including themselves).
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }

    pub fn with_max_listeners(max_listeners: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                listeners: HashMap::new(),
                middleware: Vec::new(),
                max_listeners,
                warned: HashSet::new(),
                next_id: 0,
            })),
        }
    }

    pub fn set_max_listeners(&self, max_listeners: usize) {
        self.inner.lock().max_listeners = max_listeners;
    }

    /// Register a listener.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(event, false, Callback::Sync(Arc::new(listener)))
    }

    /// Register a listener that fires at most once.
    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(event, true, Callback::Sync(Arc::new(listener)))
    }

    /// Register an async listener. Async listeners are only driven by
    /// [`EventBus::emit_async`]; plain `emit` skips them.
    pub fn on_async<F, Fut>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let callback: AsyncListener = Arc::new(move |payload| Box::pin(listener(payload)));
        self.register(event, false, Callback::Async(callback))
    }

    fn register(&self, event: &str, once: bool, callback: Callback) -> ListenerId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        let max = inner.max_listeners;

        let list = inner.listeners.entry(event.to_string()).or_default();
        list.push(Listener { id, once, callback });
        let count = list.len();

        if count > max && inner.warned.insert(event.to_string()) {
            tracing::warn!(
                event = %event,
                count,
                max_listeners = max,
                "Possible listener leak: listener count exceeds max_listeners"
            );
        }
        id
    }

    /// Remove one listener (`Some(id)`) or every listener for `event` (`None`).
    ///
    /// Returns the number of listeners removed.
    pub fn off(&self, event: &str, id: Option<ListenerId>) -> usize {
        let mut inner = self.inner.lock();
        let removed = match id {
            None => inner
                .listeners
                .remove(event)
                .map(|list| list.len())
                .unwrap_or(0),
            Some(id) => match inner.listeners.get_mut(event) {
                Some(list) => {
                    let before = list.len();
                    list.retain(|l| l.id != id);
                    let removed = before - list.len();
                    if list.is_empty() {
                        inner.listeners.remove(event);
                    }
                    removed
                }
                None => 0,
            },
        };
        if inner.listeners.get(event).is_none() {
            inner.warned.remove(event);
        }
        removed
    }

    /// Add a middleware. Middlewares run in registration order.
    pub fn use_middleware<F>(&self, middleware: F)
    where
        F: Fn(&str, Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.inner.lock().middleware.push(Arc::new(middleware));
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .lock()
            .listeners
            .get(event)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().listeners.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every listener and middleware.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.listeners.clear();
        inner.middleware.clear();
        inner.warned.clear();
    }

    /// Bound sub-bus whose event names are prefixed with `"{prefix}:"`.
    pub fn namespace(&self, prefix: &str) -> NamespacedBus {
        NamespacedBus::new(self.clone(), prefix)
    }

    /// Deliver `payload` to the synchronous listeners of `event`.
    pub fn emit(&self, event: &str, payload: Value) -> &Self {
        let Some(payload) = self.apply_middleware(event, payload) else {
            return self;
        };

        for listener in self.schedule(event, false) {
            if let Callback::Sync(callback) = &listener.callback {
                if let Err(err) = callback(&payload) {
                    tracing::warn!(event = %event, error = %err, "Event listener failed");
                }
            }
        }
        self
    }

    /// Deliver `payload` to every listener of `event`, awaiting async ones in
    /// order. A failing listener is logged and counted; the rest still run.
    pub async fn emit_async(&self, event: &str, payload: Value) -> EmitReport {
        let Some(payload) = self.apply_middleware(event, payload) else {
            return EmitReport {
                cancelled: true,
                ..EmitReport::default()
            };
        };

        let mut report = EmitReport::default();
        for listener in self.schedule(event, true) {
            let result = match &listener.callback {
                Callback::Sync(callback) => callback(&payload),
                Callback::Async(callback) => callback(payload.clone()).await,
            };
            match result {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(event = %event, error = %err, "Async event listener failed");
                }
            }
        }
        report
    }

    fn apply_middleware(&self, event: &str, payload: Value) -> Option<Value> {
        let middleware = self.inner.lock().middleware.clone();
        let mut payload = payload;
        for step in middleware {
            match step(event, payload) {
                Some(next) => payload = next,
                None => {
                    tracing::trace!(event = %event, "Emission cancelled by middleware");
                    return None;
                }
            }
        }
        Some(payload)
    }

    /// Snapshot the listeners for one emission, deregistering `once`
    /// listeners before any of them runs.
    fn schedule(&self, event: &str, include_async: bool) -> Vec<Listener> {
        let mut inner = self.inner.lock();
        let Some(list) = inner.listeners.get_mut(event) else {
            return Vec::new();
        };

        let eligible = |l: &Listener| include_async || matches!(l.callback, Callback::Sync(_));
        let scheduled: Vec<Listener> = list.iter().filter(|l| eligible(*l)).cloned().collect();
        list.retain(|l| !(l.once && eligible(l)));
        if list.is_empty() {
            inner.listeners.remove(event);
        }
        scheduled
    }
}
