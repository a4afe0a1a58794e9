//! Prefix-bound view over an [`EventBus`].

use std::future::Future;

use serde_json::Value;

use super::bus::{EmitReport, EventBus, ListenerId};

/// Sub-bus that qualifies every event name as `"{prefix}:{event}"`.
///
/// Listeners registered here live on the parent bus, so a listener for
/// `"route:after"` on the parent sees `namespace("route").emit("after", ..)`.
#[derive(Clone)]
pub struct NamespacedBus {
    bus: EventBus,
    prefix: String,
}

impl NamespacedBus {
    pub(crate) fn new(bus: EventBus, prefix: &str) -> Self {
        Self {
            bus,
            prefix: prefix.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Fully qualified name for `event`.
    pub fn qualify(&self, event: &str) -> String {
        format!("{}:{}", self.prefix, event)
    }

    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.on(&self.qualify(event), listener)
    }

    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.once(&self.qualify(event), listener)
    }

    pub fn on_async<F, Fut>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.bus.on_async(&self.qualify(event), listener)
    }

    pub fn off(&self, event: &str, id: Option<ListenerId>) -> usize {
        self.bus.off(&self.qualify(event), id)
    }

    pub fn emit(&self, event: &str, payload: Value) -> &Self {
        self.bus.emit(&self.qualify(event), payload);
        self
    }

    pub async fn emit_async(&self, event: &str, payload: Value) -> EmitReport {
        self.bus.emit_async(&self.qualify(event), payload).await
    }

    /// Nested namespace: `bus.namespace("a").namespace("b")` emits `a:b:*`.
    pub fn namespace(&self, prefix: &str) -> NamespacedBus {
        NamespacedBus::new(self.bus.clone(), &self.qualify(prefix))
    }

    /// The underlying, unprefixed bus.
    pub fn root(&self) -> &EventBus {
        &self.bus
    }
}
