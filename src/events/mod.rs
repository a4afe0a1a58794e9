//! Pub/sub backbone shared by models, views and the router.

mod bus;
mod namespace;

pub use bus::{
    AsyncListener, EmitReport, EventBus, ListenerId, Middleware, SyncListener,
    DEFAULT_MAX_LISTENERS,
};
pub use namespace::NamespacedBus;
