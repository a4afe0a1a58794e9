//! Base trait for intents (requested transitions).

/// Marker trait for intent objects.
///
/// Intents represent requested transitions: a navigation starting, a
/// lifecycle stage completing, a teardown.
pub trait Intent: Send + 'static {}
