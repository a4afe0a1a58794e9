//! Base trait for reducer-driven state.

/// Marker trait for state objects.
///
/// States are cheap to clone, comparable, and have a resting default.
pub trait MachineState: Clone + PartialEq + Default + Send + 'static {}
