//! Model-View-Intent primitives for the runtime's internal state machines.
//!
//! The router phase (`Idle` / `Transitioning`) and the view lifecycle flags
//! are both driven through a reducer so every transition happens in one place.
//!
//! ```text
//! Intent ──→ Reducer ──→ State
//!    ↑                     │
//!    └─────────────────────┘
//! ```

mod intent;
mod reducer;
mod state;

pub use intent::Intent;
pub use reducer::Reducer;
pub use state::MachineState;
