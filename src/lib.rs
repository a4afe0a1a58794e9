//! pagekit: a headless reactive UI runtime.
//!
//! ```text
//! App ──→ Router ──→ PageArena ──→ Page (View + route state)
//!  │        │                         │
//!  │        └── AddressMode           └── View tree ──→ TemplateRegistry
//!  │
//!  ├──→ EventBus (route:*, page:*, action:*)
//!  └──→ RestTransport ──→ Model / Collection
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod events;
pub mod logging;
pub mod mvi;
pub mod page;
pub mod router;
pub mod view;

pub use app::{App, AppBuilder, AppError};
