//! Attribute-observing data layer synchronized with a REST API.
//!
//! # Architecture
//!
//! ```text
//! ModelDef (endpoint, identity, rules)
//!     │
//!     ├──→ Model ───────┐
//!     │                 ├──→ RestTransport (trait) ──→ HttpTransport (reqwest)
//!     └──→ Collection ──┘
//! ```
//!
//! Models and collections each own an [`EventBus`](crate::events::EventBus);
//! collections forward member `change` events on their own bus.

mod collection;
mod error;
mod model;
pub mod path;
mod schema;
mod transport;

pub use collection::{AddInput, AddOptions, Collection, ModelRef, Pagination, Where};
pub use error::{DataError, FieldErrors, BASE_ERROR_KEY};
pub use model::{Model, SetOptions, WeakModel};
pub use schema::{identity_key, ModelDef, Rule};
pub use transport::{parse_field_errors, ApiResponse, HttpTransport, Method, QueryParams, RestTransport};
