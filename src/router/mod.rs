//! URL routing: address modes, the page cache and serialised transitions.
//!
//! # Transition order
//!
//! ```text
//! route:before → guard → get_or_create_page → page:before-change
//!   → outgoing on_exit → strip reserved query key → on_params → on_enter
//!   → page:activated → render/mount if needed → page:changed → route:after
//! ```
//!
//! Navigations requested while a transition is in flight are queued and run
//! in order once it finishes.

mod arena;
mod error;
mod location;
mod mode;
mod phase;
mod transition;

pub use arena::{PageArena, PageId};
pub use error::RouterError;
pub use location::{decode_query, encode_query, History, Location};
pub use mode::{mode_for, AddressMode, HashMode, HistoryMode, ParamMode};
pub use phase::{RouterIntent, RouterPhase, RouterReducer};
pub use transition::{
    NavigationOutcome, NoRouterHooks, PageFactory, RouteMatch, Router, RouterBuilder, RouterHooks,
};
