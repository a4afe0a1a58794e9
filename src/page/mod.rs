//! Routable views.
//!
//! A [`Page`] is a [`View`](crate::view::View) carrying the routing
//! capability: a name, a [`RoutePattern`], the last params and query, an
//! active flag and the state saved when it was last left.

mod pattern;
mod routable;

pub use pattern::{Params, PatternError, Query, RoutePattern};
pub use routable::{NoPageHooks, Page, PageBuilder, PageHooks, RouteState, SavedState};
