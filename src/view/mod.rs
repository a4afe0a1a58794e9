//! Composable view tree: lifecycle, templates, namespaced data resolution
//! and action dispatch.
//!
//! A [`View`] is a cheap handle; clones share one node. Parents own their
//! children, children hold a weak back-reference.

mod action;
mod error;
mod lifecycle;
mod node;
mod resolve;
mod surface;
mod template;

pub use action::{handler_name, ActionHandler, ActionOutcome, DomEvent, ElementRef, ACTION_ATTRIBUTE};
pub use error::ViewError;
pub use lifecycle::{run_stage, LifecycleIntent, LifecycleReducer, LifecycleState, Stage};
pub use node::{ComputedFn, NoHooks, View, ViewDef, ViewHooks};
pub use resolve::Namespace;
pub use surface::{ScrollOffset, Surface};
pub use template::{
    escape_html, interpolate, slot_tag, DirTemplates, MemoryTemplates, Template, TemplateFn,
    TemplateRegistry, TemplateSource,
};
