//! DOM-event delegation and the action table.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::view::node::View;

/// Attribute naming the action an element triggers.
pub const ACTION_ATTRIBUTE: &str = "data-action";

/// One element on an event's bubbling path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
}

impl ElementRef {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn action(&self) -> Option<&str> {
        self.get_attribute(ACTION_ATTRIBUTE)
    }
}

/// A host event. `path` is the bubbling chain, target first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomEvent {
    pub kind: String,
    pub path: Vec<ElementRef>,
}

impl DomEvent {
    pub fn new(kind: impl Into<String>, path: Vec<ElementRef>) -> Self {
        Self {
            kind: kind.into(),
            path,
        }
    }

    /// Nearest element on the path carrying an action.
    pub fn action_target(&self) -> Option<&ElementRef> {
        self.path.iter().find(|el| el.action().is_some())
    }
}

pub type ActionHandler = Arc<
    dyn Fn(View, DomEvent, ElementRef) -> LocalBoxFuture<'static, anyhow::Result<()>> + Send + Sync,
>;

pub(crate) fn boxed_handler<F, Fut>(handler: F) -> ActionHandler
where
    F: Fn(View, DomEvent, ElementRef) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + 'static,
{
    Arc::new(move |view, event, element| Box::pin(handler(view, event, element)))
}

/// Conventional handler name for an action: `show-modal` → `onActionShowModal`.
pub fn handler_name(action: &str) -> String {
    let mut name = String::from("onAction");
    for segment in action.split('-').filter(|s| !s.is_empty()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name
}

/// What happened to a dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Handled,
    /// The handler returned an error; it was logged.
    Failed(String),
    /// No handler registered; `action:<name>` was emitted instead.
    Unhandled,
}
