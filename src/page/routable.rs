use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::events::EventBus;
use crate::page::pattern::{Params, Query, RoutePattern};
use crate::view::{run_stage, Stage, Surface, TemplateRegistry, View, ViewDef, ViewError};

/// UI state captured when a page is left and restored when it is re-entered.
pub type SavedState = Surface;

/// Routing hooks. Every method has a no-op default.
#[async_trait(?Send)]
pub trait PageHooks: Send + Sync {
    async fn on_params(&self, _page: &Page, _params: &Params, _query: &Query) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_enter(&self, _page: &Page) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_exit(&self, _page: &Page) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct NoPageHooks;

#[async_trait(?Send)]
impl PageHooks for NoPageHooks {}

/// Routing capability carried by a page's view node.
#[derive(Debug, Clone, Default)]
pub struct RouteState {
    pub(crate) name: String,
    pub(crate) pattern: RoutePattern,
    pub(crate) path: String,
    pub(crate) params: Params,
    pub(crate) query: Query,
    pub(crate) active: bool,
    pub(crate) saved: Option<SavedState>,
}

/// Configures a [`Page`]. The router hands factories a builder that already
/// carries the page name, pattern, bus and template registry.
pub struct PageBuilder {
    name: String,
    pattern: RoutePattern,
    def: Option<ViewDef>,
    hooks: Arc<dyn PageHooks>,
    bus: EventBus,
    templates: TemplateRegistry,
}

impl PageBuilder {
    pub fn new(name: impl Into<String>, pattern: RoutePattern) -> Self {
        Self {
            name: name.into(),
            pattern,
            def: None,
            hooks: Arc::new(NoPageHooks),
            bus: EventBus::new(),
            templates: TemplateRegistry::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(mut self, def: ViewDef) -> Self {
        self.def = Some(def);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn PageHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn build(self) -> Page {
        let def = self.def.unwrap_or_else(|| ViewDef::new(self.name.clone()));
        let route = RouteState {
            name: self.name,
            pattern: self.pattern,
            ..RouteState::default()
        };
        Page {
            view: View::build(Arc::new(def), self.bus, self.templates, Some(route)),
            hooks: self.hooks,
        }
    }
}

/// A routable [`View`]: one instance per page name, kept for the router's
/// lifetime.
#[derive(Clone)]
pub struct Page {
    view: View,
    hooks: Arc<dyn PageHooks>,
}

impl Deref for Page {
    type Target = View;

    fn deref(&self) -> &View {
        &self.view
    }
}

impl Page {
    pub fn builder(name: impl Into<String>, pattern: RoutePattern) -> PageBuilder {
        PageBuilder::new(name, pattern)
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn page_name(&self) -> String {
        self.view.with_route(|r| r.name.clone())
    }

    pub fn pattern(&self) -> RoutePattern {
        self.view.with_route(|r| r.pattern.clone())
    }

    /// Path of the navigation that last reached this page.
    pub fn path(&self) -> String {
        self.view.with_route(|r| r.path.clone())
    }

    pub fn params(&self) -> Params {
        self.view.with_route(|r| r.params.clone())
    }

    pub fn query(&self) -> Query {
        self.view.with_route(|r| r.query.clone())
    }

    pub fn is_active(&self) -> bool {
        self.view.with_route(|r| r.active)
    }

    pub fn saved_state(&self) -> Option<SavedState> {
        self.view.with_route(|r| r.saved.clone())
    }

    pub fn match_route(&self, path: &str) -> Option<Params> {
        self.view.with_route(|r| r.pattern.match_path(path))
    }

    /// Store new params and query (wholesale). Re-renders only when the page
    /// is active, already rendered and something changed; an inactive page
    /// is marked stale instead. Returns whether it re-rendered.
    pub async fn on_params(&self, params: Params, query: Query) -> Result<bool, ViewError> {
        let (changed, active) = self.view.with_route(|r| {
            let changed = r.params != params || r.query != query;
            r.params = params.clone();
            r.query = query.clone();
            (changed, r.active)
        });

        run_stage(self.id(), Stage::Params, self.hooks.on_params(self, &params, &query)).await?;

        if !changed || !self.is_rendered() {
            return Ok(false);
        }
        if active {
            self.render(None).await?;
            return Ok(true);
        }
        self.view.mark_stale();
        Ok(false)
    }

    /// Capture scroll and form values, deactivate, then run the exit hook.
    /// A failing hook rolls the page back to active with its surface intact.
    pub async fn on_exit(&self) -> Result<(), ViewError> {
        let captured = self.view.replace_surface(Surface::default());
        let (path, was_active, prior) = self.view.with_route(|r| {
            let prior = r.saved.replace(captured.clone());
            let was_active = std::mem::replace(&mut r.active, false);
            (r.path.clone(), was_active, prior)
        });
        tracing::debug!(page = %self.page_name(), path = %path, "Page deactivated");

        if let Err(err) = run_stage(self.id(), Stage::Exit, self.hooks.on_exit(self)).await {
            self.view.replace_surface(captured);
            self.view.with_route(|r| {
                r.saved = prior;
                r.active = was_active;
            });
            return Err(err);
        }
        self.bus()
            .namespace("page")
            .emit("deactivated", json!({ "page": self.page_name(), "path": path }));
        Ok(())
    }

    /// Restore the saved state, if any, then run the enter hook.
    pub async fn on_enter(&self) -> Result<(), ViewError> {
        if let Some(saved) = self.saved_state() {
            self.view.replace_surface(saved);
        }
        run_stage(self.id(), Stage::Enter, self.hooks.on_enter(self)).await
    }

    pub(crate) fn set_path(&self, path: &str) {
        self.view.with_route(|r| r.path = path.to_string());
    }

    pub(crate) fn activate(&self) {
        let path = self.view.with_route(|r| {
            r.active = true;
            r.path.clone()
        });
        self.bus()
            .namespace("page")
            .emit("activated", json!({ "page": self.page_name(), "path": path }));
    }

    pub fn ptr_eq(&self, other: &Page) -> bool {
        self.view.ptr_eq(&other.view)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("name", &self.page_name())
            .field("pattern", &self.pattern().as_str())
            .field("active", &self.is_active())
            .field("view", &self.view)
            .finish()
    }
}
