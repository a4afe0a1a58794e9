//! The view tree node and its lifecycle driver.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::data::{path, Model, WeakModel};
use crate::events::{EventBus, ListenerId};
use crate::mvi::Reducer;
use crate::page::RouteState;
use crate::view::action::{boxed_handler, handler_name, ActionHandler, ActionOutcome, DomEvent, ElementRef};
use crate::view::error::ViewError;
use crate::view::lifecycle::{run_stage, LifecycleIntent, LifecycleReducer, LifecycleState, Stage};
use crate::view::resolve::Namespace;
use crate::view::surface::{ScrollOffset, Surface};
use crate::view::template::{interpolate, slot_tag, Template, TemplateRegistry};

/// A computed property: evaluated on every `get` of its exact name.
pub type ComputedFn = Arc<dyn Fn(&View) -> anyhow::Result<Value> + Send + Sync>;

/// Lifecycle hooks. Every method has a no-op default.
#[async_trait(?Send)]
pub trait ViewHooks: Send + Sync {
    /// Runs once, before the first render.
    fn on_init(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_render(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_render(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_mount(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_mount(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_destroy(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_destroy(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct NoHooks;

#[async_trait(?Send)]
impl ViewHooks for NoHooks {}

/// Definition-time description of a view: template, hooks, action table,
/// computed properties and initial bags.
#[derive(Clone)]
pub struct ViewDef {
    name: String,
    template: Template,
    hooks: Arc<dyn ViewHooks>,
    actions: HashMap<String, ActionHandler>,
    computed: HashMap<String, ComputedFn>,
    props: Map<String, Value>,
    data: Map<String, Value>,
    state: Map<String, Value>,
    container: Option<String>,
}

impl ViewDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: Template::Empty,
            hooks: Arc::new(NoHooks),
            actions: HashMap::new(),
            computed: HashMap::new(),
            props: Map::new(),
            data: Map::new(),
            state: Map::new(),
            container: None,
        }
    }

    pub fn template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ViewHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Register the handler for `data-action="<action>"`.
    pub fn action<F, Fut>(mut self, action: impl Into<String>, handler: F) -> Self
    where
        F: Fn(View, DomEvent, ElementRef) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.actions.insert(action.into(), boxed_handler(handler));
        self
    }

    pub fn computed<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&View) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.computed.insert(name.into(), Arc::new(compute));
        self
    }

    pub fn prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state.insert(key.into(), value);
        self
    }

    /// Default container when neither the caller nor a parent slot names one.
    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }
}

struct ModelBinding {
    model: WeakModel,
    listener: ListenerId,
}

struct ViewNode {
    parent: Option<Weak<ViewInner>>,
    children: Vec<(String, View)>,
    props: Map<String, Value>,
    data: Map<String, Value>,
    state: Map<String, Value>,
    model: Option<ModelBinding>,
    lifecycle: LifecycleState,
    destroying: bool,
    container: Option<String>,
    fragment: String,
    render_count: u64,
    stale: bool,
    delegating: bool,
    surface: Surface,
    route: Option<RouteState>,
}

struct ViewInner {
    id: String,
    def: Arc<ViewDef>,
    bus: EventBus,
    templates: TemplateRegistry,
    node: Mutex<ViewNode>,
}

/// Shared handle to a view tree node.
#[derive(Clone)]
pub struct View {
    inner: Arc<ViewInner>,
}

impl View {
    /// A standalone view with its own bus and an empty template registry.
    pub fn new(def: impl Into<Arc<ViewDef>>) -> Self {
        Self::with_context(def, EventBus::new(), TemplateRegistry::default())
    }

    pub fn with_context(def: impl Into<Arc<ViewDef>>, bus: EventBus, templates: TemplateRegistry) -> Self {
        Self::build(def.into(), bus, templates, None)
    }

    pub(crate) fn build(
        def: Arc<ViewDef>,
        bus: EventBus,
        templates: TemplateRegistry,
        route: Option<RouteState>,
    ) -> Self {
        let node = ViewNode {
            parent: None,
            children: Vec::new(),
            props: def.props.clone(),
            data: def.data.clone(),
            state: def.state.clone(),
            model: None,
            lifecycle: LifecycleState::default(),
            destroying: false,
            container: None,
            fragment: String::new(),
            render_count: 0,
            stale: false,
            delegating: false,
            surface: Surface::default(),
            route,
        };
        Self {
            inner: Arc::new(ViewInner {
                id: Uuid::new_v4().to_string(),
                def,
                bus,
                templates,
                node: Mutex::new(node),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        self.inner.def.name()
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.inner.templates
    }

    pub fn ptr_eq(&self, other: &View) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.node.lock().lifecycle
    }

    pub fn is_rendered(&self) -> bool {
        self.lifecycle().rendered
    }

    pub fn is_mounted(&self) -> bool {
        self.lifecycle().mounted
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle().destroyed
    }

    /// Completed renders of this node (children count their own).
    pub fn render_count(&self) -> u64 {
        self.inner.node.lock().render_count
    }

    /// Set when a bound model changed since the last render.
    pub fn is_stale(&self) -> bool {
        self.inner.node.lock().stale
    }

    pub fn container(&self) -> Option<String> {
        self.inner.node.lock().container.clone()
    }

    /// This node's own rendered markup, slots left empty.
    pub fn fragment(&self) -> String {
        self.inner.node.lock().fragment.clone()
    }

    /// The composed markup: this fragment with every child spliced into its slot.
    pub fn html(&self) -> String {
        let (mut out, children) = {
            let node = self.inner.node.lock();
            (node.fragment.clone(), node.children.clone())
        };
        for (key, child) in children {
            let slot = slot_tag(&key);
            if out.contains(&slot) {
                let filled = format!("<slot id=\"{}\">{}</slot>", key, child.html());
                out = out.replacen(&slot, &filled, 1);
            }
        }
        out
    }

    fn ensure_alive(&self) -> Result<(), ViewError> {
        if self.inner.node.lock().lifecycle.destroyed {
            return Err(ViewError::Destroyed {
                view_id: self.inner.id.clone(),
            });
        }
        Ok(())
    }

    /// Setters that cannot return an error log and skip on a destroyed node.
    fn reject_destroyed(&self, node: &ViewNode, operation: &str) -> bool {
        if node.lifecycle.destroyed {
            tracing::warn!(view_id = %self.inner.id, operation = %operation, "Ignoring write to destroyed view");
        }
        node.lifecycle.destroyed
    }

    fn apply(&self, intent: LifecycleIntent) {
        let mut node = self.inner.node.lock();
        node.lifecycle = LifecycleReducer::reduce(node.lifecycle, intent);
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Run `on_init` if it has not run yet.
    pub fn init(&self) -> Result<(), ViewError> {
        self.ensure_alive()?;
        if self.lifecycle().initialized {
            return Ok(());
        }
        self.apply(LifecycleIntent::Initialized);
        self.inner.def.hooks.on_init(self).map_err(|err| {
            tracing::error!(view_id = %self.inner.id, error = %err, "on_init failed");
            ViewError::Stage {
                stage: Stage::Init,
                view_id: self.inner.id.clone(),
                message: format!("{:#}", err),
            }
        })
    }

    /// Render into `container` (or the previously used / default / slot
    /// container), then render every child into its slot.
    ///
    /// A failing child is logged and skipped; its siblings still render.
    pub async fn render(&self, container: Option<&str>) -> Result<(), ViewError> {
        self.render_boxed(container.map(str::to_owned)).await
    }

    fn render_boxed(&self, container: Option<String>) -> LocalBoxFuture<'_, Result<(), ViewError>> {
        Box::pin(async move {
            self.ensure_alive()?;
            self.init()?;
            let container = self.resolve_container(container);
            let id = self.inner.id.as_str();

            run_stage(id, Stage::BeforeRender, self.inner.def.hooks.before_render(self)).await?;
            let markup = self.produce_markup().await?;
            self.ensure_alive()?;

            let children = {
                let mut node = self.inner.node.lock();
                node.container = container;
                node.fragment = markup;
                node.render_count += 1;
                node.stale = false;
                node.lifecycle = LifecycleReducer::reduce(node.lifecycle, LifecycleIntent::Rendered);
                node.children.clone()
            };

            for (key, child) in children {
                if let Err(err) = child.render_boxed(Some(key.clone())).await {
                    tracing::error!(view_id = %id, child_id = %child.id(), slot = %key, error = %err, "Child render failed");
                }
            }

            run_stage(id, Stage::AfterRender, self.inner.def.hooks.after_render(self)).await?;
            tracing::debug!(view_id = %id, view = %self.name(), "View rendered");
            Ok(())
        })
    }

    fn resolve_container(&self, requested: Option<String>) -> Option<String> {
        requested
            .or_else(|| self.inner.node.lock().container.clone())
            .or_else(|| self.inner.def.container.clone())
            .or_else(|| self.slot_key())
    }

    fn slot_key(&self) -> Option<String> {
        let parent = self.parent()?;
        let node = parent.inner.node.lock();
        node.children
            .iter()
            .find(|(_, child)| child.ptr_eq(self))
            .map(|(key, _)| key.clone())
    }

    async fn produce_markup(&self) -> Result<String, ViewError> {
        let data = self.view_data();
        let source: String = match &self.inner.def.template {
            Template::Empty => return Ok(String::new()),
            Template::Static(source) => source.clone(),
            Template::Named(name) => self.inner.templates.resolve(name).await?.to_string(),
            Template::Function(render) => render(data.clone()).await.map_err(|err| {
                tracing::error!(view_id = %self.inner.id, error = %err, "Template function failed");
                ViewError::Stage {
                    stage: Stage::Template,
                    view_id: self.inner.id.clone(),
                    message: format!("{:#}", err),
                }
            })?,
        };
        interpolate(&source, &|key: &str| {
            self.get(key).or_else(|| path::get_path(&data, key).cloned())
        })
    }

    /// Data handed to templates: the data bag at top level plus `state`,
    /// `model` (the bound model's attributes, or null) and, for pages,
    /// `params` and `query`.
    pub fn view_data(&self) -> Value {
        let mut data = {
            let node = self.inner.node.lock();
            let mut data = node.data.clone();
            data.insert("state".to_string(), Value::Object(node.state.clone()));
            if let Some(route) = &node.route {
                data.insert("params".to_string(), json!(route.params));
                data.insert("query".to_string(), json!(route.query));
            }
            data
        };
        let model = self.model().map(|m| m.to_json()).unwrap_or(Value::Null);
        data.insert("model".to_string(), model);
        Value::Object(data)
    }

    /// Attach action delegation, mount children, then mark mounted.
    pub async fn mount(&self) -> Result<(), ViewError> {
        self.mount_boxed().await
    }

    fn mount_boxed(&self) -> LocalBoxFuture<'_, Result<(), ViewError>> {
        Box::pin(async move {
            self.ensure_alive()?;
            let state = self.lifecycle();
            if !state.rendered {
                return Err(ViewError::NotRendered {
                    view_id: self.inner.id.clone(),
                });
            }
            if state.mounted {
                return Ok(());
            }
            let id = self.inner.id.as_str();

            run_stage(id, Stage::BeforeMount, self.inner.def.hooks.before_mount(self)).await?;
            self.inner.node.lock().delegating = true;

            for child in self.children() {
                if let Err(err) = child.mount_boxed().await {
                    tracing::error!(view_id = %id, child_id = %child.id(), error = %err, "Child mount failed");
                }
            }

            run_stage(id, Stage::AfterMount, self.inner.def.hooks.after_mount(self)).await?;
            self.apply(LifecycleIntent::Mounted);
            tracing::debug!(view_id = %id, "View mounted");
            Ok(())
        })
    }

    /// Shallow-merge `patch` into the data bag, optionally re-rendering.
    pub async fn update_data(&self, patch: Value, rerender: bool) -> Result<(), ViewError> {
        self.update_bag(patch, rerender, data_bag).await
    }

    /// Shallow-merge `patch` into the state bag, optionally re-rendering.
    pub async fn update_state(&self, patch: Value, rerender: bool) -> Result<(), ViewError> {
        self.update_bag(patch, rerender, state_bag).await
    }

    async fn update_bag(
        &self,
        patch: Value,
        rerender: bool,
        bag: fn(&mut ViewNode) -> &mut Map<String, Value>,
    ) -> Result<(), ViewError> {
        self.ensure_alive()?;
        let Value::Object(patch) = patch else {
            tracing::warn!(view_id = %self.inner.id, "Ignoring non-object update");
            return Ok(());
        };
        let rendered = {
            let mut node = self.inner.node.lock();
            path::merge(bag(&mut node), patch);
            node.lifecycle.rendered
        };
        if rerender && rendered {
            self.render(None).await?;
        }
        Ok(())
    }

    /// Re-render if a bound model changed since the last render.
    pub async fn refresh(&self) -> Result<bool, ViewError> {
        self.ensure_alive()?;
        let due = {
            let node = self.inner.node.lock();
            node.stale && node.lifecycle.rendered
        };
        if due {
            self.render(None).await?;
        }
        Ok(due)
    }

    /// Tear down this subtree. Idempotent; hook failures are logged and the
    /// teardown continues.
    pub async fn destroy(&self) {
        self.destroy_boxed().await
    }

    fn destroy_boxed(&self) -> LocalBoxFuture<'_, ()> {
        Box::pin(async move {
            {
                let mut node = self.inner.node.lock();
                if node.lifecycle.destroyed || node.destroying {
                    return;
                }
                node.destroying = true;
            }
            let id = self.inner.id.as_str();

            // run_stage already logs failures
            let _ = run_stage(id, Stage::BeforeDestroy, self.inner.def.hooks.before_destroy(self)).await;

            let children = std::mem::take(&mut self.inner.node.lock().children);
            for (_, child) in children {
                child.inner.node.lock().parent = None;
                child.destroy_boxed().await;
            }

            if let Some(parent) = self.parent() {
                parent.detach(self);
            }
            self.unbind_model();

            let _ = run_stage(id, Stage::AfterDestroy, self.inner.def.hooks.after_destroy(self)).await;

            {
                let mut node = self.inner.node.lock();
                node.lifecycle = LifecycleReducer::reduce(node.lifecycle, LifecycleIntent::Destroyed);
                node.destroying = false;
                node.parent = None;
                node.fragment.clear();
                node.delegating = false;
                node.surface = Surface::default();
            }
            tracing::debug!(view_id = %id, view = %self.name(), "View destroyed");
        })
    }

    // -----------------------------------------------------------------------
    // Composition
    // -----------------------------------------------------------------------

    /// Insert `child` under `key` (default: the child's id), detaching it
    /// from any previous parent first. A child already under `key` is
    /// detached, not destroyed.
    pub fn add_child(&self, child: &View, key: Option<&str>) -> Result<String, ViewError> {
        self.ensure_alive()?;
        child.ensure_alive()?;
        if self.get_hierarchy().iter().any(|v| v.ptr_eq(child)) {
            return Err(ViewError::Cycle {
                parent_id: self.inner.id.clone(),
                child_id: child.inner.id.clone(),
            });
        }

        if let Some(previous) = child.parent() {
            previous.detach(child);
        }

        let key = key.map(str::to_owned).unwrap_or_else(|| child.inner.id.clone());
        let displaced = {
            let mut node = self.inner.node.lock();
            match node.children.iter().position(|(k, _)| *k == key) {
                Some(pos) => Some(std::mem::replace(&mut node.children[pos], (key.clone(), child.clone())).1),
                None => {
                    node.children.push((key.clone(), child.clone()));
                    None
                }
            }
        };
        if let Some(old) = displaced {
            old.inner.node.lock().parent = None;
        }
        child.inner.node.lock().parent = Some(Arc::downgrade(&self.inner));
        Ok(key)
    }

    /// Detach and return the child under `key`.
    pub fn remove_child(&self, key: &str) -> Option<View> {
        let removed = {
            let mut node = self.inner.node.lock();
            let pos = node.children.iter().position(|(k, _)| k == key)?;
            node.children.remove(pos).1
        };
        removed.inner.node.lock().parent = None;
        Some(removed)
    }

    fn detach(&self, child: &View) {
        self.inner
            .node
            .lock()
            .children
            .retain(|(_, existing)| !existing.ptr_eq(child));
        child.inner.node.lock().parent = None;
    }

    pub fn child(&self, key: &str) -> Option<View> {
        self.inner
            .node
            .lock()
            .children
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, child)| child.clone())
    }

    /// Children in render order.
    pub fn children(&self) -> Vec<View> {
        self.inner.node.lock().children.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn child_keys(&self) -> Vec<String> {
        self.inner.node.lock().children.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn parent(&self) -> Option<View> {
        let weak = self.inner.node.lock().parent.clone()?;
        weak.upgrade().map(|inner| View { inner })
    }

    /// Ancestor chain, root first, ending with this view.
    pub fn get_hierarchy(&self) -> Vec<View> {
        let mut chain = vec![self.clone()];
        let mut cursor = self.parent();
        while let Some(view) = cursor {
            cursor = view.parent();
            chain.push(view);
        }
        chain.reverse();
        chain
    }

    /// Depth-first search of this subtree, including this view.
    pub fn find_by_id(&self, id: &str) -> Option<View> {
        if self.inner.id == id {
            return Some(self.clone());
        }
        self.children().into_iter().find_map(|child| child.find_by_id(id))
    }

    // -----------------------------------------------------------------------
    // Data resolution
    // -----------------------------------------------------------------------

    /// Resolve `key`: computed property (whole key only), then the `data.`,
    /// `state.` and `model.` namespaces, then own properties.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(compute) = self.inner.def.computed.get(key) {
            return match compute(self) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::debug!(view_id = %self.inner.id, key = %key, error = %err, "Computed property failed");
                    None
                }
            };
        }

        match Namespace::split(key) {
            Namespace::Data(rest) => lookup(&self.inner.node.lock().data, rest),
            Namespace::State(rest) => lookup(&self.inner.node.lock().state, rest),
            Namespace::Model(rest) => {
                let model = self.model()?;
                if rest.is_empty() {
                    Some(model.to_json())
                } else {
                    model.get(rest)
                }
            }
            Namespace::SelfProp(key) => path::get_in(&self.inner.node.lock().props, key).cloned(),
        }
    }

    /// No-op once destroyed.
    pub fn set_prop(&self, key: &str, value: Value) {
        let mut node = self.inner.node.lock();
        if self.reject_destroyed(&node, "set_prop") {
            return;
        }
        path::set_in(&mut node.props, key, value);
    }

    pub fn data(&self) -> Value {
        Value::Object(self.inner.node.lock().data.clone())
    }

    pub fn state(&self) -> Value {
        Value::Object(self.inner.node.lock().state.clone())
    }

    // -----------------------------------------------------------------------
    // Model binding
    // -----------------------------------------------------------------------

    /// Bind `model` weakly. With `mark_stale_on_change`, a model `change`
    /// marks this rendered view stale. Nothing re-renders it by itself: the
    /// host calls [`View::refresh`], and the router re-renders a stale page
    /// when it navigates to it.
    pub fn bind_model(&self, model: &Model, mark_stale_on_change: bool) -> Result<(), ViewError> {
        self.ensure_alive()?;
        self.unbind_model();

        let weak = Arc::downgrade(&self.inner);
        let listener = model.on("change", move |_| {
            if let Some(inner) = weak.upgrade() {
                let mut node = inner.node.lock();
                if mark_stale_on_change && node.lifecycle.rendered {
                    node.stale = true;
                }
            }
            Ok(())
        });
        self.inner.node.lock().model = Some(ModelBinding {
            model: model.downgrade(),
            listener,
        });
        Ok(())
    }

    pub fn unbind_model(&self) {
        let binding = self.inner.node.lock().model.take();
        if let Some(binding) = binding {
            if let Some(model) = binding.model.upgrade() {
                model.bus().off("change", Some(binding.listener));
            }
        }
    }

    pub fn model(&self) -> Option<Model> {
        let node = self.inner.node.lock();
        node.model.as_ref().and_then(|binding| binding.model.upgrade())
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Dispatch `action` through the action table. A failing handler is
    /// logged and reported as [`ActionOutcome::Failed`]; a missing one emits
    /// `action:<name>` on the bus.
    pub async fn handle_action(
        &self,
        action: &str,
        event: &DomEvent,
        element: &ElementRef,
    ) -> Result<ActionOutcome, ViewError> {
        self.ensure_alive()?;
        let handler = self.inner.def.actions.get(action).cloned();
        let Some(handler) = handler else {
            tracing::debug!(view_id = %self.inner.id, action = %action, "No action handler, emitting event");
            self.inner.bus.emit(
                &format!("action:{}", action),
                json!({
                    "action": action,
                    "event": event,
                    "element": element,
                    "view": self.inner.id,
                }),
            );
            return Ok(ActionOutcome::Unhandled);
        };

        match handler(self.clone(), event.clone(), element.clone()).await {
            Ok(()) => Ok(ActionOutcome::Handled),
            Err(err) => {
                let message = format!("{:#}", err);
                tracing::warn!(
                    view_id = %self.inner.id,
                    action = %action,
                    handler = %handler_name(action),
                    error = %message,
                    "Action handler failed"
                );
                Ok(ActionOutcome::Failed(message))
            }
        }
    }

    /// Route a host event to the nearest `data-action` element on its path.
    /// Only mounted views delegate.
    pub async fn delegate(&self, event: &DomEvent) -> Result<Option<ActionOutcome>, ViewError> {
        self.ensure_alive()?;
        if !self.inner.node.lock().delegating {
            return Ok(None);
        }
        let Some(target) = event.action_target() else {
            return Ok(None);
        };
        let Some(action) = target.action() else {
            return Ok(None);
        };
        self.handle_action(action, event, target).await.map(Some)
    }

    // -----------------------------------------------------------------------
    // Surface
    // -----------------------------------------------------------------------

    pub fn set_scroll(&self, x: u32, y: u32) {
        let mut node = self.inner.node.lock();
        if self.reject_destroyed(&node, "set_scroll") {
            return;
        }
        node.surface.scroll = ScrollOffset::new(x, y);
    }

    pub fn scroll(&self) -> ScrollOffset {
        self.inner.node.lock().surface.scroll
    }

    pub fn set_form_value(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut node = self.inner.node.lock();
        if self.reject_destroyed(&node, "set_form_value") {
            return;
        }
        node.surface.form_values.insert(name.into(), value.into());
    }

    pub fn form_value(&self, name: &str) -> Option<String> {
        self.inner.node.lock().surface.form_values.get(name).cloned()
    }

    pub fn surface(&self) -> Surface {
        self.inner.node.lock().surface.clone()
    }

    pub(crate) fn replace_surface(&self, surface: Surface) -> Surface {
        std::mem::replace(&mut self.inner.node.lock().surface, surface)
    }

    pub(crate) fn mark_stale(&self) {
        self.inner.node.lock().stale = true;
    }

    /// Run `f` against the routing capability, attaching an empty one first
    /// if this view has none.
    pub(crate) fn with_route<R>(&self, f: impl FnOnce(&mut RouteState) -> R) -> R {
        f(self.inner.node.lock().route.get_or_insert_with(RouteState::default))
    }

    pub fn is_routable(&self) -> bool {
        self.inner.node.lock().route.is_some()
    }
}

fn data_bag(node: &mut ViewNode) -> &mut Map<String, Value> {
    &mut node.data
}

fn state_bag(node: &mut ViewNode) -> &mut Map<String, Value> {
    &mut node.state
}

fn lookup(bag: &Map<String, Value>, rest: &str) -> Option<Value> {
    if rest.is_empty() {
        Some(Value::Object(bag.clone()))
    } else {
        path::get_in(bag, rest).cloned()
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = self.inner.node.lock();
        f.debug_struct("View")
            .field("id", &self.inner.id)
            .field("name", &self.inner.def.name)
            .field("lifecycle", &node.lifecycle)
            .field("children", &node.children.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>())
            .finish()
    }
}
