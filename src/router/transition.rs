//! The router: route table, page cache and the serialised transition driver.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;

use crate::events::{EventBus, NamespacedBus};
use crate::mvi::Reducer;
use crate::page::{Page, PageBuilder, Params, RoutePattern};
use crate::router::arena::PageArena;
use crate::router::error::RouterError;
use crate::router::location::{History, Location};
use crate::router::mode::AddressMode;
use crate::router::phase::{RouterIntent, RouterPhase, RouterReducer};
use crate::view::{Stage, TemplateRegistry};

/// Builds a page from a builder pre-loaded with its name, pattern, bus and
/// template registry. Runs at most once per page name.
pub type PageFactory = Arc<dyn Fn(PageBuilder) -> Page + Send + Sync>;

/// Navigation hooks. Both have no-op defaults.
#[async_trait(?Send)]
pub trait RouterHooks: Send + Sync {
    /// Return `Ok(false)` to cancel the navigation.
    async fn on_before_route(&self, _path: &str, _matched: &RouteMatch) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn on_error(&self, _error: &RouterError) {}
}

pub struct NoRouterHooks;

#[async_trait(?Send)]
impl RouterHooks for NoRouterHooks {}

/// A matched route table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub pattern: String,
    pub page: String,
    pub name: Option<String>,
    pub params: Params,
}

#[derive(Debug, Clone)]
pub enum NavigationOutcome {
    Completed { page: String, path: String },
    /// Another transition was in flight; this one runs after it.
    Queued,
    /// The guard said no.
    Cancelled,
    NotFound { path: String },
    Failed(RouterError),
}

impl NavigationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, NavigationOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone)]
enum Navigation {
    Push(String),
    Replace(String),
    Back,
    Current,
}

struct RouteEntry {
    pattern: RoutePattern,
    page: String,
    name: Option<String>,
    factory: PageFactory,
}

#[derive(Default)]
struct NavQueue {
    pending: VecDeque<Navigation>,
    draining: bool,
}

pub struct RouterBuilder {
    mode: Box<dyn AddressMode>,
    bus: EventBus,
    templates: TemplateRegistry,
    container: Option<String>,
    hooks: Arc<dyn RouterHooks>,
    initial: Location,
}

impl RouterBuilder {
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    /// Container pages render into.
    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn RouterHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Starting location, given as a page path.
    pub fn initial_path(mut self, path: &str) -> Self {
        self.initial = Location::parse(&self.mode.build_url(path));
        self
    }

    /// Starting location, given as a raw URL in the mode's own format.
    pub fn initial_location(mut self, location: Location) -> Self {
        self.initial = location;
        self
    }

    pub fn build(self) -> Router {
        Router {
            inner: Arc::new(RouterInner {
                mode: self.mode,
                bus: self.bus,
                templates: self.templates,
                container: self.container,
                hooks: self.hooks,
                routes: Mutex::new(Vec::new()),
                pages: Mutex::new(PageArena::new()),
                active: Mutex::new(None),
                history: Mutex::new(History::new(self.initial)),
                phase: Mutex::new(RouterPhase::Idle),
                queue: Mutex::new(NavQueue::default()),
            }),
        }
    }
}

struct RouterInner {
    mode: Box<dyn AddressMode>,
    bus: EventBus,
    templates: TemplateRegistry,
    container: Option<String>,
    hooks: Arc<dyn RouterHooks>,
    routes: Mutex<Vec<RouteEntry>>,
    pages: Mutex<PageArena>,
    active: Mutex<Option<Page>>,
    history: Mutex<History>,
    phase: Mutex<RouterPhase>,
    queue: Mutex<NavQueue>,
}

#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn builder(mode: Box<dyn AddressMode>) -> RouterBuilder {
        RouterBuilder {
            mode,
            bus: EventBus::new(),
            templates: TemplateRegistry::default(),
            container: None,
            hooks: Arc::new(NoRouterHooks),
            initial: Location::default(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn mode(&self) -> &dyn AddressMode {
        self.inner.mode.as_ref()
    }

    fn route_events(&self) -> NamespacedBus {
        self.inner.bus.namespace("route")
    }

    fn page_events(&self) -> NamespacedBus {
        self.inner.bus.namespace("page")
    }

    // -----------------------------------------------------------------------
    // Route table
    // -----------------------------------------------------------------------

    /// Map `pattern` to the page `page`. Earlier registrations win on overlap.
    pub fn route<F>(&self, pattern: &str, page: &str, factory: F) -> Result<(), RouterError>
    where
        F: Fn(PageBuilder) -> Page + Send + Sync + 'static,
    {
        self.register(None, pattern, page, Arc::new(factory))
    }

    /// Like [`Router::route`], with a name for [`Router::url_for`].
    pub fn named_route<F>(&self, name: &str, pattern: &str, page: &str, factory: F) -> Result<(), RouterError>
    where
        F: Fn(PageBuilder) -> Page + Send + Sync + 'static,
    {
        self.register(Some(name.to_string()), pattern, page, Arc::new(factory))
    }

    fn register(
        &self,
        name: Option<String>,
        pattern: &str,
        page: &str,
        factory: PageFactory,
    ) -> Result<(), RouterError> {
        let pattern = RoutePattern::parse(pattern)?;
        let mut routes = self.inner.routes.lock();
        if let Some(name) = &name {
            if routes.iter().any(|r| r.name.as_ref() == Some(name)) {
                return Err(RouterError::DuplicateRoute { name: name.clone() });
            }
        }
        tracing::debug!(pattern = %pattern, page = %page, "Route registered");
        routes.push(RouteEntry {
            pattern,
            page: page.to_string(),
            name,
            factory,
        });
        Ok(())
    }

    /// First registered route matching `path`.
    pub fn match_route(&self, path: &str) -> Option<RouteMatch> {
        let routes = self.inner.routes.lock();
        routes.iter().find_map(|entry| {
            entry.pattern.match_path(path).map(|params| RouteMatch {
                pattern: entry.pattern.as_str().to_string(),
                page: entry.page.clone(),
                name: entry.name.clone(),
                params,
            })
        })
    }

    /// URL for the named route with `params` filled in.
    pub fn url_for(&self, name: &str, params: &Params) -> Result<String, RouterError> {
        let path = {
            let routes = self.inner.routes.lock();
            let entry = routes
                .iter()
                .find(|r| r.name.as_deref() == Some(name))
                .ok_or_else(|| RouterError::UnknownRoute { name: name.to_string() })?;
            entry.pattern.build(params)?
        };
        Ok(self.inner.mode.build_url(&path))
    }

    // -----------------------------------------------------------------------
    // Page cache
    // -----------------------------------------------------------------------

    /// The one instance for `page`, created by its route's factory on first
    /// use.
    pub fn get_or_create_page(&self, page: &str) -> Result<Page, RouterError> {
        if let Some(cached) = self.inner.pages.lock().get(page) {
            return Ok(cached);
        }

        let (pattern, factory) = {
            let routes = self.inner.routes.lock();
            let entry = routes
                .iter()
                .find(|r| r.page == page)
                .ok_or_else(|| RouterError::UnknownPage { page: page.to_string() })?;
            (entry.pattern.clone(), entry.factory.clone())
        };

        let builder = PageBuilder::new(page, pattern)
            .bus(self.inner.bus.clone())
            .templates(self.inner.templates.clone());
        let created = factory(builder);

        let mut pages = self.inner.pages.lock();
        let id = pages.insert(created);
        tracing::debug!(page = %page, id = ?id, "Page created");
        pages
            .by_id(id)
            .ok_or_else(|| RouterError::UnknownPage { page: page.to_string() })
    }

    /// Cached instance for `page`, without creating one.
    pub fn page(&self, page: &str) -> Option<Page> {
        self.inner.pages.lock().get(page)
    }

    /// Names of every cached page, in creation order.
    pub fn cached_pages(&self) -> Vec<String> {
        self.inner.pages.lock().names()
    }

    pub fn current_page(&self) -> Option<Page> {
        self.inner.active.lock().clone()
    }

    // -----------------------------------------------------------------------
    // Location
    // -----------------------------------------------------------------------

    pub fn location(&self) -> Location {
        self.inner.history.lock().current().clone()
    }

    pub fn current_path(&self) -> String {
        self.inner.mode.current_path(&self.location())
    }

    pub fn history_len(&self) -> usize {
        self.inner.history.lock().len()
    }

    pub fn phase(&self) -> RouterPhase {
        self.inner.phase.lock().clone()
    }

    pub fn is_transitioning(&self) -> bool {
        !self.inner.phase.lock().is_idle()
    }

    fn apply(&self, intent: RouterIntent) {
        let mut phase = self.inner.phase.lock();
        *phase = RouterReducer::reduce(phase.clone(), intent);
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Route the initial location.
    pub async fn start(&self) -> NavigationOutcome {
        tracing::info!(mode = ?self.inner.mode.kind(), location = %self.location().href(), "Router starting");
        self.handle_route().await
    }

    /// Push `target` (`"/path?query"`) and route it. The history entry is
    /// only committed when the transition completes.
    pub async fn navigate(&self, target: &str) -> NavigationOutcome {
        self.schedule(Navigation::Push(target.to_string())).await
    }

    /// Like [`Router::navigate`], replacing the current history entry.
    pub async fn replace(&self, target: &str) -> NavigationOutcome {
        self.schedule(Navigation::Replace(target.to_string())).await
    }

    /// Route the previous history entry. The cursor only moves when the
    /// transition completes. `None` at the start of history.
    pub async fn back(&self) -> Option<NavigationOutcome> {
        self.inner.history.lock().previous()?;
        Some(self.schedule(Navigation::Back).await)
    }

    /// Route the current location.
    pub async fn handle_route(&self) -> NavigationOutcome {
        self.schedule(Navigation::Current).await
    }

    /// Queue `navigation`; if nothing is in flight, drain the queue. The
    /// caller gets its own navigation's outcome, or `Queued`. Entries left
    /// behind by an interrupted drain run first.
    async fn schedule(&self, navigation: Navigation) -> NavigationOutcome {
        let own = {
            let mut queue = self.inner.queue.lock();
            queue.pending.push_back(navigation);
            if queue.draining {
                tracing::debug!(pending = queue.pending.len(), "Transition in flight, navigation queued");
                return NavigationOutcome::Queued;
            }
            queue.draining = true;
            queue.pending.len() - 1
        };
        // Dropping this future mid-transition must not leave the queue
        // draining forever; anything still pending runs on the next schedule.
        scopeguard::defer! {
            let mut queue = self.inner.queue.lock();
            if queue.draining {
                queue.draining = false;
                tracing::warn!(pending = queue.pending.len(), "Navigation drain interrupted");
            }
        }

        let mut mine: Option<NavigationOutcome> = None;
        let mut ran = 0;
        loop {
            let next = {
                let mut queue = self.inner.queue.lock();
                let next = queue.pending.pop_front();
                if next.is_none() {
                    queue.draining = false;
                }
                next
            };
            let Some(navigation) = next else {
                break;
            };
            let outcome = self.run(navigation).await;
            if ran == own {
                mine = Some(outcome);
            }
            ran += 1;
        }
        mine.unwrap_or(NavigationOutcome::Queued)
    }

    async fn run(&self, navigation: Navigation) -> NavigationOutcome {
        let location = match &navigation {
            Navigation::Push(target) | Navigation::Replace(target) => {
                Location::parse(&self.inner.mode.build_url(target))
            }
            Navigation::Back => match self.inner.history.lock().previous() {
                Some(previous) => previous.clone(),
                None => return NavigationOutcome::Cancelled,
            },
            Navigation::Current => self.location(),
        };

        let outcome = self.transition(&location).await;

        if outcome.is_completed() {
            let mut history = self.inner.history.lock();
            match navigation {
                Navigation::Push(_) if history.current() != &location => history.push(location),
                Navigation::Replace(_) => history.replace(location),
                Navigation::Back => {
                    history.back();
                }
                _ => {}
            }
        }
        outcome
    }

    async fn transition(&self, location: &Location) -> NavigationOutcome {
        let path = self.inner.mode.current_path(location);
        let query = self.inner.mode.parse_query(location);

        let Some(matched) = self.match_route(&path) else {
            tracing::info!(path = %path, "No route matches");
            self.route_events()
                .emit("notfound", json!({ "path": path, "match": null, "page": null }));
            return NavigationOutcome::NotFound { path };
        };

        self.apply(RouterIntent::Begin { path: path.clone() });
        let result = {
            scopeguard::defer! {
                self.apply(RouterIntent::Finish);
            }
            self.run_stages(&path, query, &matched).await
        };

        match result {
            Ok(outcome) => outcome,
            Err(err) => self.fail(&path, &matched, err),
        }
    }

    async fn run_stages(
        &self,
        path: &str,
        mut query: crate::page::Query,
        matched: &RouteMatch,
    ) -> Result<NavigationOutcome, RouterError> {
        self.route_events()
            .emit("before", json!({ "path": path, "match": matched, "page": matched.page }));

        match self.inner.hooks.on_before_route(path, matched).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(path = %path, "Navigation cancelled by guard");
                return Ok(NavigationOutcome::Cancelled);
            }
            Err(err) => {
                return Err(RouterError::Stage {
                    path: path.to_string(),
                    stage: Stage::Guard,
                    message: format!("{:#}", err),
                })
            }
        }

        let target = self.get_or_create_page(&matched.page)?;
        let previous = self.current_page();
        let same = previous.as_ref().is_some_and(|p| p.ptr_eq(&target));
        let from = previous.as_ref().map(Page::page_name);

        self.page_events()
            .emit("before-change", json!({ "from": from, "to": matched.page, "path": path }));

        if !same {
            if let Some(previous) = &previous {
                previous
                    .on_exit()
                    .await
                    .map_err(|e| RouterError::from_view(path, Stage::Exit, e))?;
                *self.inner.active.lock() = None;
            }
        }

        if let Some(key) = self.inner.mode.reserved_key() {
            query.remove(key);
        }
        target.set_path(path);
        target
            .on_params(matched.params.clone(), query)
            .await
            .map_err(|e| RouterError::from_view(path, Stage::Params, e))?;

        if !same {
            target
                .on_enter()
                .await
                .map_err(|e| RouterError::from_view(path, Stage::Enter, e))?;
            *self.inner.active.lock() = Some(target.clone());
            target.activate();
        }

        if !target.is_rendered() || target.is_stale() {
            target
                .render(self.inner.container.as_deref())
                .await
                .map_err(|e| RouterError::from_view(path, Stage::Render, e))?;
        }
        if !target.is_mounted() {
            target
                .mount()
                .await
                .map_err(|e| RouterError::from_view(path, Stage::Mount, e))?;
        }

        self.page_events()
            .emit("changed", json!({ "from": from, "to": matched.page, "path": path }));
        self.route_events()
            .emit("after", json!({ "path": path, "match": matched, "page": matched.page }));
        tracing::info!(path = %path, page = %matched.page, "Navigation complete");

        Ok(NavigationOutcome::Completed {
            page: matched.page.clone(),
            path: path.to_string(),
        })
    }

    fn fail(&self, path: &str, matched: &RouteMatch, err: RouterError) -> NavigationOutcome {
        tracing::error!(path = %path, page = %matched.page, error = %err, "Navigation failed");
        self.inner.hooks.on_error(&err);
        self.route_events().emit(
            "error",
            json!({
                "path": path,
                "match": matched,
                "page": matched.page,
                "stage": err.stage().map(|s| s.as_str()),
                "message": err.to_string(),
            }),
        );
        NavigationOutcome::Failed(err)
    }

    /// Destroy every cached page and drop pending navigations. Only for
    /// application teardown.
    pub async fn teardown(&self) {
        self.inner.queue.lock().pending.clear();
        *self.inner.active.lock() = None;
        let pages = self.inner.pages.lock().drain();
        tracing::info!(pages = pages.len(), "Router teardown");
        for page in pages {
            page.destroy().await;
        }
    }
}
