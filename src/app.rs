//! Explicitly constructed application context.
//!
//! The [`App`] owns everything that would otherwise be ambient: the shared
//! event bus, the template registry, the REST transport and the router.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::data::{Collection, DataError, HttpTransport, Model, ModelDef, RestTransport};
use crate::events::EventBus;
use crate::router::{mode_for, Router, RouterHooks};
use crate::view::{DirTemplates, MemoryTemplates, TemplateRegistry, TemplateSource, View, ViewDef};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build REST transport: {0}")]
    Transport(#[from] DataError),
}

pub struct AppBuilder {
    config: Config,
    transport: Option<Arc<dyn RestTransport>>,
    template_source: Option<Arc<dyn TemplateSource>>,
    router_hooks: Option<Arc<dyn RouterHooks>>,
}

impl AppBuilder {
    /// Use `transport` instead of an [`HttpTransport`] built from `[api]`.
    pub fn transport(mut self, transport: Arc<dyn RestTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Load named templates from `source` instead of `[templates] dir`.
    pub fn template_source(mut self, source: Arc<dyn TemplateSource>) -> Self {
        self.template_source = Some(source);
        self
    }

    pub fn router_hooks(mut self, hooks: Arc<dyn RouterHooks>) -> Self {
        self.router_hooks = Some(hooks);
        self
    }

    pub fn build(self) -> Result<App, AppError> {
        self.config.validate()?;
        let config = self.config;

        let bus = EventBus::with_max_listeners(config.events.max_listeners);

        let source: Arc<dyn TemplateSource> = match (self.template_source, &config.templates.dir) {
            (Some(source), _) => source,
            (None, Some(dir)) => Arc::new(DirTemplates::new(dir.clone())),
            (None, None) => Arc::new(MemoryTemplates::new()),
        };
        let templates = TemplateRegistry::new(source);

        let transport: Arc<dyn RestTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config.api)?),
        };

        let mut router = Router::builder(mode_for(&config.router))
            .bus(bus.clone())
            .templates(templates.clone())
            .container(config.router.root_container.clone())
            .initial_path(&config.router.initial_path);
        if let Some(hooks) = self.router_hooks {
            router = router.hooks(hooks);
        }
        let router = router.build();

        tracing::info!(
            mode = ?config.router.mode,
            container = %config.router.root_container,
            api = %config.api.base_url,
            "Application context built"
        );

        Ok(App {
            config,
            bus,
            templates,
            transport,
            router,
        })
    }
}

pub struct App {
    config: Config,
    bus: EventBus,
    templates: TemplateRegistry,
    transport: Arc<dyn RestTransport>,
    router: Router,
}

impl App {
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder {
            config,
            transport: None,
            template_source: None,
            router_hooks: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn transport(&self) -> &Arc<dyn RestTransport> {
        &self.transport
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// A view sharing the app's bus and templates.
    pub fn view(&self, def: ViewDef) -> View {
        View::with_context(def, self.bus.clone(), self.templates.clone())
    }

    pub fn model(&self, def: &Arc<ModelDef>, attributes: Value) -> Model {
        Model::new(def.clone(), self.transport.clone(), attributes)
    }

    pub fn collection(&self, def: &Arc<ModelDef>) -> Collection {
        Collection::new(def.clone(), self.transport.clone())
    }

    /// Destroy every page and drop every bus listener.
    pub async fn teardown(&self) {
        self.router.teardown().await;
        self.bus.clear();
        tracing::info!("Application context torn down");
    }
}
