//! Application wiring.
//!
//! A [`TrellisApp`] holds everything that outlives a single request: the
//! engine configuration, the handler registry, the shared signature cache,
//! plugins, parent finders and the renderer. Each call to
//! [`handle`](TrellisApp::handle) runs a fresh [`Dispatcher`] and renders
//! the resulting tree as a page.
//!
//! ```rust,ignore
//! use trellis_runtime::TrellisApp;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register::<Index>("App\\Index");
//!
//! let app = TrellisApp::load(registry)?.plugin(Arc::new(Audit::default()));
//! let page = app.handle_url("/users/show.json?id=3", Params::new(), None);
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{Level, error, info, span};
use trellis_core::{CacheBackend, EngineConfig, Params, Request, SignatureCache};
use trellis_framework::{
    Dispatcher, HandlerRegistry, ParentFinder, Plugin, RenderOutput, Renderer, RouteParser,
    ViewEngine, ViewLocator,
};

use crate::config::{ConfigLoader, TrellisConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// A configured Trellis application.
pub struct TrellisApp {
    config: Arc<EngineConfig>,
    registry: Arc<HandlerRegistry>,
    signatures: Arc<SignatureCache>,
    router: Option<Arc<dyn RouteParser>>,
    plugins: Vec<Arc<dyn Plugin>>,
    parent_finders: Vec<Arc<dyn ParentFinder>>,
    renderer: Renderer,
}

impl TrellisApp {
    /// Creates an application from an engine configuration, without
    /// validating it or touching logging.
    pub fn new(config: EngineConfig, registry: HandlerRegistry) -> Self {
        let config = Arc::new(config);
        Self {
            signatures: Arc::new(SignatureCache::from_config(&config.cache)),
            renderer: Renderer::new(config.clone()),
            config,
            registry: Arc::new(registry),
            router: None,
            plugins: Vec::new(),
            parent_finders: Vec::new(),
        }
    }

    /// Validates `config`, initializes logging from it and creates the
    /// application.
    pub fn from_config(config: &TrellisConfig, registry: HandlerRegistry) -> RuntimeResult<Self> {
        validate_config(config)?;
        logging::init_from_config(&config.logging);
        info!(
            namespace = %config.engine.request.default_namespace,
            views = %config.engine.response.view_directory,
            handlers = registry.len(),
            cache = config.engine.cache.enabled,
            "Trellis application configured"
        );
        Ok(Self::new(config.engine.clone(), registry))
    }

    /// Loads configuration from the current directory and the environment.
    pub fn load(registry: HandlerRegistry) -> RuntimeResult<Self> {
        let config = ConfigLoader::new().with_current_dir().load()?;
        Self::from_config(&config, registry)
    }

    /// Stores signatures in `backend` as well as in memory.
    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.signatures = Arc::new(SignatureCache::from_config(&self.config.cache).with_backend(backend));
        self
    }

    pub fn with_router(mut self, router: Arc<dyn RouteParser>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn parent_finder(mut self, finder: Arc<dyn ParentFinder>) -> Self {
        self.parent_finders.push(finder);
        self
    }

    pub fn view_locator(mut self, locator: Arc<dyn ViewLocator>) -> Self {
        self.renderer.add_locator(locator);
        self
    }

    pub fn view_engine(mut self, engine: Arc<dyn ViewEngine>) -> Self {
        self.renderer = self.renderer.with_engine(engine);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn signatures(&self) -> &SignatureCache {
        &self.signatures
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Creates a dispatcher sharing this application's registry, cache,
    /// plugins and parent finders.
    pub fn dispatcher(&self) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(self.config.clone(), self.registry.clone())
            .with_signatures(self.signatures.clone());
        if let Some(router) = &self.router {
            dispatcher = dispatcher.with_router(router.clone());
        }
        for plugin in &self.plugins {
            dispatcher.add_plugin(plugin.clone());
        }
        for finder in &self.parent_finders {
            dispatcher.add_parent_finder(finder.clone());
        }
        dispatcher
    }

    /// Dispatches `request` and renders the composed page with headers.
    ///
    /// Capture bins are emptied first; concurrent calls on one application
    /// share them.
    pub fn handle(&self, request: Request, callback: Option<&str>) -> RenderOutput {
        let span = span!(Level::DEBUG, "handle", handler = %request.handler());
        let _enter = span.enter();

        self.renderer.capture().clear();
        let root = self.dispatcher().run(Some(request));
        self.renderer.render_page(&root, callback)
    }

    /// Routes `locator` and handles the resulting request. A locator that
    /// cannot be routed renders the exception response.
    pub fn handle_url(&self, locator: &str, params: Params, callback: Option<&str>) -> RenderOutput {
        let dispatcher = self.dispatcher();
        match dispatcher.router().parse(locator, params) {
            Ok(request) => self.handle(request, callback),
            Err(err) => {
                error!(locator, error = %err, "cannot route request");
                self.renderer.capture().clear();
                let response = dispatcher.exception_response(&err, None);
                self.renderer.render_page(&response, callback)
            }
        }
    }
}

impl fmt::Debug for TrellisApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrellisApp")
            .field("registry", &self.registry)
            .field("signatures", &self.signatures)
            .field("plugins", &self.plugins.len())
            .field("parent_finders", &self.parent_finders.len())
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use trellis_core::{DispatchResult, MemoryCache};
    use trellis_framework::{Args, Body, Context, Controller, MethodMeta, Outcome, Status, TypeMeta};

    #[derive(Default)]
    struct Users;

    impl Controller for Users {
        fn describe() -> TypeMeta {
            TypeMeta::new()
                .parent("")
                .method(MethodMeta::new("show").param(
                    trellis_framework::ParamMeta::new("id").default(json!(0)).filter("int(min=1)"),
                ))
        }

        fn invoke(&mut self, _method: &str, args: Args, _cx: &mut Context<'_>) -> DispatchResult<Outcome> {
            Ok(json!({ "id": args.value("id").cloned(), "bad": args.has_error() }).into())
        }
    }

    fn app(views: &std::path::Path) -> TrellisApp {
        let mut config = TrellisConfig::default();
        config.engine.request.default_namespace = "App\\".into();
        config.engine.response.view_directory = views.display().to_string();
        config.engine.response.exception_view = "error.tpl".into();

        let mut registry = HandlerRegistry::new();
        registry.register::<Users>("App\\Users");
        TrellisApp::from_config(&config, registry).unwrap()
    }

    fn body(output: &RenderOutput) -> Value {
        match &output.body {
            Body::Text(text) => serde_json::from_str(text).unwrap(),
            Body::Data(map) => Value::Object(map.clone()),
        }
    }

    #[test]
    fn test_handle_url_json() {
        let views = tempfile::tempdir().unwrap();
        let app = app(views.path());

        let output = app.handle_url("/users/show.json", json!({"id": "7"}).as_object().cloned().unwrap(), None);
        assert_eq!(body(&output), json!({"id": 7, "bad": false}));

        let output = app.handle_url("/users/show.json?id=x", json!({"id": "x"}).as_object().cloned().unwrap(), None);
        assert_eq!(body(&output), json!({"id": false, "bad": true}));
    }

    #[test]
    fn test_unroutable_locator_renders_exception_view() {
        let views = tempfile::tempdir().unwrap();
        std::fs::write(views.path().join("error.html.tpl"), "{{ errMsg }}").unwrap();
        let app = app(views.path());

        let output = app.handle_url("/users/sh ow", Params::new(), None);
        assert!(output.body.as_text().unwrap().starts_with("cannot route"));
        assert_eq!(output.status, None);

        let output = app.handle_url("/nobody", Params::new(), None);
        assert_eq!(output.body.as_text(), Some("\"App\\Nobody\" controller does not exist."));
    }

    #[test]
    fn test_missing_view_is_not_implemented() {
        let views = tempfile::tempdir().unwrap();
        let app = app(views.path());
        let output = app.handle(Request::new("Users", "show", Params::new(), &app.config().request), None);
        assert_eq!(output.status, Some(Status::NotImplemented));
    }

    #[test]
    fn test_cache_backend_is_shared_across_requests() {
        let views = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryCache::new());
        let app = app(views.path()).with_cache_backend(backend.clone());

        app.handle_url("/users/show.json", Params::new(), None);
        app.handle_url("/users/show.json", Params::new(), None);

        assert_eq!(backend.len(), 1);
        let stats = app.signatures().stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.hits, 1);
    }
}
