//! Request dispatcher for the Trellis framework.
//!
//! The [`Dispatcher`] drains a FIFO queue of requests, runs each through the
//! plugin hooks and its controller, then climbs the parent chain of the last
//! response until it reaches a root.
//!
//! # Dispatch run
//!
//! 1. Enqueue the initial request, if given
//! 2. Run every plugin's `application_entry` hook
//! 3. For each queued request: `class_entry` hooks, controller, `class_exit`
//!    hooks. The first failure becomes the exception response and the rest
//!    of the queue is left unprocessed
//! 4. Run every plugin's `application_exit` hook with the last response
//! 5. Bubble the last response up through its parents
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_framework::{Dispatcher, HandlerRegistry};
//!
//! let mut dispatcher = Dispatcher::new(config, Arc::new(registry));
//! dispatcher.add_plugin(Arc::new(AuditPlugin::default()));
//!
//! let response = dispatcher.run(Some(request));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{Level, debug, error, span, warn};
use trellis_core::request::{CONTEXT_PARAM, LEVEL_UP_PARAM};
use trellis_core::response::has_view_suffix;
use trellis_core::{
    DEFAULT_CONTENT_KEY, Data, DispatchError, DispatchResult, EngineConfig, LEVEL_UNLIMITED, Params,
    Parent, Request, Response, SignatureCache,
};

use crate::context::Context;
use crate::controller::Outcome;
use crate::finder::ParentFinder;
use crate::plugin::Plugin;
use crate::registry::HandlerRegistry;
use crate::resolver::ParameterResolver;
use crate::route::{PathRouteParser, RouteParser};

/// The central request dispatcher.
pub struct Dispatcher {
    config: Arc<EngineConfig>,
    registry: Arc<HandlerRegistry>,
    signatures: Arc<SignatureCache>,
    router: Arc<dyn RouteParser>,
    parent_finders: Vec<Arc<dyn ParentFinder>>,
    plugins: Vec<Arc<dyn Plugin>>,
    queue: VecDeque<Request>,
}

impl Dispatcher {
    /// Creates a dispatcher with a cache built from `config` and the
    /// default path route parser.
    pub fn new(config: Arc<EngineConfig>, registry: Arc<HandlerRegistry>) -> Self {
        let signatures = Arc::new(SignatureCache::from_config(&config.cache));
        let router = Arc::new(PathRouteParser::new(config.clone()).with_registry(registry.clone()));
        Self {
            config,
            registry,
            signatures,
            router,
            parent_finders: Vec::new(),
            plugins: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    /// Shares a signature cache with other dispatchers.
    pub fn with_signatures(mut self, signatures: Arc<SignatureCache>) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn with_router(mut self, router: Arc<dyn RouteParser>) -> Self {
        self.router = router;
        self
    }

    /// Adds a plugin. Hooks run in the order plugins are added.
    pub fn add_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        debug!(plugin = %plugin.name(), "adding plugin");
        self.plugins.push(plugin);
    }

    /// Adds a plugin (builder pattern).
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.add_plugin(plugin);
        self
    }

    /// Adds a parent finder, consulted after those added before it.
    pub fn add_parent_finder(&mut self, finder: Arc<dyn ParentFinder>) {
        self.parent_finders.push(finder);
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

    pub fn router(&self) -> &dyn RouteParser {
        self.router.as_ref()
    }

    /// Appends a request to the queue.
    pub fn submit(&mut self, request: Request) {
        debug!(handler = %request.handler(), queued = self.queue.len() + 1, "request queued");
        self.queue.push_back(request);
    }

    /// Number of requests waiting to be processed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    // ─── Run ───────────────────────────────────────────────────────────────

    /// Drains the queue and returns the root of the composed response tree.
    pub fn run(&mut self, initial: Option<Request>) -> Response {
        if let Some(request) = initial {
            self.submit(request);
        }
        let span = span!(Level::DEBUG, "dispatch", queued = self.queue.len());
        let _enter = span.enter();

        for plugin in self.plugins.clone() {
            plugin.application_entry(self);
        }

        let mut last: Option<(Response, Request)> = None;
        while let Some(mut request) = self.queue.pop_front() {
            match self.process_with_hooks(&mut request, Data::new()) {
                Ok(response) => last = Some((response, request)),
                Err(err) => {
                    error!(handler = %request.handler(), error = %err, "request failed, dropping {} queued", self.queue.len());
                    let response = self.exception_response(&err, Some(&request));
                    self.queue.clear();
                    last = Some((response, request));
                    break;
                }
            }
        }

        let (mut response, request) = match last {
            Some(last) => last,
            None => {
                warn!("dispatcher ran with an empty queue");
                let request = Request::default_for(Params::new(), &self.config.request);
                (self.exception_response(&DispatchError::EmptyQueue, Some(&request)), request)
            }
        };

        for plugin in self.plugins.clone() {
            plugin.application_exit(&mut response, self);
        }

        self.bubble(response, request)
    }

    /// Runs class hooks around [`process_request`](Self::process_request).
    pub fn process_with_hooks(&mut self, request: &mut Request, seed: Data) -> DispatchResult<Response> {
        for plugin in self.plugins.clone() {
            plugin.class_entry(request, self)?;
        }
        let mut response = self.process_request(request, seed)?;
        for plugin in self.plugins.clone() {
            plugin.class_exit(&mut response, self)?;
        }
        Ok(response)
    }

    /// Resolves and invokes the handler for `request`.
    ///
    /// Non-empty `seed` data becomes the initial response data, and the
    /// events of nodes it holds are copied onto the new response.
    pub fn process_request(&mut self, request: &Request, seed: Data) -> DispatchResult<Response> {
        let span = span!(Level::DEBUG, "process", handler = %request.handler());
        let _enter = span.enter();

        let type_name = request.type_name();
        let handler = self
            .registry
            .handler(&type_name)
            .ok_or(DispatchError::HandlerNotFound { handler: type_name })?;
        let resolved =
            ParameterResolver::new(&self.config, &self.registry, &self.signatures, &self.parent_finders)
                .resolve(&handler, request)?;

        let mut response = Response::from_request(request, &self.config);
        if !seed.is_empty() {
            let inherited: Vec<_> = seed.nodes().map(|node| node.events.clone()).collect();
            for events in &inherited {
                response.events.merge(events);
            }
            response.data = seed;
        }
        response.parent = resolved.parent;

        let mut controller = handler.create();
        let mut cx = Context::new(self, request, response);
        controller.init(&mut cx)?;
        let outcome = controller.invoke(request.method(), resolved.args, &mut cx)?;
        let mut response = cx.into_response();

        match outcome {
            Outcome::Empty => {}
            Outcome::Data(data) if response.data.is_empty() => response.data = data,
            Outcome::Data(data) => response.data.merge(data),
            Outcome::Response(replacement) => response = replacement,
        }
        debug!(context = ?response.context(), level_up = response.level_up, "request processed");
        Ok(response)
    }

    // ─── Bubbling ──────────────────────────────────────────────────────────

    fn bubble(&mut self, mut response: Response, request: Request) -> Response {
        let max_depth = self.config.max_bubble_depth;
        let mut history = vec![request];
        let mut steps = 0;

        while response.can_climb() && !response.parent.is_none() {
            if max_depth > 0 && steps >= max_depth {
                warn!(steps, "bubble depth limit reached, keeping current node as root");
                break;
            }
            steps += 1;

            let level = response.level_up;
            let context = response.context().map(str::to_owned);
            let (target, content_key) = match std::mem::take(&mut response.parent) {
                Parent::None => break,
                Parent::Node(node) => (Target::Node(node), DEFAULT_CONTENT_KEY.to_string()),
                Parent::Request(parent) => (Target::Request(parent), DEFAULT_CONTENT_KEY.to_string()),
                Parent::Named(name) => (Target::Named(name), DEFAULT_CONTENT_KEY.to_string()),
                Parent::Keyed {
                    target,
                    content_key,
                } => (Target::Named(target), content_key),
            };

            let mut terminal = false;
            let next = match target {
                Target::Node(node) => {
                    debug!(step = steps, "embedding into parent node");
                    Ok(adopt(*node, response, &content_key, context.as_deref()))
                }
                Target::Request(parent) => {
                    self.climb(*parent, response, &content_key, level, context.as_deref(), &mut history)
                }
                Target::Named(name) => match self.terminal_node(&name) {
                    Some(node) => {
                        debug!(step = steps, parent = %name, "embedding into terminal parent");
                        terminal = true;
                        Ok(adopt(node, response, &content_key, context.as_deref()))
                    }
                    None => match self.router.parse(&name, Params::new()) {
                        Ok(parent) => {
                            self.climb(parent, response, &content_key, level, context.as_deref(), &mut history)
                        }
                        Err(err) => Err(err),
                    },
                },
            };

            match next {
                Ok(node) => response = node,
                Err(err) => {
                    error!(error = %err, "parent request failed");
                    response = self.exception_response(&err, history.last());
                    break;
                }
            }
            if terminal {
                break;
            }
        }
        response
    }

    /// Builds the node for `"json"` or a view path; `None` for route locators.
    fn terminal_node(&self, name: &str) -> Option<Response> {
        let is_terminal = name == "json" || has_view_suffix(name, &self.config.response.view_suffix);
        if !is_terminal {
            return None;
        }
        Response::for_target(name, Data::new(), None, &self.config)
    }

    fn climb(
        &mut self,
        mut parent: Request,
        child: Response,
        content_key: &str,
        level: i64,
        context: Option<&str>,
        history: &mut Vec<Request>,
    ) -> DispatchResult<Response> {
        debug!(parent = %parent.handler(), level, "climbing to parent request");
        if !parent.has_param(CONTEXT_PARAM)
            && let Some(context) = context
        {
            parent
                .params_mut()
                .insert(CONTEXT_PARAM.to_string(), Value::from(context));
        }
        if !parent.has_param(LEVEL_UP_PARAM) {
            parent
                .params_mut()
                .insert(LEVEL_UP_PARAM.to_string(), Value::from(next_level(level)));
        }

        parent.set_history(std::mem::take(history));
        let mut seed = Data::new();
        seed.set(content_key, child);
        let result = self.process_with_hooks(&mut parent, seed);
        *history = parent.take_history();
        history.push(parent);
        result
    }

    // ─── Failures ──────────────────────────────────────────────────────────

    /// Builds the response shown for a failed run.
    pub fn exception_response(&self, err: &DispatchError, request: Option<&Request>) -> Response {
        let mut data = Data::new();
        data.set("success", Value::Bool(false));
        data.set("errMsg", Value::from(err.to_string()));

        let view = &self.config.response.exception_view;
        if let Some(response) = Response::for_target(view, data.clone(), request, &self.config) {
            return response;
        }
        warn!(view = %view, "exception view is not a view path, answering with json");
        let mut response = match request {
            Some(request) => Response::from_request(request, &self.config),
            None => Response::with_context(None, &self.config),
        };
        response.data = data;
        response.set_context(Some("json"));
        response
    }
}

/// A parent with its content key split off.
enum Target {
    Node(Box<Response>),
    Request(Box<Request>),
    Named(String),
}

/// Budget handed to a parent request that sets none.
fn next_level(level: i64) -> i64 {
    match level {
        LEVEL_UNLIMITED => LEVEL_UNLIMITED,
        n if n > 0 => n - 1,
        _ => 0,
    }
}

/// Embeds `child` into `parent` when the parent has no data yet, and passes
/// on the child's context when the parent has none.
fn adopt(mut parent: Response, child: Response, content_key: &str, context: Option<&str>) -> Response {
    if parent.data.is_empty() {
        parent.data.set(content_key, child);
    }
    if parent.context().is_none() {
        parent.set_context(context);
    }
    parent
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plugins: Vec<_> = self.plugins.iter().map(|p| p.name().to_string()).collect();
        f.debug_struct("Dispatcher")
            .field("plugins", &plugins)
            .field("parent_finders", &self.parent_finders.len())
            .field("queued", &self.queue.len())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
