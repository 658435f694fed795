//! Invocation context handed to controllers.
//!
//! A [`Context`] owns the response being built for the current request and
//! borrows the dispatcher, so controllers can record events, run nested
//! handlers, queue follow-up requests and build URLs while they work.

use serde_json::Value;
use trellis_core::request::CONTEXT_PARAM;
use trellis_core::response::has_view_suffix;
use trellis_core::{
    Data, DispatchError, DispatchResult, EngineConfig, Event, Format, Params, Request, Response,
    to_url_form,
};

use crate::dispatcher::Dispatcher;

/// The per-request view a controller works through.
pub struct Context<'a> {
    dispatcher: &'a mut Dispatcher,
    request: &'a Request,
    response: Response,
}

impl<'a> Context<'a> {
    pub(crate) fn new(dispatcher: &'a mut Dispatcher, request: &'a Request, response: Response) -> Self {
        Self {
            dispatcher,
            request,
            response,
        }
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Replaces the response being built.
    pub fn set_response(&mut self, response: Response) {
        self.response = response;
    }

    pub fn config(&self) -> &EngineConfig {
        self.dispatcher.config()
    }

    pub fn dispatcher(&mut self) -> &mut Dispatcher {
        self.dispatcher
    }

    pub fn is_post(&self) -> bool {
        self.request.is_post()
    }

    /// The error a catch-all controller returns for a method it cannot serve.
    pub fn method_not_found(&self, method: &str) -> DispatchError {
        DispatchError::MethodNotFound {
            handler: self.request.type_name(),
            method: method.to_string(),
        }
    }

    // ─── Events ────────────────────────────────────────────────────────────

    /// Records an event on the current response, bound to this handler.
    pub fn trigger(&mut self, kind: impl Into<String>, params: Params) {
        let event = Event::new(kind, params).with_source(self.request.handler().clone());
        self.response.events.trigger(event);
    }

    /// Delivers pending events of `kind` on the current response.
    pub fn listen<F>(&mut self, kind: &str, listener: F) -> usize
    where
        F: FnMut(&mut Event) -> Value,
    {
        self.response.events.listen(kind, listener)
    }

    // ─── Nested dispatch ───────────────────────────────────────────────────

    fn inherit_context(&self, params: &mut Params) {
        let unset = params.get(CONTEXT_PARAM).is_none_or(Value::is_null);
        if unset && let Some(context) = self.response.context() {
            params.insert(CONTEXT_PARAM.to_string(), Value::from(context));
        }
    }

    /// Runs another handler method now, without plugin hooks.
    ///
    /// `class` defaults to the current class. The current context is passed
    /// on unless `params` sets one, and the nested response's events are
    /// appended to the current response.
    pub fn call(&mut self, method: &str, class: Option<&str>, mut params: Params) -> DispatchResult<Response> {
        self.inherit_context(&mut params);
        let current = self.request;
        let class = class.unwrap_or(current.class());
        let request = Request::new(class, method, params, &self.config().request);
        let response = self.dispatcher.process_request(&request, Data::new())?;
        self.response.events.merge(&response.events);
        Ok(response)
    }

    /// Routes `locator` and runs it now, with plugin hooks.
    pub fn call_route(&mut self, locator: &str, mut params: Params) -> DispatchResult<Response> {
        self.inherit_context(&mut params);
        let mut request = self.dispatcher.router().parse(locator, params)?;
        let response = self.dispatcher.process_with_hooks(&mut request, Data::new())?;
        self.response.events.merge(&response.events);
        Ok(response)
    }

    /// Queues another handler method to run after the current one.
    pub fn forward(&mut self, method: &str, class: Option<&str>, mut params: Params) {
        self.inherit_context(&mut params);
        let current = self.request;
        let class = class.unwrap_or(current.class());
        let request = Request::new(class, method, params, &self.config().request);
        self.dispatcher.submit(request);
    }

    /// Queues an already built request, passing on the current context.
    pub fn forward_request(&mut self, mut request: Request) {
        self.inherit_context(request.params_mut());
        self.dispatcher.submit(request);
    }

    /// Wraps `data` in a node for a view path, a format name, or a route.
    ///
    /// `context` of `None` inherits the current context; `Some("")` asks
    /// for none. Route targets are processed at once, with plugin hooks,
    /// using the plain values of `data` as parameters.
    pub fn as_response(&mut self, target: &str, data: Data, context: Option<&str>) -> DispatchResult<Response> {
        let context = match context {
            Some(context) => Some(context).filter(|c| !c.is_empty()),
            None => self.response.context(),
        };
        let mut params = Params::new();
        if let Some(context) = context {
            params.insert(CONTEXT_PARAM.to_string(), Value::from(context));
        }

        let config = self.config();
        let is_node = Format::from_context(&target.to_lowercase()).is_some()
            || has_view_suffix(target, &config.response.view_suffix);
        if is_node {
            let request = Request::default_for(params, &config.request);
            return Response::for_target(target, data, Some(&request), config)
                .ok_or_else(|| DispatchError::route(target, "not a view path"));
        }

        for (key, slot) in data {
            if let Some(value) = slot.as_value() {
                params.entry(key).or_insert_with(|| value.clone());
            }
        }
        let mut request = self.dispatcher.router().parse(target, params)?;
        self.dispatcher.process_with_hooks(&mut request, Data::new())
    }

    // ─── URLs ──────────────────────────────────────────────────────────────

    /// Builds the URL of a handler method.
    ///
    /// The URL is absolute when a host is configured. Query values that are
    /// not strings, numbers or booleans are JSON-encoded.
    pub fn url_for(&self, method: &str, class: Option<&str>, params: &Params) -> String {
        let request_config = &self.config().request;
        let mut url = match &request_config.host {
            Some(host) => {
                let scheme = if request_config.enable_https == Some(true) {
                    "https"
                } else {
                    "http"
                };
                format!("{scheme}://{host}")
            }
            None => String::new(),
        };
        url.push_str(&request_config.base_path);
        url.push('/');
        url.push_str(&to_url_form(class.unwrap_or(self.request.class())));
        if !method.is_empty() {
            url.push('/');
            url.push_str(&to_url_form(method));
        }
        if !params.is_empty() {
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in params {
                match value {
                    Value::Null => query.append_key_only(key),
                    Value::String(s) => query.append_pair(key, s),
                    Value::Bool(b) => query.append_pair(key, if *b { "1" } else { "0" }),
                    other => query.append_pair(key, &other.to_string()),
                };
            }
            url.push('?');
            url.push_str(&query.finish());
        }
        url
    }
}
