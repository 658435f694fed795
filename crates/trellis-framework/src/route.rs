//! Route locators.
//!
//! A route locator is a URL-like path such as `/admin/user-list/show-all.json`.
//! A [`RouteParser`] turns it into a [`Request`]; string parents that are not
//! view paths go through the same parser during bubbling.

use std::sync::Arc;

use serde_json::Value;
use trellis_core::request::{CONTEXT_PARAM, LEVEL_UP_PARAM, numeric};
use trellis_core::{
    DispatchError, DispatchResult, EngineConfig, Params, Request, lcfirst, ucfirst,
};

use crate::registry::HandlerRegistry;

/// Strategy for turning a locator into a request.
pub trait RouteParser: Send + Sync {
    fn parse(&self, locator: &str, params: Params) -> DispatchResult<Request>;
}

/// The default path-based parser.
///
/// - `ctx` and `lvl` are accepted as short forms of `context` and `levelUp`
/// - the configured base path is stripped, `//` collapses and `-` reads as `_`
/// - an extension becomes the context (`page.print.html` gives `print.html`);
///   the default media also implies an unlimited level budget
/// - `/a/b/c` targets class `A\B`, method `c`; `/a` targets class `A`
///
/// With a registry attached, `/a/b` falls back to class `A\B`, method
/// `index` when `A` has no method `b`.
pub struct PathRouteParser {
    config: Arc<EngineConfig>,
    registry: Option<Arc<HandlerRegistry>>,
}

impl PathRouteParser {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    fn strip_base<'a>(&self, path: &'a str) -> &'a str {
        let base = self.config.request.base_path.as_str();
        if base.is_empty() {
            return path;
        }
        match path.strip_prefix(base) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }

    /// Applies the nested-class fallback for `/a/b` style locators.
    fn settle(&self, class: String, method: String) -> (String, String) {
        let Some(registry) = &self.registry else {
            return (class, method);
        };
        let namespace = &self.config.request.default_namespace;
        let type_name = format!("{namespace}{}", ucfirst(&class));
        if registry.has_method(&type_name, &method) {
            return (class, method);
        }

        let nested = format!("{class}\\{}", ucfirst(&method));
        let nested_type = format!("{namespace}{}", ucfirst(&nested));
        let default_method = &self.config.request.default_method;
        if registry.has_method(&nested_type, default_method)
            || (!registry.catches_all(&type_name) && registry.catches_all(&nested_type))
        {
            return (nested, default_method.clone());
        }
        (class, method)
    }
}

impl RouteParser for PathRouteParser {
    fn parse(&self, locator: &str, mut params: Params) -> DispatchResult<Request> {
        let path = if locator.contains("://") {
            url::Url::parse(locator)
                .map_err(|e| DispatchError::route(locator, e.to_string()))?
                .path()
                .to_string()
        } else {
            locator
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string()
        };

        for (short, long) in [("ctx", CONTEXT_PARAM), ("lvl", LEVEL_UP_PARAM)] {
            let has_long = params.get(long).is_some_and(|v| !v.is_null());
            if !has_long && let Some(value) = params.get(short).filter(|v| !v.is_null()).cloned() {
                params.insert(long.to_string(), value);
            }
        }

        let rooted = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        let path = collapse_slashes(self.strip_base(&rooted)).replace('-', "_");
        let PathInfo {
            dir,
            mut filename,
            extension,
        } = PathInfo::split(&path);

        let has_context = params
            .get(CONTEXT_PARAM)
            .and_then(Value::as_str)
            .is_some_and(|c| !c.is_empty());
        if has_context {
            if let Some(pos) = filename.find('.') {
                filename.truncate(pos);
            }
        } else if let Some(mut extension) = extension.filter(|e| !e.is_empty()) {
            if let Some(pos) = filename.find('.') {
                extension = format!("{}.{extension}", &filename[pos + 1..]);
                filename.truncate(pos);
            }
            let context = extension.to_lowercase();
            let level_is_numeric = params.get(LEVEL_UP_PARAM).and_then(numeric).is_some();
            if context == self.config.response.default_media && !level_is_numeric {
                params.insert(LEVEL_UP_PARAM.to_string(), Value::from(-1));
            }
            params.insert(CONTEXT_PARAM.to_string(), Value::from(context));
        }

        let request_config = &self.config.request;
        let (class, method) = match dir.as_deref() {
            Some(dir) if dir != "/" => (dir.to_string(), filename),
            _ if !filename.is_empty() => (filename, request_config.default_method.clone()),
            _ => (
                request_config.default_class.clone(),
                request_config.default_method.clone(),
            ),
        };

        let class = class_name(&class);
        let method = if method.is_empty() {
            request_config.default_method.clone()
        } else {
            method_name(&method)
        };
        if class.is_empty() || !class.chars().all(|c| c.is_alphanumeric() || c == '\\') {
            return Err(DispatchError::route(locator, "not a handler path"));
        }
        if !method.chars().all(char::is_alphanumeric) {
            return Err(DispatchError::route(locator, "not a handler method"));
        }

        let (class, method) = self.settle(class, method);
        Ok(Request::new(&class, &method, params, request_config))
    }
}

struct PathInfo {
    dir: Option<String>,
    filename: String,
    extension: Option<String>,
}

impl PathInfo {
    fn split(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        let (dir, base) = match trimmed.rfind('/') {
            Some(0) => (Some("/".to_string()), &trimmed[1..]),
            Some(i) => (Some(trimmed[..i].to_string()), &trimmed[i + 1..]),
            None => (None, trimmed),
        };
        let (filename, extension) = match base.rfind('.') {
            Some(i) => (base[..i].to_string(), Some(base[i + 1..].to_string())),
            None => (base.to_string(), None),
        };
        Self {
            dir,
            filename,
            extension,
        }
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if !(ch == '/' && out.ends_with('/')) {
            out.push(ch);
        }
    }
    out
}

/// `/admin/user_list` becomes `Admin\UserList`.
fn class_name(raw: &str) -> String {
    raw.split('/')
        .filter(|segment| !segment.is_empty())
        .map(camel)
        .collect::<Vec<_>>()
        .join("\\")
}

/// `show_all` becomes `showAll`.
fn method_name(raw: &str) -> String {
    lcfirst(&camel(raw))
}

fn camel(raw: &str) -> String {
    raw.split('_').map(ucfirst).collect()
}
