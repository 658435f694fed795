//! Rendering of response trees.
//!
//! The [`Renderer`] turns a response node into output. Nested nodes in the
//! node's data (directly under a key or one level down in a list) are
//! rendered first and replaced by their output.
//!
//! | context      | output                                                    |
//! |--------------|-----------------------------------------------------------|
//! | `json`       | JSON text for a root or header render, else the data map  |
//! | `raw`        | JSON text                                                 |
//! | `javascript` | JSON text, wrapped as `callback(...);` when a callback is given |
//! | other        | the located view, executed by the view engine             |

mod capture;
mod view;

pub use capture::{CAPTURE_SEPARATOR, CaptureBins};
pub use view::{DirectoryLocator, PlaceholderEngine, ViewEngine, ViewLocator};

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{Level, debug, error, span};
use trellis_core::{Data, EngineConfig, Format, Item, Response, Slot, ViewLocation};

/// Text returned in place of a view that cannot be found or executed.
pub const VIEW_NOT_FOUND: &str = "View file not found.";

// ============================================================================
// Output types
// ============================================================================

/// Options of one render call.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// The node is the root of the tree.
    pub root: bool,
    /// The caller will send the content type and status.
    pub headers: bool,
    /// JSONP callback name for `javascript` output.
    pub callback: Option<String>,
}

impl RenderOptions {
    /// Root render with headers, as for a whole page.
    pub fn page() -> Self {
        Self {
            root: true,
            headers: true,
            callback: None,
        }
    }

    /// Root render without headers.
    pub fn root() -> Self {
        Self {
            root: true,
            ..Self::default()
        }
    }

    /// Render of a node embedded in another.
    pub fn nested() -> Self {
        Self::default()
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }
}

/// Rendered body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    /// Unserialized data of a nested `json` node, for the parent to embed.
    Data(Map<String, Value>),
}

impl Body {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Data(_) => None,
        }
    }

    /// The body as text; data maps are serialized.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Data(map) => Value::Object(map).to_string(),
        }
    }

    /// The value a parent node embeds.
    pub fn into_value(self) -> Value {
        match self {
            Self::Text(text) => Value::String(text),
            Self::Data(map) => Value::Object(map),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Javascript,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json; charset=utf-8",
            Self::Javascript => "application/javascript; charset=utf-8",
        }
    }
}

/// Non-success status a header render asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    BadRequest,
    InternalServerError,
    NotImplemented,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub body: Body,
    pub content_type: Option<ContentType>,
    pub status: Option<Status>,
}

impl RenderOutput {
    fn text(text: impl Into<String>) -> Self {
        Self {
            body: Body::Text(text.into()),
            content_type: None,
            status: None,
        }
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Renders response nodes through a view locator chain and a view engine.
pub struct Renderer {
    config: Arc<EngineConfig>,
    locators: Vec<Arc<dyn ViewLocator>>,
    engine: Arc<dyn ViewEngine>,
    capture: CaptureBins,
}

impl Renderer {
    /// Creates a renderer using the [`PlaceholderEngine`].
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            locators: Vec::new(),
            engine: Arc::new(PlaceholderEngine),
            capture: CaptureBins::new(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn ViewEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Adds a locator, tried after those added before it and before the
    /// default view path.
    pub fn add_locator(&mut self, locator: Arc<dyn ViewLocator>) {
        self.locators.push(locator);
    }

    pub fn with_locator(mut self, locator: Arc<dyn ViewLocator>) -> Self {
        self.add_locator(locator);
        self
    }

    /// Capture bins shared by all views of this renderer.
    pub fn capture(&self) -> &CaptureBins {
        &self.capture
    }

    /// Renders a whole page: a root render with headers.
    pub fn render_page(&self, response: &Response, callback: Option<&str>) -> RenderOutput {
        let mut options = RenderOptions::page();
        options.callback = callback.map(str::to_owned);
        self.render(response, &options)
    }

    /// Renders a view path with `data` and returns the text, for views that
    /// include other views.
    pub fn include_view(&self, target: &str, data: Data) -> String {
        match Response::for_target(target, data, None, &self.config) {
            Some(node) => self.render(&node, &RenderOptions::nested()).body.into_text(),
            None => {
                error!(view = %target, "include target is not a view path");
                VIEW_NOT_FOUND.to_string()
            }
        }
    }

    /// Renders one node.
    pub fn render(&self, response: &Response, options: &RenderOptions) -> RenderOutput {
        let span = span!(Level::DEBUG, "render", context = ?response.context(), root = options.root);
        let _enter = span.enter();

        let data = self.resolve_data(&response.data);
        match response.format() {
            Some(Format::Json) => {
                if !(options.root || options.headers) {
                    return RenderOutput {
                        body: Body::Data(data),
                        content_type: None,
                        status: None,
                    };
                }
                let mut output = RenderOutput::text(Value::Object(data).to_string());
                if options.headers {
                    output.content_type = Some(ContentType::Json);
                }
                output
            }
            Some(Format::Raw) => RenderOutput::text(Value::Object(data).to_string()),
            Some(Format::Javascript) => self.render_script(data, options),
            None => self.render_view(response.view(), data, options),
        }
    }

    fn render_script(&self, data: Map<String, Value>, options: &RenderOptions) -> RenderOutput {
        let body = Value::Object(data).to_string();
        let callback = options.callback.as_deref().filter(|c| !c.is_empty());
        let mut output = match callback {
            Some(callback) if !is_word(callback) => {
                error!(callback, "rejecting callback with non-word characters");
                return RenderOutput {
                    body: Body::Text(String::new()),
                    content_type: None,
                    status: Some(Status::BadRequest),
                };
            }
            Some(callback) => RenderOutput::text(format!("{callback}({body});")),
            None => RenderOutput::text(body),
        };
        if options.headers {
            output.content_type = Some(ContentType::Javascript);
        }
        output
    }

    fn render_view(&self, location: &ViewLocation, data: Map<String, Value>, options: &RenderOptions) -> RenderOutput {
        let failure_status = |status| (options.root && options.headers).then_some(status);

        let Some(path) = self.locate(location) else {
            error!(path = %location.default_path().display(), "view file not found");
            let mut output = RenderOutput::text(VIEW_NOT_FOUND);
            output.status = failure_status(Status::NotImplemented);
            return output;
        };

        debug!(path = %path.display(), "rendering view");
        match self.engine.render(&path, &data, &self.capture) {
            Ok(text) => RenderOutput::text(text),
            Err(err) => {
                error!(error = %err, "view failed to render");
                let mut output = RenderOutput::text(VIEW_NOT_FOUND);
                output.status = failure_status(Status::InternalServerError);
                output
            }
        }
    }

    /// Runs the locator chain, then falls back to the conventional path.
    pub fn locate(&self, location: &ViewLocation) -> Option<PathBuf> {
        self.locators
            .iter()
            .find_map(|locator| locator.locate(location))
            .or_else(|| {
                let path = location.default_path();
                path.is_file().then_some(path)
            })
    }

    fn resolve_data(&self, data: &Data) -> Map<String, Value> {
        data.iter()
            .map(|(key, slot)| {
                let value = match slot {
                    Slot::Value(value) => value.clone(),
                    Slot::Node(node) => self.embed(node),
                    Slot::Source(source) => self.embed(&source.response()),
                    Slot::List(items) => Value::Array(
                        items
                            .iter()
                            .map(|item| match item {
                                Item::Value(value) => value.clone(),
                                Item::Node(node) => self.embed(node),
                                Item::Source(source) => self.embed(&source.response()),
                            })
                            .collect(),
                    ),
                };
                (key.to_string(), value)
            })
            .collect()
    }

    fn embed(&self, node: &Response) -> Value {
        self.render(node, &RenderOptions::nested()).body.into_value()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("locators", &self.locators.len())
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

fn is_word(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(views: &std::path::Path) -> Arc<EngineConfig> {
        let mut config = EngineConfig::default();
        config.response.view_directory = views.display().to_string();
        Arc::new(config)
    }

    fn node(context: &str, data: Value, config: &EngineConfig) -> Response {
        let mut response = Response::with_context(Some(context), config);
        response.data = Data::from_value(data);
        response
    }

    #[test]
    fn test_json_root_and_nested() {
        let config = config(std::path::Path::new("/nowhere"));
        let renderer = Renderer::new(config.clone());
        let response = node("json", json!({"a": 1}), &config);

        let output = renderer.render(&response, &RenderOptions::root());
        assert_eq!(output.body, Body::Text(r#"{"a":1}"#.into()));
        assert_eq!(output.content_type, None);

        let output = renderer.render_page(&response, None);
        assert_eq!(output.content_type, Some(ContentType::Json));

        let output = renderer.render(&response, &RenderOptions::nested());
        assert_eq!(output.body, Body::Data(json!({"a": 1}).as_object().cloned().unwrap()));
    }

    #[test]
    fn test_jsonp() {
        let config = config(std::path::Path::new("/nowhere"));
        let renderer = Renderer::new(config.clone());
        let response = node("javascript", json!({"a": 1}), &config);

        let output = renderer.render_page(&response, Some("cb"));
        assert_eq!(output.body.as_text(), Some(r#"cb({"a":1});"#));
        assert_eq!(output.content_type, Some(ContentType::Javascript));

        let output = renderer.render_page(&response, Some(""));
        assert_eq!(output.body.as_text(), Some(r#"{"a":1}"#));

        let output = renderer.render_page(&response, Some("alert(1)//"));
        assert_eq!(output.status, Some(Status::BadRequest));
        assert_eq!(output.body.as_text(), Some(""));

        let raw = node("raw", json!({"a": 1}), &config);
        let output = renderer.render(&raw, &RenderOptions::page().with_callback("cb"));
        assert_eq!(output.body.as_text(), Some(r#"{"a":1}"#));
        assert_eq!(output.content_type, None);
    }

    #[test]
    fn test_nested_nodes_are_rendered_first() {
        let config = config(std::path::Path::new("/nowhere"));
        let renderer = Renderer::new(config.clone());

        let inner = node("json", json!({"b": 2}), &config);
        let mut outer = node("json", json!({"a": 1}), &config);
        outer.data.set("inner", inner.clone());
        outer.data.set("list", vec![Item::from(inner), Item::from(json!(3))]);

        let output = renderer.render(&outer, &RenderOptions::root());
        let value: Value = serde_json::from_str(output.body.as_text().unwrap()).unwrap();
        assert_eq!(value, json!({"a": 1, "inner": {"b": 2}, "list": [{"b": 2}, 3]}));
    }

    #[test]
    fn test_views_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        std::fs::write(dir.path().join("index/index.html.tpl"), "<b>{{ name }}</b>").unwrap();

        let config = config(dir.path());
        let renderer = Renderer::new(config.clone());
        let mut response = Response::with_context(None, &config);
        response.set("name", json!("ann"));

        let output = renderer.render_page(&response, None);
        assert_eq!(output.body.as_text(), Some("<b>ann</b>"));
        assert_eq!(output.status, None);

        response.set_path("missing", None, "tpl", None);
        let output = renderer.render_page(&response, None);
        assert_eq!(output.body.as_text(), Some(VIEW_NOT_FOUND));
        assert_eq!(output.status, Some(Status::NotImplemented));

        let output = renderer.render(&response, &RenderOptions::root());
        assert_eq!(output.status, None);
    }

    #[test]
    fn test_locator_chain_and_include() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widget.html.tpl"), "[{{ n }}]").unwrap();

        let config = config(std::path::Path::new("/nowhere"));
        let root = dir.path().to_path_buf();
        let renderer = Renderer::new(config).with_locator(Arc::new(move |location: &ViewLocation| {
            let path = root.join(location.file_name());
            path.is_file().then_some(path)
        }));

        let mut data = Data::new();
        data.set("n", json!(7));
        assert_eq!(renderer.include_view("widget.tpl", data), "[7]");
        assert_eq!(renderer.include_view("/not/a/view", Data::new()), VIEW_NOT_FOUND);
    }
}
