//! Response tree nodes.
//!
//! A [`Response`] is what a handler produces: a data map, an output context,
//! a view location and a link to the parent it wants to be embedded in.
//! The dispatcher climbs parent links to build the tree; the renderer walks
//! it back down.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{EngineConfig, ResponseConfig};
use crate::data::{Data, Slot};
use crate::event::{Event, EventBus};
use crate::parent::Parent;
use crate::request::{Params, Request, to_url_form};

/// Level budget meaning "climb until there is no parent".
pub const LEVEL_UNLIMITED: i64 = -1;

/// Level budget meaning "never consult the parent".
pub const LEVEL_STOP: i64 = 0;

// =============================================================================
// Format
// =============================================================================

/// Contexts that serialize data instead of rendering a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Raw,
    Javascript,
}

impl Format {
    pub fn from_context(context: &str) -> Option<Self> {
        match context {
            "json" => Some(Self::Json),
            "raw" => Some(Self::Raw),
            "javascript" => Some(Self::Javascript),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Raw => "raw",
            Self::Javascript => "javascript",
        }
    }
}

// =============================================================================
// ViewLocation
// =============================================================================

/// Where a response's view file lives: `directory/class/method.media.suffix`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewLocation {
    pub directory: String,
    pub class: String,
    pub method: String,
    pub media: String,
    pub suffix: String,
}

impl ViewLocation {
    fn from_config(config: &ResponseConfig) -> Self {
        Self {
            directory: config.view_directory.clone(),
            class: String::new(),
            method: String::new(),
            media: config.default_media.clone(),
            suffix: config.view_suffix.clone(),
        }
    }

    /// The file name: `method.media.suffix`, skipping empty parts.
    pub fn file_name(&self) -> String {
        [&self.method, &self.media, &self.suffix]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The conventional path of the view file.
    pub fn default_path(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.directory);
        if !self.class.is_empty() {
            path.push(&self.class);
        }
        path.push(self.file_name());
        path
    }
}

// =============================================================================
// Response
// =============================================================================

/// A node of the response tree.
#[derive(Debug, Clone)]
pub struct Response {
    context: Option<String>,
    view: ViewLocation,
    default_media: String,
    /// Where this node wants to be embedded.
    pub parent: Parent,
    /// Remaining bubbling budget: `-1` unlimited, `0` stop, `N` climb N.
    pub level_up: i64,
    /// Values exposed to the view or serialized output.
    pub data: Data,
    /// Events recorded on this node.
    pub events: EventBus,
}

impl Response {
    /// Creates the node a handler for `request` starts from.
    ///
    /// The view location follows the request's class and method in URL
    /// form. Context and level budget come from the request parameters; a
    /// missing level budget defaults to `0` when a context is present and
    /// to `-1` otherwise.
    pub fn from_request(request: &Request, config: &EngineConfig) -> Self {
        let mut response = Self::blank(&config.response);
        response.view.class = to_url_form(request.class());
        response.view.method = to_url_form(request.method());

        let context = request.context();
        response.set_context(context);
        response.level_up = match request.level_up() {
            Some(level) => level,
            None if context.is_some() => LEVEL_STOP,
            None => LEVEL_UNLIMITED,
        };
        response
    }

    /// Creates a node for the default handler with the given context.
    pub fn with_context(context: Option<&str>, config: &EngineConfig) -> Self {
        let mut params = Params::new();
        if let Some(context) = context {
            params.insert(crate::request::CONTEXT_PARAM.into(), Value::from(context));
        }
        Self::from_request(&Request::default_for(params, &config.request), config)
    }

    /// Builds a node for a format name or a view path.
    ///
    /// `json`, `raw` and `javascript` produce format nodes. A path ending in
    /// the view suffix (compared case-insensitively) produces a view node:
    /// the path is lower-cased and split into `dir/name.media.suffix`, and a
    /// media segment becomes the context unless `request` already carries
    /// one. Any other target is a route locator and yields `None`.
    pub fn for_target(
        target: &str,
        data: Data,
        request: Option<&Request>,
        config: &EngineConfig,
    ) -> Option<Self> {
        let target = target.to_lowercase();
        let format = Format::from_context(&target);
        if format.is_none() && !has_view_suffix(&target, &config.response.view_suffix) {
            return None;
        }

        let mut response = match request {
            Some(request) => Self::from_request(request, config),
            None => Self::from_request(&Request::default_for(Params::new(), &config.request), config),
        };
        response.data = data;

        if let Some(format) = format {
            response.set_context(Some(format.as_str()));
            return Some(response);
        }

        let path = Path::new(&target);
        let dir = path
            .parent()
            .and_then(Path::to_str)
            .filter(|d| !d.is_empty() && *d != ".")
            .map(str::to_owned);
        let mut name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let suffix = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or(config.response.view_suffix.as_str())
            .to_string();

        if let Some(pos) = name.find('.') {
            let media = name[pos + 1..].to_string();
            name.truncate(pos);
            if response.context.is_none() {
                response.set_context(Some(&media));
            }
        }
        // A bare file name sits directly in the view directory.
        if dir.is_none() {
            response.view.class.clear();
        }
        response.set_path(&name, dir.as_deref(), &suffix, None);
        Some(response)
    }

    fn blank(config: &ResponseConfig) -> Self {
        Self {
            context: None,
            view: ViewLocation::from_config(config),
            default_media: config.default_media.clone(),
            parent: Parent::None,
            level_up: LEVEL_UNLIMITED,
            data: Data::new(),
            events: EventBus::new(),
        }
    }

    // ─── Context ───────────────────────────────────────────────────────────

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Sets the output context and keeps the view media in step with it.
    ///
    /// `None` or an empty string clears the context and restores the
    /// default media.
    pub fn set_context(&mut self, context: Option<&str>) {
        match context.filter(|c| !c.is_empty()) {
            Some(context) => {
                self.context = Some(context.to_string());
                self.view.media = context.to_string();
            }
            None => {
                self.context = None;
                self.view.media = self.default_media.clone();
            }
        }
    }

    /// The serialization format, when the context names one.
    pub fn format(&self) -> Option<Format> {
        self.context.as_deref().and_then(Format::from_context)
    }

    // ─── View location ─────────────────────────────────────────────────────

    pub fn view(&self) -> &ViewLocation {
        &self.view
    }

    /// Points the node at another view.
    ///
    /// `class` and `directory` are only replaced when given and non-empty.
    pub fn set_path(
        &mut self,
        method: &str,
        class: Option<&str>,
        suffix: &str,
        directory: Option<&str>,
    ) -> &mut Self {
        if let Some(directory) = directory.filter(|d| !d.is_empty()) {
            self.view.directory = directory.to_string();
        }
        if let Some(class) = class.filter(|c| !c.is_empty()) {
            self.view.class = class.to_string();
        }
        self.view.method = method.to_string();
        self.view.suffix = suffix.to_string();
        self
    }

    // ─── Bubbling ──────────────────────────────────────────────────────────

    /// Stops (`true`) or re-enables unlimited (`false`) bubbling.
    pub fn disable_layout(&mut self, disable: bool) {
        self.level_up = if disable { LEVEL_STOP } else { LEVEL_UNLIMITED };
    }

    /// Allows `levels` more bubbling steps, or unlimited steps for `None`.
    pub fn enable_layout(&mut self, levels: Option<u32>) {
        self.level_up = levels.map_or(LEVEL_UNLIMITED, i64::from);
    }

    /// Returns `true` when the level budget allows consulting the parent.
    pub fn can_climb(&self) -> bool {
        self.level_up > 0 || self.level_up == LEVEL_UNLIMITED
    }

    // ─── Data & events ─────────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<&Slot> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, slot: impl Into<Slot>) -> &mut Self {
        self.data.set(key, slot);
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.has(key)
    }

    /// Records an event on this node.
    pub fn trigger(&mut self, kind: impl Into<String>, params: Params) {
        self.events.trigger(Event::new(kind, params));
    }
}

/// Returns `true` when `target` ends with `.suffix`, ignoring case.
pub fn has_view_suffix(target: &str, suffix: &str) -> bool {
    let dotted = format!(".{}", suffix.to_lowercase());
    target.to_lowercase().ends_with(&dotted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.response.view_directory = "/views".into();
        config
    }

    fn request(params: serde_json::Value) -> Request {
        let params = params.as_object().cloned().unwrap_or_default();
        Request::new("UserList", "showAll", params, &config().request)
    }

    #[test]
    fn test_from_request_level_defaults() {
        let response = Response::from_request(&request(json!({})), &config());
        assert_eq!(response.context(), None);
        assert_eq!(response.level_up, LEVEL_UNLIMITED);
        assert_eq!(response.view().media, "html");
        assert_eq!(response.view().class, "user-list");
        assert_eq!(response.view().method, "show-all");

        let response = Response::from_request(&request(json!({"context": "json"})), &config());
        assert_eq!(response.context(), Some("json"));
        assert_eq!(response.format(), Some(Format::Json));
        assert_eq!(response.level_up, LEVEL_STOP);

        let response = Response::from_request(
            &request(json!({"context": "json", "levelUp": 3})),
            &config(),
        );
        assert_eq!(response.level_up, 3);
    }

    #[test]
    fn test_context_media_sync() {
        let mut response = Response::with_context(None, &config());
        response.set_context(Some("xml"));
        assert_eq!(response.view().media, "xml");
        response.set_context(Some(""));
        assert_eq!(response.context(), None);
        assert_eq!(response.view().media, "html");
    }

    #[test]
    fn test_for_target_formats_and_routes() {
        let response = Response::for_target("JSON", Data::new(), None, &config()).unwrap();
        assert_eq!(response.context(), Some("json"));
        assert!(Response::for_target("/layout/index", Data::new(), None, &config()).is_none());
    }

    #[test]
    fn test_for_target_view_path() {
        let mut data = Data::new();
        data.set("a", json!(1));
        let response =
            Response::for_target("Shared/Layout.HTML.tpl", data, None, &config()).unwrap();
        assert_eq!(response.context(), Some("html"));
        assert_eq!(response.view().class, "shared");
        assert_eq!(response.view().method, "layout");
        assert_eq!(response.view().suffix, "tpl");
        assert_eq!(
            response.view().default_path(),
            PathBuf::from("/views/shared/layout.html.tpl")
        );
        assert!(response.has("a"));

        let inherited = request(json!({"context": "amp"}));
        let response =
            Response::for_target("page.html.tpl", Data::new(), Some(&inherited), &config()).unwrap();
        assert_eq!(response.context(), Some("amp"));
        assert_eq!(response.view().class, "");
        assert_eq!(
            response.view().default_path(),
            PathBuf::from("/views/page.amp.tpl")
        );
    }

    #[test]
    fn test_layout_toggles() {
        let mut response = Response::with_context(None, &config());
        response.disable_layout(true);
        assert!(!response.can_climb());
        response.enable_layout(Some(2));
        assert_eq!(response.level_up, 2);
        response.enable_layout(None);
        assert_eq!(response.level_up, LEVEL_UNLIMITED);
        assert!(response.can_climb());
    }
}
