//! View location and execution.
//!
//! A [`ViewLocator`] maps a node's [`ViewLocation`] to a file; a
//! [`ViewEngine`] turns that file and the node's data into text. The bundled
//! [`PlaceholderEngine`] understands a small template syntax:
//!
//! ```text
//! <h1>{{ title }}</h1>
//! {{ user.name }}
//! {{@capture_on bottom}}<script src="app.js"></script>{{@capture_off}}
//! {{@capture bottom}}
//! ```
//!
//! `{{@capture_on name prepend}}` files the chunk before earlier ones.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use trellis_core::ViewLocation;

use super::capture::CaptureBins;
use crate::error::{ViewError, ViewResult};

// ============================================================================
// Locators
// ============================================================================

/// Resolves a view location to an existing file.
pub trait ViewLocator: Send + Sync {
    fn locate(&self, location: &ViewLocation) -> Option<PathBuf>;
}

impl<F> ViewLocator for F
where
    F: Fn(&ViewLocation) -> Option<PathBuf> + Send + Sync,
{
    fn locate(&self, location: &ViewLocation) -> Option<PathBuf> {
        self(location)
    }
}

/// Looks views up under another root, e.g. a theme overriding the default
/// view directory. The node's own directory is ignored.
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    root: PathBuf,
}

impl DirectoryLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ViewLocator for DirectoryLocator {
    fn locate(&self, location: &ViewLocation) -> Option<PathBuf> {
        let mut path = self.root.clone();
        if !location.class.is_empty() {
            path.push(&location.class);
        }
        path.push(location.file_name());
        path.is_file().then_some(path)
    }
}

// ============================================================================
// Engines
// ============================================================================

/// Executes a located view with the node's data bound by name.
pub trait ViewEngine: Send + Sync {
    fn render(&self, path: &Path, data: &Map<String, Value>, capture: &CaptureBins) -> ViewResult<String>;
}

/// `{{ key }}` substitution with capture directives.
///
/// Dotted keys walk into objects and arrays. `null` and missing keys render
/// as nothing, strings render as-is and other values as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderEngine;

impl PlaceholderEngine {
    /// Renders template text that is already in memory.
    pub fn render_str(
        &self,
        path: &Path,
        template: &str,
        data: &Map<String, Value>,
        capture: &CaptureBins,
    ) -> ViewResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut emit = |text: &str| {
            if !capture.write(text) {
                out.push_str(text);
            }
        };

        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            emit(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| ViewError::syntax(path, "unterminated '{{'"))?;
            let tag = after[..end].trim();
            rest = &after[end + 2..];

            match tag.strip_prefix('@') {
                Some(directive) => {
                    let mut words = directive.split_whitespace();
                    match (words.next(), words.next(), words.next()) {
                        (Some("capture_on"), position, mode) => {
                            let append = mode != Some("prepend");
                            capture.capture_on(position.unwrap_or("top"), append);
                        }
                        (Some("capture_off"), None, None) => {
                            capture.capture_off();
                        }
                        (Some("capture"), position, None) => {
                            let captured = capture.get_capture(position.unwrap_or("top"));
                            emit(&captured);
                        }
                        _ => {
                            return Err(ViewError::syntax(path, format!("unknown directive '@{directive}'")));
                        }
                    }
                }
                None => emit(&display(lookup(data, tag))),
            }
        }
        emit(rest);
        Ok(out)
    }
}

impl ViewEngine for PlaceholderEngine {
    fn render(&self, path: &Path, data: &Map<String, Value>, capture: &CaptureBins) -> ViewResult<String> {
        let template = std::fs::read_to_string(path).map_err(|source| ViewError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.render_str(path, &template, data, capture)
    }
}

fn lookup<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut segments = key.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, data: Value, capture: &CaptureBins) -> ViewResult<String> {
        let data = data.as_object().cloned().unwrap_or_default();
        PlaceholderEngine.render_str(Path::new("test.tpl"), template, &data, capture)
    }

    #[test]
    fn test_placeholders() {
        let bins = CaptureBins::new();
        let out = render(
            "<p>{{ title }}</p><i>{{user.name}}</i>{{ tags.1 }}{{ missing }}{{ count }}",
            json!({"title": "Hi", "user": {"name": "ann"}, "tags": ["a", "b"], "count": 3}),
            &bins,
        )
        .unwrap();
        assert_eq!(out, "<p>Hi</p><i>ann</i>b3");
    }

    #[test]
    fn test_capture_directives() {
        let bins = CaptureBins::new();
        let out = render(
            "head{{@capture_on bottom}}<script>{{ src }}</script>{{@capture_off}}body",
            json!({"src": "app.js"}),
            &bins,
        )
        .unwrap();
        assert_eq!(out, "headbody");

        let out = render("[{{@capture bottom}}]", json!({}), &bins).unwrap();
        assert_eq!(out, "[<script>app.js</script>]");
    }

    #[test]
    fn test_syntax_errors() {
        let bins = CaptureBins::new();
        assert!(matches!(
            render("{{ open", json!({}), &bins),
            Err(ViewError::Syntax { .. })
        ));
        assert!(matches!(
            render("{{@include x}}", json!({}), &bins),
            Err(ViewError::Syntax { .. })
        ));
    }

    #[test]
    fn test_directory_locator() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("users")).unwrap();
        std::fs::write(dir.path().join("users/show.html.tpl"), "x").unwrap();

        let locator = DirectoryLocator::new(dir.path());
        let mut location = ViewLocation {
            directory: "/elsewhere".into(),
            class: "users".into(),
            method: "show".into(),
            media: "html".into(),
            suffix: "tpl".into(),
        };
        assert_eq!(locator.locate(&location), Some(dir.path().join("users/show.html.tpl")));

        location.method = "edit".into();
        assert_eq!(locator.locate(&location), None);
    }
}
