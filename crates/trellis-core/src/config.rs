//! Engine configuration.
//!
//! [`EngineConfig`] is built once at startup (usually by the runtime's
//! config loader) and shared behind an `Arc`. The dispatcher and every
//! response constructor receive it as an argument; nothing reads
//! configuration from global state.

use serde::{Deserialize, Serialize};

/// Root configuration for the dispatch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Request naming defaults.
    #[serde(default)]
    pub request: RequestConfig,

    /// Response and view defaults.
    #[serde(default)]
    pub response: ResponseConfig,

    /// Signature cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Upper bound on parent-bubbling steps per run. `0` disables the guard.
    #[serde(default = "default_max_bubble_depth")]
    pub max_bubble_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request: RequestConfig::default(),
            response: ResponseConfig::default(),
            cache: CacheConfig::default(),
            max_bubble_depth: default_max_bubble_depth(),
        }
    }
}

fn default_max_bubble_depth() -> usize {
    32
}

/// Naming defaults applied when building requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Prefix prepended to every handler class name.
    #[serde(default)]
    pub default_namespace: String,

    /// Class used when a locator names none.
    #[serde(default = "default_class")]
    pub default_class: String,

    /// Method used when a locator names none.
    #[serde(default = "default_method")]
    pub default_method: String,

    /// Leading URL segment that carries no class meaning.
    #[serde(default)]
    pub base_path: String,

    /// Forces (`true`) or forbids (`false`) `https` in generated URLs.
    #[serde(default)]
    pub enable_https: Option<bool>,

    /// Host used for absolute URLs; relative URLs are built when unset.
    #[serde(default)]
    pub host: Option<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_namespace: String::new(),
            default_class: default_class(),
            default_method: default_method(),
            base_path: String::new(),
            enable_https: None,
            host: None,
        }
    }
}

fn default_class() -> String {
    "Index".to_string()
}

fn default_method() -> String {
    "index".to_string()
}

/// Response and view defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Root directory of view files.
    #[serde(default)]
    pub view_directory: String,

    /// View (relative to `view_directory`) that receives dispatch failures.
    #[serde(default)]
    pub exception_view: String,

    /// Parent used when neither method nor type declares one.
    /// An empty value means `"json"`.
    #[serde(default)]
    pub default_parent: String,

    /// Media tag used when a response has no context.
    #[serde(default = "default_media")]
    pub default_media: String,

    /// File suffix of view files, without the dot.
    #[serde(default = "default_view_suffix")]
    pub view_suffix: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            view_directory: String::new(),
            exception_view: String::new(),
            default_parent: String::new(),
            default_media: default_media(),
            view_suffix: default_view_suffix(),
        }
    }
}

impl ResponseConfig {
    /// The effective default parent: the configured value, or `"json"`.
    pub fn effective_default_parent(&self) -> &str {
        let trimmed = self.default_parent.trim();
        if trimmed.is_empty() { "json" } else { trimmed }
    }
}

fn default_media() -> String {
    "html".to_string()
}

fn default_view_suffix() -> String {
    "tpl".to_string()
}

/// Signature cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When `false` every resolution introspects the handler again.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Lifetime handed to the persistent backend. `0` means no expiry.
    #[serde(default)]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: 0,
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.request.default_class, "Index");
        assert_eq!(config.request.default_method, "index");
        assert_eq!(config.response.default_media, "html");
        assert_eq!(config.response.view_suffix, "tpl");
        assert_eq!(config.response.effective_default_parent(), "json");
        assert!(config.cache.enabled);
        assert_eq!(config.max_bubble_depth, 32);
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: EngineConfig = serde_json::from_value(serde_json::json!({
            "request": { "default_namespace": "App\\" },
            "response": { "default_parent": " layout " }
        }))
        .unwrap();
        assert_eq!(config.request.default_namespace, "App\\");
        assert_eq!(config.request.default_class, "Index");
        assert_eq!(config.response.effective_default_parent(), "layout");
    }
}
