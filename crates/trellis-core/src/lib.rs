//! # Trellis Core
//!
//! Foundation types of the Trellis response-composition engine.
//!
//! A caller submits a [`Request`] naming a handler method. The handler
//! produces a [`Response`] node that may name a [`Parent`]; the dispatcher
//! (in `trellis-framework`) climbs those parents until it reaches a root,
//! nesting each node in its parent's [`Data`]. The root is then rendered as
//! markup, JSON, JSONP or a raw payload.
//!
//! This crate holds the data model and the contracts the dispatcher depends
//! on:
//!
//! - **Requests and responses**: [`Request`], [`Response`], [`Data`], [`Parent`]
//! - **Events**: [`Event`] and the per-node [`EventBus`]
//! - **Signatures**: [`SignatureEntry`], [`Filter`] and the [`SignatureCache`]
//!   with its pluggable [`CacheBackend`]
//! - **Configuration**: the immutable [`EngineConfig`]
//! - **Errors**: [`DispatchError`] and [`FilterError`]
//!
//! ```text
//!  Request ──▶ handler ──▶ Response ──parent──▶ Response ──parent──▶ root
//!                              ▲                    │
//!                              └── data["content"] ─┘
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod event;
pub mod filter;
pub mod parent;
pub mod request;
pub mod response;
pub mod signature;

pub use cache::{CacheBackend, CacheLookup, CacheStats, MemoryCache, SignatureCache};
pub use config::{CacheConfig, EngineConfig, RequestConfig, ResponseConfig};
pub use data::{Data, Item, ResponseSource, Slot};
pub use error::{DispatchError, DispatchResult, FilterError, FilterResult};
pub use event::{Event, EventBus, FAILURE, is_failure};
pub use filter::{Filter, Filtered, apply_chain, parse_chain};
pub use parent::{DEFAULT_CONTENT_KEY, Parent, ParentSpec};
pub use request::{HandlerId, Params, Request, lcfirst, to_url_form, ucfirst};
pub use response::{Format, LEVEL_STOP, LEVEL_UNLIMITED, Response, ViewLocation};
pub use signature::{FieldSpec, FormEntry, ParamSpec, SignatureEntry, form_key, signature_key};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        Data, DispatchError, DispatchResult, EngineConfig, Event, Params, Parent, Request,
        Response, Slot,
    };
}
