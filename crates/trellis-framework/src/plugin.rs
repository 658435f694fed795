//! Dispatcher plugins.
//!
//! Plugins observe and adjust a dispatch run through four hooks. Every hook
//! runs in registration order, exit hooks included.
//!
//! ```text
//! run ─▶ application_entry ─▶ ┌ class_entry ─▶ handler ─▶ class_exit ┐ ─▶ application_exit ─▶ bubbling
//!                             └──────────── per queued request ──────┘
//! ```
//!
//! Class hooks also run for every parent request processed while bubbling.
//!
//! # Concurrency
//!
//! Plugins are shared as `Arc<dyn Plugin>` and hooks take `&self`. Use
//! interior mutability (e.g. `parking_lot::Mutex`) for state that changes
//! across requests.

use trellis_core::{DispatchResult, Request, Response};

use crate::dispatcher::Dispatcher;

/// A dispatcher lifecycle plugin. All hooks default to no-ops.
pub trait Plugin: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Runs once when the dispatcher starts draining its queue.
    fn application_entry(&self, _dispatcher: &mut Dispatcher) {}

    /// Runs before each request is processed; may rewrite the request.
    ///
    /// An error aborts the run like a resolution failure.
    fn class_entry(&self, _request: &mut Request, _dispatcher: &mut Dispatcher) -> DispatchResult<()> {
        Ok(())
    }

    /// Runs after each request produced its response.
    fn class_exit(&self, _response: &mut Response, _dispatcher: &mut Dispatcher) -> DispatchResult<()> {
        Ok(())
    }

    /// Runs once with the last response, before bubbling starts.
    fn application_exit(&self, _response: &mut Response, _dispatcher: &mut Dispatcher) {}
}
