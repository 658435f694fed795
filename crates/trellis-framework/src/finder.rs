//! Parent finders.
//!
//! A parent finder decides a handler method's parent at request time,
//! overriding whatever the method or type declares. Finders are tried in
//! registration order and the first answer wins.

use trellis_core::Parent;

/// Strategy for choosing a handler method's parent.
pub trait ParentFinder: Send + Sync {
    /// Returns the parent for `type_name#method`, or `None` to pass.
    fn find_parent(&self, type_name: &str, method: &str) -> Option<Parent>;
}

impl<F> ParentFinder for F
where
    F: Fn(&str, &str) -> Option<Parent> + Send + Sync,
{
    fn find_parent(&self, type_name: &str, method: &str) -> Option<Parent> {
        self(type_name, method)
    }
}
