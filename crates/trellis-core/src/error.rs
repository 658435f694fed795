//! Unified error types for the Trellis core.
//!
//! Only resolution faults travel as errors. Filter faults are recorded as
//! flags on the bound arguments and render faults are encoded in the render
//! output, so neither appears here.

use thiserror::Error;

// =============================================================================
// Filter Errors
// =============================================================================

/// Errors raised while parsing a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The expression names a filter that is not in the registry.
    #[error("unknown filter '{0}'")]
    Unknown(String),

    /// The expression is not of the form `name` or `name(arg, ...)`.
    #[error("malformed filter expression '{0}'")]
    Malformed(String),

    /// An argument could not be parsed for the named filter.
    #[error("invalid argument '{argument}' for filter '{filter}'")]
    InvalidArgument {
        /// The filter name.
        filter: String,
        /// The offending argument text.
        argument: String,
    },
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors that abort request processing.
///
/// Any of these reaching the dispatcher stops the queue and produces the
/// configured exception response.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No handler type is registered under the requested name.
    #[error("\"{handler}\" controller does not exist.")]
    HandlerNotFound {
        /// Fully qualified handler type name.
        handler: String,
    },

    /// The handler type has neither the method nor a catch-all.
    #[error("\"{method}\" method does not exist.")]
    MethodNotFound {
        /// Fully qualified handler type name.
        handler: String,
        /// The requested method.
        method: String,
    },

    /// A declared filter expression could not be parsed.
    #[error("invalid filter on '{target}': {source}")]
    InvalidFilter {
        /// `Type#method.param` or `Type#form.field`.
        target: String,
        /// The parse failure.
        #[source]
        source: FilterError,
    },

    /// A route locator could not be turned into a request.
    #[error("cannot route '{locator}': {reason}")]
    Route {
        /// The locator text.
        locator: String,
        /// Why it failed.
        reason: String,
    },

    /// The dispatcher was run without any request.
    #[error("no request was submitted")]
    EmptyQueue,

    /// Failure raised by handler or plugin code.
    #[error("{0}")]
    Handler(String),
}

impl DispatchError {
    /// Creates a handler failure with the given message.
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    /// Creates a route failure.
    pub fn route(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Route {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for faults caused by an unknown handler or method.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::HandlerNotFound { .. } | Self::MethodNotFound { .. }
        )
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for filter parsing.
pub type FilterResult<T> = Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_messages() {
        let err = DispatchError::HandlerNotFound {
            handler: "App\\Foo".into(),
        };
        assert_eq!(err.to_string(), "\"App\\Foo\" controller does not exist.");
        assert!(err.is_not_found());

        let err = DispatchError::MethodNotFound {
            handler: "App\\Foo".into(),
            method: "bar".into(),
        };
        assert_eq!(err.to_string(), "\"bar\" method does not exist.");
        assert!(!DispatchError::handler("boom").is_not_found());
    }
}
