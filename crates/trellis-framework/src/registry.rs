//! Registry of controller and form types.
//!
//! Handler types are looked up by their fully qualified name (namespace
//! plus class), which is what a [`Request`](trellis_core::Request) carries.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::controller::{Controller, TypeMeta};
use crate::form::{Form, FormData, FormMeta};

type Factory = Box<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

/// A registered controller type.
pub struct HandlerType {
    name: String,
    describe: fn() -> TypeMeta,
    factory: Factory,
    methods: HashSet<String>,
    catch_all: bool,
}

impl HandlerType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the type's metadata.
    pub fn meta(&self) -> TypeMeta {
        (self.describe)()
    }

    /// Whether `method` was declared when the type was registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    pub fn catches_all(&self) -> bool {
        self.catch_all
    }

    /// Creates a fresh controller instance.
    pub fn create(&self) -> Box<dyn Controller> {
        (self.factory)()
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerType")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A registered form type.
pub struct FormType {
    name: String,
    describe: fn() -> FormMeta,
    bind: fn(FormData) -> Box<dyn Any>,
}

impl FormType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> FormMeta {
        (self.describe)()
    }

    pub fn bind(&self, data: FormData) -> Box<dyn Any> {
        (self.bind)(data)
    }
}

impl fmt::Debug for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormType")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Lookup table from type names to controller and form types.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<HandlerType>>,
    forms: HashMap<String, Arc<FormType>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller under `name`, replacing any previous one.
    ///
    /// `name` must be the fully qualified type name, e.g. `App\Users` for
    /// the namespace `App\` and class `users`.
    pub fn register<C: Controller + Default>(&mut self, name: impl Into<String>) -> &mut Self {
        self.register_with(name, C::default)
    }

    /// Registers a controller built by `factory`.
    pub fn register_with<C, F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        C: Controller,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let name = name.into();
        let meta = C::describe();
        debug!(handler = %name, methods = meta.methods.len(), "registering controller");
        let handler = HandlerType {
            name: name.clone(),
            describe: C::describe,
            factory: Box::new(move || Box::new(factory())),
            methods: meta.methods.into_iter().map(|m| m.name).collect(),
            catch_all: meta.catch_all,
        };
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    /// Registers a form type under [`Form::form_name`].
    pub fn register_form<F: Form>(&mut self) -> &mut Self {
        let name = F::form_name();
        let form = FormType {
            name: name.clone(),
            describe: F::describe,
            bind: |data| Box::new(F::bind(data)),
        };
        self.forms.insert(name, Arc::new(form));
        self
    }

    pub fn handler(&self, name: &str) -> Option<Arc<HandlerType>> {
        self.handlers.get(name).cloned()
    }

    pub fn form(&self, name: &str) -> Option<Arc<FormType>> {
        self.forms.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Returns `true` when `name` is registered and declares `method`.
    pub fn has_method(&self, name: &str, method: &str) -> bool {
        self.handlers
            .get(name)
            .is_some_and(|h| h.has_method(method))
    }

    /// Returns `true` when `name` is registered as a catch-all type.
    pub fn catches_all(&self, name: &str) -> bool {
        self.handlers.get(name).is_some_and(|h| h.catches_all())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        let mut forms: Vec<_> = self.forms.keys().collect();
        forms.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &handlers)
            .field("forms", &forms)
            .finish()
    }
}
