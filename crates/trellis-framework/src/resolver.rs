//! Parameter resolution.
//!
//! The resolver turns a request into the bound arguments of a handler
//! method. It consults the [`SignatureCache`] first and only reads the
//! controller's [`TypeMeta`](crate::controller::TypeMeta) when the
//! signature is not cached.
//!
//! Resolution order:
//!
//! 1. Ask the parent finders for a parent.
//! 2. Fetch the signature entry, or build it (and store it on a genuine miss).
//! 3. Bind each declared parameter: filtered request value, bound form, or
//!    the declared default.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use trellis_core::{
    CacheLookup, DispatchError, DispatchResult, EngineConfig, FieldSpec, FormEntry, Params, Parent,
    ParamSpec, ParentSpec, Request, SignatureCache, SignatureEntry, apply_chain, form_key,
    parse_chain, signature_key,
};

use crate::finder::ParentFinder;
use crate::form::FormData;
use crate::registry::{FormType, HandlerRegistry, HandlerType};

// ============================================================================
// Args
// ============================================================================

/// One bound argument.
pub enum Arg {
    Value(Value),
    Form(Box<dyn Any>),
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Form(_) => f.write_str("Form(..)"),
        }
    }
}

/// Bound arguments of a handler method, in declaration order.
#[derive(Debug, Default)]
pub struct Args {
    entries: Vec<(String, Arg)>,
    error: bool,
}

impl Args {
    fn push(&mut self, name: &str, arg: Arg) {
        self.entries.push((name.to_string(), arg));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, arg)| arg)
    }

    /// The plain value bound to `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            Arg::Value(v) => Some(v),
            Arg::Form(_) => None,
        }
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_i64)
    }

    /// The form bound to `name`, when it is an `F`.
    pub fn form<F: 'static>(&self, name: &str) -> Option<&F> {
        match self.get(name)? {
            Arg::Form(form) => form.downcast_ref::<F>(),
            Arg::Value(_) => None,
        }
    }

    /// Moves the form bound to `name` out of the arguments.
    pub fn take_form<F: 'static>(&mut self, name: &str) -> Option<F> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        if !matches!(&self.entries[index].1, Arg::Form(form) if form.is::<F>()) {
            return None;
        }
        match self.entries.remove(index).1 {
            Arg::Form(form) => form.downcast::<F>().ok().map(|f| *f),
            Arg::Value(_) => None,
        }
    }

    /// Returns `true` when a supplied value was rejected by a filter.
    pub fn has_error(&self) -> bool {
        self.error
    }
}

/// Output of [`ParameterResolver::resolve`].
#[derive(Debug)]
pub struct Resolved {
    pub args: Args,
    /// Parent from a finder, else the declared one.
    pub parent: Parent,
}

// ============================================================================
// ParameterResolver
// ============================================================================

/// Binds request parameters to handler method arguments.
pub struct ParameterResolver<'a> {
    config: &'a EngineConfig,
    registry: &'a HandlerRegistry,
    signatures: &'a SignatureCache,
    finders: &'a [Arc<dyn ParentFinder>],
}

impl<'a> ParameterResolver<'a> {
    pub fn new(
        config: &'a EngineConfig,
        registry: &'a HandlerRegistry,
        signatures: &'a SignatureCache,
        finders: &'a [Arc<dyn ParentFinder>],
    ) -> Self {
        Self {
            config,
            registry,
            signatures,
            finders,
        }
    }

    /// Resolves the parent and bound arguments of `request` on `handler`.
    pub fn resolve(&self, handler: &HandlerType, request: &Request) -> DispatchResult<Resolved> {
        let method = request.method();
        let key = signature_key(handler.name(), method);

        let found = self
            .finders
            .iter()
            .find_map(|finder| finder.find_parent(handler.name(), method));

        let entry = match self.signatures.fetch::<SignatureEntry>(&key) {
            // Entries from a persistent backend may outlive the method.
            CacheLookup::Hit(_) if !handler.has_method(method) && !handler.catches_all() => {
                return Err(DispatchError::MethodNotFound {
                    handler: handler.name().to_string(),
                    method: method.to_string(),
                });
            }
            CacheLookup::Hit(entry) => entry,
            lookup => {
                let entry = self.introspect(handler, method)?;
                // Undeclared catch-all methods come from the locator and are not kept.
                if matches!(lookup, CacheLookup::Miss) && handler.has_method(method) {
                    self.signatures.save(&key, &entry);
                }
                entry
            }
        };

        let parent = found.unwrap_or_else(|| entry.declared_parent.clone().into());
        let args = self.bind(&key, &entry.params, request)?;
        Ok(Resolved { args, parent })
    }

    fn introspect(&self, handler: &HandlerType, method: &str) -> DispatchResult<SignatureEntry> {
        debug!(handler = %handler.name(), method, "building signature entry");
        let meta = handler.meta();
        let method_meta = meta.find_method(method);
        if method_meta.is_none() && !meta.catch_all {
            return Err(DispatchError::MethodNotFound {
                handler: handler.name().to_string(),
                method: method.to_string(),
            });
        }

        let declared_parent = method_meta
            .and_then(|m| m.parent.as_deref())
            .or(meta.parent.as_deref())
            .map(ParentSpec::parse)
            .unwrap_or_else(|| {
                ParentSpec::Named(self.config.response.effective_default_parent().to_string())
            });

        let params = method_meta
            .map(|m| m.params.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|param| {
                let filters =
                    parse_chain(&param.filters).map_err(|source| DispatchError::InvalidFilter {
                        target: format!("{}#{}.{}", handler.name(), method, param.name),
                        source,
                    })?;
                Ok(ParamSpec {
                    name: param.name.clone(),
                    default: param.default.clone(),
                    form: param.form.clone(),
                    filters,
                })
            })
            .collect::<DispatchResult<Vec<_>>>()?;

        Ok(SignatureEntry {
            declared_parent,
            params,
        })
    }

    fn bind(&self, key: &str, params: &[ParamSpec], request: &Request) -> DispatchResult<Args> {
        let mut args = Args::default();
        for spec in params {
            let arg = match (&spec.form, request.param(&spec.name)) {
                (Some(form), _) => match self.registry.form(form) {
                    Some(form) => Arg::Form(self.bind_form(&form, request)?),
                    None => {
                        warn!(form = %form, param = %spec.name, "form type is not registered, using default");
                        Arg::Value(spec.default.clone())
                    }
                },
                (None, Some(raw)) => {
                    let filtered = apply_chain(&spec.filters, raw.clone());
                    if filtered.failed {
                        warn!(signature = key, param = %spec.name, "parameter rejected by filter");
                        args.error = true;
                    }
                    Arg::Value(filtered.value)
                }
                (None, None) => Arg::Value(spec.default.clone()),
            };
            args.push(&spec.name, arg);
        }
        Ok(args)
    }

    /// Builds a form from the raw request, filtering each declared field.
    pub fn bind_form(&self, form: &FormType, request: &Request) -> DispatchResult<Box<dyn Any>> {
        let key = form_key(form.name());
        let entry = match self.signatures.fetch::<FormEntry>(&key) {
            CacheLookup::Hit(entry) => entry,
            lookup => {
                let entry = form_entry(form)?;
                if matches!(lookup, CacheLookup::Miss) {
                    self.signatures.save(&key, &entry);
                }
                entry
            }
        };

        let mut values = Params::new();
        let mut error = false;
        for field in &entry.fields {
            if let Some(raw) = request.param(&field.name) {
                let filtered = apply_chain(&field.filters, raw.clone());
                error |= filtered.failed;
                values.insert(field.name.clone(), filtered.value);
            }
        }
        if error {
            warn!(form = %form.name(), "form field rejected by filter");
        }
        Ok(form.bind(FormData::new(values, error)))
    }
}

fn form_entry(form: &FormType) -> DispatchResult<FormEntry> {
    let fields = form
        .meta()
        .fields
        .into_iter()
        .map(|field| {
            let filters = parse_chain(&field.filters).map_err(|source| DispatchError::InvalidFilter {
                target: format!("{}#form.{}", form.name(), field.name),
                source,
            })?;
            Ok(FieldSpec {
                name: field.name,
                filters,
            })
        })
        .collect::<DispatchResult<Vec<_>>>()?;
    Ok(FormEntry { fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use trellis_core::MemoryCache;

    use crate::context::Context;
    use crate::controller::{Controller, MethodMeta, Outcome, ParamMeta, TypeMeta};
    use crate::form::{Form, FormMeta};

    static DESCRIBE_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Articles;

    impl Controller for Articles {
        fn describe() -> TypeMeta {
            TypeMeta::new()
                .parent("layout main")
                .method(
                    MethodMeta::new("show")
                        .param(ParamMeta::new("id").default(json!(1)).filter("int(min=1)"))
                        .param(ParamMeta::new("slug").default(json!("none")).filter("trim")),
                )
                .method(MethodMeta::new("edit").parent("json").param(
                    ParamMeta::new("login").form::<Login>(),
                ))
                .method(MethodMeta::new("broken").param(ParamMeta::new("x").filter("shout")))
        }

        fn invoke(&mut self, _: &str, _: Args, _: &mut Context<'_>) -> DispatchResult<Outcome> {
            Ok(Outcome::Empty)
        }
    }

    /// Only resolved by the cache test, so the call count is exact.
    #[derive(Default)]
    struct Counted;

    impl Controller for Counted {
        fn describe() -> TypeMeta {
            DESCRIBE_CALLS.fetch_add(1, Ordering::SeqCst);
            TypeMeta::new().method(MethodMeta::new("index").param(ParamMeta::new("q")))
        }

        fn invoke(&mut self, _: &str, _: Args, _: &mut Context<'_>) -> DispatchResult<Outcome> {
            Ok(Outcome::Empty)
        }
    }

    #[derive(Default)]
    struct Anything;

    impl Controller for Anything {
        fn describe() -> TypeMeta {
            TypeMeta::new().catch_all()
        }

        fn invoke(&mut self, _: &str, _: Args, _: &mut Context<'_>) -> DispatchResult<Outcome> {
            Ok(Outcome::Empty)
        }
    }

    #[derive(Debug)]
    struct Login {
        email: Option<String>,
        error: bool,
    }

    impl Form for Login {
        fn describe() -> FormMeta {
            FormMeta::new().field("email", ["trim", "email"])
        }

        fn bind(data: FormData) -> Self {
            Self {
                email: data.str("email").map(str::to_owned),
                error: data.has_error(),
            }
        }
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry
            .register::<Articles>("App\\Articles")
            .register::<Anything>("App\\Anything")
            .register_form::<Login>();
        registry
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.request.default_namespace = "App\\".into();
        config
    }

    fn request(class: &str, method: &str, params: Value) -> Request {
        let params = params.as_object().cloned().unwrap_or_default();
        Request::new(class, method, params, &config().request)
    }

    fn resolve(
        signatures: &SignatureCache,
        registry: &HandlerRegistry,
        request: &Request,
    ) -> DispatchResult<Resolved> {
        let config = config();
        let handler = registry
            .handler(&request.type_name())
            .ok_or(DispatchError::HandlerNotFound {
                handler: request.type_name(),
            })?;
        ParameterResolver::new(&config, registry, signatures, &[]).resolve(&handler, request)
    }

    #[test]
    fn test_supplied_values_and_defaults() {
        let registry = registry();
        let signatures = SignatureCache::new();

        let resolved = resolve(
            &signatures,
            &registry,
            &request("articles", "show", json!({"id": "7", "extra": 1})),
        )
        .unwrap();
        assert_eq!(resolved.args.names().collect::<Vec<_>>(), vec!["id", "slug"]);
        assert_eq!(resolved.args.value("id"), Some(&json!(7)));
        assert_eq!(resolved.args.str("slug"), Some("none"));
        assert!(!resolved.args.has_error());
        assert!(matches!(
            resolved.parent,
            Parent::Keyed { ref target, ref content_key } if target == "layout" && content_key == "main"
        ));
    }

    #[test]
    fn test_filter_failure_is_degraded_not_fatal() {
        let registry = registry();
        let resolved = resolve(
            &SignatureCache::new(),
            &registry,
            &request("articles", "show", json!({"id": "0"})),
        )
        .unwrap();
        assert!(resolved.args.has_error());
        assert_eq!(resolved.args.value("id"), Some(&json!(false)));
    }

    #[test]
    fn test_second_resolution_uses_cache() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Counted>("App\\Counted");
        let signatures = SignatureCache::new();
        let req = request("counted", "index", json!({"q": "x"}));

        resolve(&signatures, &registry, &req).unwrap();
        let after_first = DESCRIBE_CALLS.load(Ordering::SeqCst);
        let stats = signatures.stats();

        let resolved = resolve(&signatures, &registry, &req).unwrap();
        assert_eq!(DESCRIBE_CALLS.load(Ordering::SeqCst), after_first);
        assert_eq!(resolved.args.str("q"), Some("x"));
        assert_eq!(signatures.stats().writes, stats.writes);
        assert_eq!(signatures.stats().hits, stats.hits + 1);
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let registry = registry();
        let signatures = SignatureCache::disabled();
        let req = request("articles", "show", json!({}));
        resolve(&signatures, &registry, &req).unwrap();
        resolve(&signatures, &registry, &req).unwrap();
        assert_eq!(signatures.stats().writes, 0);
    }

    #[test]
    fn test_method_not_found_and_catch_all() {
        let registry = registry();
        let signatures = SignatureCache::new();

        let err = resolve(&signatures, &registry, &request("articles", "nope", json!({})))
            .unwrap_err();
        assert!(matches!(err, DispatchError::MethodNotFound { .. }));

        let resolved =
            resolve(&signatures, &registry, &request("anything", "nope", json!({}))).unwrap();
        assert!(resolved.args.is_empty());
        assert!(matches!(resolved.parent, Parent::Named(ref p) if p == "json"));
    }

    #[test]
    fn test_undeclared_methods_are_not_cached() {
        let registry = registry();
        let signatures = SignatureCache::new();
        let req = request("anything", "whatever", json!({}));

        resolve(&signatures, &registry, &req).unwrap();
        resolve(&signatures, &registry, &req).unwrap();
        assert_eq!(signatures.stats().writes, 0);
        assert_eq!(signatures.stats().hits, 0);
    }

    #[test]
    fn test_stale_cache_entry_for_removed_method() {
        let backend = Arc::new(MemoryCache::new());
        SignatureCache::new()
            .with_backend(backend.clone())
            .save(&signature_key("App\\Articles", "gone"), &SignatureEntry::default());

        let signatures = SignatureCache::new().with_backend(backend);
        let err = resolve(&signatures, &registry(), &request("articles", "gone", json!({})))
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::MethodNotFound { ref method, .. } if method == "gone"
        ));
        assert_eq!(signatures.stats().hits, 1);
    }

    #[test]
    fn test_invalid_filter_is_fatal() {
        let err = resolve(
            &SignatureCache::new(),
            &registry(),
            &request("articles", "broken", json!({})),
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidFilter { ref target, .. } if target == "App\\Articles#broken.x"));
    }

    #[test]
    fn test_form_binding() {
        let registry = registry();
        let signatures = SignatureCache::new();

        let mut resolved = resolve(
            &signatures,
            &registry,
            &request("articles", "edit", json!({"email": " a@example.com ", "login": "ignored"})),
        )
        .unwrap();
        let login = resolved.args.take_form::<Login>("login").unwrap();
        assert_eq!(login.email.as_deref(), Some("a@example.com"));
        assert!(!login.error);
        assert!(matches!(resolved.parent, Parent::Named(ref p) if p == "json"));

        let resolved = resolve(
            &signatures,
            &registry,
            &request("articles", "edit", json!({"email": "nope"})),
        )
        .unwrap();
        assert!(resolved.args.form::<Login>("login").unwrap().error);
        assert!(matches!(
            signatures.fetch::<FormEntry>(&form_key(&Login::form_name())),
            CacheLookup::Hit(_)
        ));
    }

    #[test]
    fn test_parent_finder_wins() {
        let registry = registry();
        let signatures = SignatureCache::new();
        let config = config();
        let finder: Arc<dyn ParentFinder> = Arc::new(|_: &str, method: &str| {
            (method == "show").then(|| Parent::named("/admin/layout"))
        });
        let finders = [finder];
        let handler = registry.handler("App\\Articles").unwrap();

        let resolved = ParameterResolver::new(&config, &registry, &signatures, &finders)
            .resolve(&handler, &request("articles", "show", json!({})))
            .unwrap();
        assert!(matches!(resolved.parent, Parent::Named(ref p) if p == "/admin/layout"));
    }
}
