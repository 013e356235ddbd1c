//! Choosing the interpreter function that serves a request.

use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{debug, warn};

use crate::interpreter::{Expr, Interpreter, Value};

/// Namespace holding the help handler and the custom handler registry.
pub const TOOLS_NAMESPACE: &str = "tools";

/// The interpreter's help handler.
pub const HELP_HANDLER: &str = "httpd";

/// Expression evaluating to the environment of registered custom handlers.
pub const CUSTOM_HANDLERS_ENV: &str = ".httpd.handlers.env";

/// Handler invoked when no custom handler matches.
pub const LOOKUP_ERROR_HANDLER: &str = ".rs.handlerLookupError";

lazy_static! {
    static ref CUSTOM_HANDLER_NAME: Regex =
        Regex::new(r"^.*/custom/([A-Za-z0-9_\-]*)").expect("custom handler pattern is valid");
}

/// Name of the custom handler addressed by `uri`, if it has the `/custom/<name>` form.
pub fn custom_handler_name(uri: &str) -> Option<&str> {
    CUSTOM_HANDLER_NAME
        .captures(uri)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// How a mount picks its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerPolicy {
    /// Always `tools:::httpd`.
    Help,
    /// Looked up by name in the custom handler registry.
    Custom,
}

/// Lazily resolved custom handler registry. Filled by the first successful
/// evaluation and reused for the rest of the session.
#[derive(Debug, Default)]
pub struct CustomHandlerCache {
    registry: OnceCell<Value>,
}

impl CustomHandlerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.registry.get().is_some()
    }

    fn registry<I: Interpreter + ?Sized>(&self, interpreter: &mut I) -> Option<&Value> {
        if let Some(registry) = self.registry.get() {
            return Some(registry);
        }
        match interpreter.evaluate(&Expr::symbol(CUSTOM_HANDLERS_ENV), TOOLS_NAMESPACE) {
            Ok(value) => Some(self.registry.get_or_init(|| value)),
            Err(fault) => {
                warn!("failed to load {}: {}", CUSTOM_HANDLERS_ENV, fault);
                None
            }
        }
    }
}

/// Resolves handlers for the two mounts.
#[derive(Debug, Default)]
pub struct HandlerResolver {
    custom: CustomHandlerCache,
}

impl HandlerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn custom_cache(&self) -> &CustomHandlerCache {
        &self.custom
    }

    /// The function to call for `path` under `policy`. Always yields a callable
    /// expression; lookup failures resolve to the lookup-error handler.
    pub fn resolve<I: Interpreter + ?Sized>(
        &self,
        interpreter: &mut I,
        policy: HandlerPolicy,
        path: &str,
    ) -> Expr {
        match policy {
            HandlerPolicy::Help => interpreter
                .find_function(HELP_HANDLER, Some(TOOLS_NAMESPACE))
                .map(Expr::Constant)
                .unwrap_or_else(|| Expr::symbol(HELP_HANDLER)),
            HandlerPolicy::Custom => self
                .lookup_custom(interpreter, path)
                .map(Expr::Constant)
                .unwrap_or_else(|| lookup_error_handler(interpreter)),
        }
    }

    fn lookup_custom<I: Interpreter + ?Sized>(&self, interpreter: &mut I, path: &str) -> Option<Value> {
        let name = custom_handler_name(path)?;
        let registry = self.custom.registry(interpreter)?;
        if !matches!(registry, Value::Environment(_)) {
            debug!("{} is a {}, not an environment", CUSTOM_HANDLERS_ENV, registry.type_name());
            return None;
        }
        let handler = interpreter.find_in_environment(registry, name)?;
        if handler.is_closure() {
            Some(handler)
        } else {
            debug!("custom handler '{}' is a {}, not a closure", name, handler.type_name());
            None
        }
    }
}

fn lookup_error_handler<I: Interpreter + ?Sized>(interpreter: &mut I) -> Expr {
    interpreter
        .find_function(LOOKUP_ERROR_HANDLER, None)
        .map(Expr::Constant)
        .unwrap_or_else(|| Expr::symbol(LOOKUP_ERROR_HANDLER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::help::testing::FakeInterpreter;
    use crate::interpreter::ObjectRef;
    use pretty_assertions::assert_eq;

    const REGISTRY: Value = Value::Environment(ObjectRef(1));
    const SHINY: Value = Value::Closure(ObjectRef(10));
    const HTTPD: Value = Value::Closure(ObjectRef(20));
    const LOOKUP_ERROR: Value = Value::Closure(ObjectRef(30));

    fn interpreter() -> FakeInterpreter {
        let mut interp = FakeInterpreter::new();
        interp.define_function("tools", HELP_HANDLER, HTTPD);
        interp.define_function("", LOOKUP_ERROR_HANDLER, LOOKUP_ERROR);
        interp.define_variable("tools", CUSTOM_HANDLERS_ENV, REGISTRY);
        interp.define_in_environment(ObjectRef(1), "shiny", SHINY);
        interp.define_in_environment(ObjectRef(1), "data", Value::string("not a function"));
        interp
    }

    #[test]
    fn test_custom_handler_name() {
        assert_eq!(custom_handler_name("/custom/shiny/index.html"), Some("shiny"));
        assert_eq!(custom_handler_name("/custom/my-app_2"), Some("my-app_2"));
        assert_eq!(custom_handler_name("/session/custom/app/x"), Some("app"));
        assert_eq!(custom_handler_name("/custom/"), Some(""));
        assert_eq!(custom_handler_name("/help/library"), None);
    }

    #[test]
    fn test_help_policy_is_fixed() {
        let mut interp = interpreter();
        let resolver = HandlerResolver::new();
        assert_eq!(
            resolver.resolve(&mut interp, HandlerPolicy::Help, "/custom/shiny/x"),
            Expr::Constant(HTTPD)
        );
        assert!(!resolver.custom_cache().is_loaded());
    }

    #[test]
    fn test_custom_lookup_and_fallback() {
        let mut interp = interpreter();
        let resolver = HandlerResolver::new();
        assert_eq!(
            resolver.resolve(&mut interp, HandlerPolicy::Custom, "/custom/shiny/index.html"),
            Expr::Constant(SHINY)
        );
        for path in ["/custom/missing/x", "/custom/data", "/other/path"] {
            assert_eq!(
                resolver.resolve(&mut interp, HandlerPolicy::Custom, path),
                Expr::Constant(LOOKUP_ERROR),
                "{}",
                path
            );
        }
    }

    #[test]
    fn test_registry_evaluated_once() {
        let mut interp = interpreter();
        let resolver = HandlerResolver::new();
        resolver.resolve(&mut interp, HandlerPolicy::Custom, "/custom/shiny/a");
        resolver.resolve(&mut interp, HandlerPolicy::Custom, "/custom/shiny/b");
        assert!(resolver.custom_cache().is_loaded());
        assert_eq!(interp.evaluations_of(CUSTOM_HANDLERS_ENV), 1);
    }

    #[test]
    fn test_registry_not_an_environment() {
        let mut interp = interpreter();
        interp.define_variable("tools", CUSTOM_HANDLERS_ENV, Value::Null);
        let resolver = HandlerResolver::new();
        assert_eq!(
            resolver.resolve(&mut interp, HandlerPolicy::Custom, "/custom/shiny/x"),
            Expr::Constant(LOOKUP_ERROR)
        );
    }

    #[test]
    fn test_missing_functions_fall_back_to_symbols() {
        let mut interp = FakeInterpreter::new();
        let resolver = HandlerResolver::new();
        assert_eq!(
            resolver.resolve(&mut interp, HandlerPolicy::Help, "/"),
            Expr::symbol(HELP_HANDLER)
        );
        assert_eq!(
            resolver.resolve(&mut interp, HandlerPolicy::Custom, "/custom/x"),
            Expr::symbol(LOOKUP_ERROR_HANDLER)
        );
        assert!(!resolver.custom_cache().is_loaded());
    }
}
