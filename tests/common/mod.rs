//! Scripted interpreter used by the integration tests.
//!
//! It understands just enough to run the calls the bridge makes:
//! `try(<handler>(path, query, body), silent = TRUE)` and symbol lookups.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use rhelp_bridge::error::{EvalFault, HookError};
use rhelp_bridge::help::resolver::{CUSTOM_HANDLERS_ENV, HELP_HANDLER, LOOKUP_ERROR_HANDLER, TOOLS_NAMESPACE};
use rhelp_bridge::interpreter::{BrowseFileHandler, BrowseUrlHandler};
use rhelp_bridge::{BridgeConfig, ClientEventQueue, Expr, HelpServer, Interpreter, NativeHook, ObjectRef, Value};

/// What a scripted handler can reach besides its arguments.
#[derive(Default)]
pub struct Runtime {
    builtins: RefCell<HashMap<String, NativeHook>>,
    browse_url: RefCell<Option<BrowseUrlHandler>>,
    browse_file: RefCell<Option<BrowseFileHandler>>,
}

impl Runtime {
    pub fn call_builtin(&self, name: &str, args: Vec<Value>) -> Result<Value, HookError> {
        let hook = self
            .builtins
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| HookError::Registration(name.to_string()))?;
        hook.call(args)
    }

    pub fn browse_url(&self, url: &str) -> bool {
        let handler = self.browse_url.borrow().clone();
        handler.map_or(false, |h| h(url))
    }

    pub fn browse_file(&self, path: &Path) -> bool {
        let handler = self.browse_file.borrow().clone();
        handler.map_or(false, |h| h(path))
    }
}

type Handler = Rc<dyn Fn(&Runtime, &[Value]) -> Result<Value, EvalFault>>;

#[derive(Default)]
pub struct ScriptedInterpreter {
    runtime: Rc<Runtime>,
    functions: HashMap<String, Value>,
    variables: HashMap<String, Value>,
    environment: HashMap<String, Value>,
    handlers: HashMap<ObjectRef, Handler>,
    next_id: u64,
}

pub const REGISTRY: ObjectRef = ObjectRef(0);

impl ScriptedInterpreter {
    pub fn new() -> Self {
        let mut interp = Self {
            next_id: 1,
            ..Default::default()
        };
        interp
            .variables
            .insert(CUSTOM_HANDLERS_ENV.to_string(), Value::Environment(REGISTRY));
        interp
    }

    fn closure<F>(&mut self, f: F) -> Value
    where
        F: Fn(&Runtime, &[Value]) -> Result<Value, EvalFault> + 'static,
    {
        let id = ObjectRef(self.next_id);
        self.next_id += 1;
        self.handlers.insert(id, Rc::new(f));
        Value::Closure(id)
    }

    /// Install `tools::httpd`.
    pub fn with_help_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Runtime, &[Value]) -> Result<Value, EvalFault> + 'static,
    {
        let closure = self.closure(f);
        self.functions.insert(HELP_HANDLER.to_string(), closure);
        self
    }

    /// Register `name` in the custom handler environment.
    pub fn with_custom_handler<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Runtime, &[Value]) -> Result<Value, EvalFault> + 'static,
    {
        let closure = self.closure(f);
        self.environment.insert(name.to_string(), closure);
        self
    }

    pub fn with_lookup_error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Runtime, &[Value]) -> Result<Value, EvalFault> + 'static,
    {
        let closure = self.closure(f);
        self.functions.insert(LOOKUP_ERROR_HANDLER.to_string(), closure);
        self
    }

    fn value_of(&mut self, expr: &Expr, namespace: &str) -> Result<Value, EvalFault> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            other => self.evaluate(other, namespace),
        }
    }

    fn apply(&mut self, function: &Expr, args: &[Value]) -> Result<Value, EvalFault> {
        let callable = match function {
            Expr::Symbol(name) => self
                .functions
                .get(name)
                .cloned()
                .ok_or_else(|| EvalFault::error(format!("could not find function \"{}\"", name)))?,
            Expr::Constant(value) => value.clone(),
            Expr::Call { .. } => return Err(EvalFault::error("attempt to apply non-function")),
        };
        let Value::Closure(id) = callable else {
            return Err(EvalFault::error("attempt to apply non-function"));
        };
        let handler = self
            .handlers
            .get(&id)
            .cloned()
            .ok_or_else(|| EvalFault::error("attempt to apply non-function"))?;
        handler(&self.runtime, args)
    }
}

impl Interpreter for ScriptedInterpreter {
    fn evaluate(&mut self, expr: &Expr, namespace: &str) -> Result<Value, EvalFault> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            Expr::Symbol(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| EvalFault::error(format!("object '{}' not found", name))),
            Expr::Call { function, args } => {
                let is_try = **function == Expr::symbol("try");
                let (function, args) = match (is_try, args.first().map(|a| &a.value)) {
                    (true, Some(Expr::Call { function, args })) => (&**function, args),
                    _ => (&**function, args),
                };
                let values = args
                    .iter()
                    .map(|a| self.value_of(&a.value, namespace))
                    .collect::<Result<Vec<_>, _>>()?;
                match self.apply(function, &values) {
                    Err(EvalFault::Error(message)) if is_try => {
                        Ok(Value::string(format!("Error : {}\n", message)))
                    }
                    other => other,
                }
            }
        }
    }

    fn find_function(&mut self, name: &str, namespace: Option<&str>) -> Option<Value> {
        if namespace.map_or(false, |ns| ns != TOOLS_NAMESPACE) {
            return None;
        }
        self.functions.get(name).cloned()
    }

    fn find_in_environment(&mut self, env: &Value, name: &str) -> Option<Value> {
        match env {
            Value::Environment(id) if *id == REGISTRY => self.environment.get(name).cloned(),
            _ => None,
        }
    }

    fn replace_builtin(&mut self, hook: NativeHook) -> Result<(), HookError> {
        self.runtime
            .builtins
            .borrow_mut()
            .insert(hook.name.clone(), hook);
        Ok(())
    }

    fn set_browse_url_handler(&mut self, handler: BrowseUrlHandler) {
        *self.runtime.browse_url.borrow_mut() = Some(handler);
    }

    fn set_browse_file_handler(&mut self, handler: BrowseFileHandler) {
        *self.runtime.browse_file.borrow_mut() = Some(handler);
    }
}

/// A help server on a free local port, serving in the background.
pub struct TestServer {
    pub base_url: String,
    pub events: Arc<ClientEventQueue>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start<F>(config: BridgeConfig, factory: F) -> Self
    where
        F: FnOnce() -> ScriptedInterpreter + Send + 'static,
    {
        rhelp_bridge::init_logging();
        let events = Arc::new(ClientEventQueue::new());
        let config = BridgeConfig { port: 0, ..config };
        let server = HelpServer::bind(&config, events.clone(), factory)
            .await
            .expect("help server binds");
        let base_url = format!("http://{}", server.local_addr());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(server.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        Self {
            base_url,
            events,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
