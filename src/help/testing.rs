//! In-memory interpreter for unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::error::{EvalFault, HookError};
use crate::interpreter::{
    BrowseFileHandler, BrowseUrlHandler, Expr, Interpreter, NativeHook, ObjectRef, Value,
};

type Handler = Rc<dyn Fn(&[Value]) -> Result<Value, EvalFault>>;

#[derive(Default)]
pub struct FakeInterpreter {
    functions: HashMap<(String, String), Value>,
    variables: HashMap<(String, String), Value>,
    environments: HashMap<(ObjectRef, String), Value>,
    handlers: HashMap<ObjectRef, Handler>,
    builtins: HashMap<String, NativeHook>,
    browse_url: Option<BrowseUrlHandler>,
    browse_file: Option<BrowseFileHandler>,
    evaluations: Vec<(String, String)>,
    fault: Option<EvalFault>,
    panicking_symbol: Option<String>,
}

impl FakeInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_function(&mut self, namespace: &str, name: &str, value: Value) {
        self.functions
            .insert((namespace.to_string(), name.to_string()), value);
    }

    pub fn define_variable(&mut self, namespace: &str, name: &str, value: Value) {
        self.variables
            .insert((namespace.to_string(), name.to_string()), value);
    }

    pub fn define_in_environment(&mut self, env: ObjectRef, name: &str, value: Value) {
        self.environments.insert((env, name.to_string()), value);
    }

    /// Make the closure `closure` behave like `f` when called.
    pub fn define_handler<F>(&mut self, closure: ObjectRef, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, EvalFault> + 'static,
    {
        self.handlers.insert(closure, Rc::new(f));
    }

    /// Make every call evaluation fail with `fault`, as if the interpreter
    /// itself broke down.
    pub fn fail_calls_with(&mut self, fault: EvalFault) {
        self.fault = Some(fault);
    }

    /// Panic whenever `symbol` is evaluated, as a crash inside the
    /// interpreter would.
    pub fn panic_on_symbol(&mut self, symbol: &str) {
        self.panicking_symbol = Some(symbol.to_string());
    }

    pub fn evaluations_of(&self, symbol: &str) -> usize {
        self.evaluations.iter().filter(|(_, s)| s == symbol).count()
    }

    pub fn last_namespace(&self) -> Option<&str> {
        self.evaluations.last().map(|(ns, _)| ns.as_str())
    }

    pub fn call_builtin(&self, name: &str, args: Vec<Value>) -> Result<Value, HookError> {
        let hook = self
            .builtins
            .get(name)
            .ok_or_else(|| HookError::Registration(name.to_string()))?;
        hook.call(args)
    }

    pub fn browse_url(&self, url: &str) -> bool {
        self.browse_url.as_ref().map_or(false, |h| h(url))
    }

    pub fn browse_file(&self, path: &Path) -> bool {
        self.browse_file.as_ref().map_or(false, |h| h(path))
    }

    fn constant(&mut self, expr: &Expr, namespace: &str) -> Result<Value, EvalFault> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            other => self.evaluate(other, namespace),
        }
    }

    fn apply(&mut self, function: &Expr, args: &[Value], namespace: &str) -> Result<Value, EvalFault> {
        let callable = match function {
            Expr::Symbol(name) => self
                .find_function(name, Some(namespace))
                .ok_or_else(|| EvalFault::error(format!("could not find function \"{}\"", name)))?,
            other => self.constant(other, namespace)?,
        };
        let Value::Closure(id) = callable else {
            return Err(EvalFault::error("attempt to apply non-function"));
        };
        let handler = self
            .handlers
            .get(&id)
            .cloned()
            .ok_or_else(|| EvalFault::error(format!("closure {} has no body", id.0)))?;
        handler(args)
    }
}

impl Interpreter for FakeInterpreter {
    fn evaluate(&mut self, expr: &Expr, namespace: &str) -> Result<Value, EvalFault> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            Expr::Symbol(name) => {
                self.evaluations.push((namespace.to_string(), name.clone()));
                if self.panicking_symbol.as_deref() == Some(name.as_str()) {
                    panic!("evaluation of {} crashed", name);
                }
                self.variables
                    .get(&(namespace.to_string(), name.clone()))
                    .cloned()
                    .ok_or_else(|| EvalFault::error(format!("object '{}' not found", name)))
            }
            Expr::Call { function, args } => {
                self.evaluations.push((namespace.to_string(), "<call>".to_string()));
                if let Some(fault) = &self.fault {
                    return Err(fault.clone());
                }
                if **function == Expr::symbol("try") {
                    let Some(Expr::Call { function, args }) = args.first().map(|a| &a.value) else {
                        return Err(EvalFault::error("try() needs an expression"));
                    };
                    let values = args
                        .iter()
                        .map(|a| self.constant(&a.value, namespace))
                        .collect::<Result<Vec<_>, _>>()?;
                    // try() turns handler errors into a character result.
                    return match self.apply(function, &values, namespace) {
                        Err(EvalFault::Error(message)) => {
                            Ok(Value::string(format!("Error : {}\n", message)))
                        }
                        other => other,
                    };
                }
                let values = args
                    .iter()
                    .map(|a| self.constant(&a.value, namespace))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply(function, &values, namespace)
            }
        }
    }

    fn find_function(&mut self, name: &str, namespace: Option<&str>) -> Option<Value> {
        let namespace = namespace.unwrap_or("");
        self.functions
            .get(&(namespace.to_string(), name.to_string()))
            .or_else(|| self.functions.get(&(String::new(), name.to_string())))
            .cloned()
    }

    fn find_in_environment(&mut self, env: &Value, name: &str) -> Option<Value> {
        let Value::Environment(id) = env else {
            return None;
        };
        self.environments.get(&(*id, name.to_string())).cloned()
    }

    fn replace_builtin(&mut self, hook: NativeHook) -> Result<(), HookError> {
        self.builtins.insert(hook.name.clone(), hook);
        Ok(())
    }

    fn set_browse_url_handler(&mut self, handler: BrowseUrlHandler) {
        self.browse_url = Some(handler);
    }

    fn set_browse_file_handler(&mut self, handler: BrowseFileHandler) {
        self.browse_file = Some(handler);
    }
}
