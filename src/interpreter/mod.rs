//! Boundary to the embedded interpreter.
//!
//! The bridge never evaluates code itself. It builds call expressions, asks the
//! interpreter to evaluate them, and installs native replacements for the
//! built-ins the interpreter uses to start its own help daemon.

pub mod value;

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use crate::error::{EvalFault, HookError};

pub use value::{ObjectRef, Value};

/// Expression handed to [`Interpreter::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A value spliced directly into the call (e.g. a resolved closure).
    Constant(Value),
    /// A symbol looked up in the evaluation namespace.
    Symbol(String),
    Call { function: Box<Expr>, args: Vec<Arg> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Self { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn call(function: Expr, args: Vec<Arg>) -> Self {
        Expr::Call {
            function: Box::new(function),
            args,
        }
    }
}

/// Native replacement for an interpreter built-in.
#[derive(Clone)]
pub struct NativeHook {
    pub name: String,
    pub arity: usize,
    pub func: Rc<dyn Fn(Vec<Value>) -> Result<Value, HookError>>,
}

impl NativeHook {
    pub fn new<F>(name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, HookError> + 'static,
    {
        Self {
            name: name.into(),
            arity,
            func: Rc::new(func),
        }
    }

    /// Invoke the hook, rejecting calls with the wrong number of arguments.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, HookError> {
        if args.len() != self.arity {
            return Err(HookError::arity(&self.name, self.arity, args.len()));
        }
        (self.func)(args)
    }
}

impl fmt::Debug for NativeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHook({}/{})", self.name, self.arity)
    }
}

/// Called when interpreter code asks to open a URL. Returns true if handled.
pub type BrowseUrlHandler = Rc<dyn Fn(&str) -> bool>;

/// Called when interpreter code asks to open a local file. Returns true if handled.
pub type BrowseFileHandler = Rc<dyn Fn(&Path) -> bool>;

/// Capabilities the bridge needs from the embedded interpreter.
///
/// Implementations are single-threaded: the bridge only touches them from
/// the worker thread that owns them.
pub trait Interpreter {
    /// Evaluate `expr` with `namespace` as the enclosing environment.
    fn evaluate(&mut self, expr: &Expr, namespace: &str) -> Result<Value, EvalFault>;

    /// Find a function by name, optionally restricted to a namespace.
    fn find_function(&mut self, name: &str, namespace: Option<&str>) -> Option<Value>;

    /// Look up `name` in the frame of the environment `env` (no inheritance).
    fn find_in_environment(&mut self, env: &Value, name: &str) -> Option<Value>;

    /// Replace the internal built-in `hook.name` with a native implementation.
    fn replace_builtin(&mut self, hook: NativeHook) -> Result<(), HookError>;

    fn set_browse_url_handler(&mut self, handler: BrowseUrlHandler);

    fn set_browse_file_handler(&mut self, handler: BrowseFileHandler);
}
