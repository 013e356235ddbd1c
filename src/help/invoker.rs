//! Calling httpd handlers inside the interpreter.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::error::EvalFault;
use crate::help::request::CallFrame;
use crate::help::resolver::TOOLS_NAMESPACE;
use crate::interpreter::{Arg, Expr, Interpreter, Value};

/// Build `try(<handler>(path, query, body), silent = TRUE)`.
pub fn handler_call(handler: Expr, frame: CallFrame) -> Expr {
    Expr::call(
        Expr::symbol("try"),
        vec![
            Arg::positional(Expr::call(handler, frame.into_args())),
            Arg::named("silent", Expr::Constant(Value::logical(true))),
        ],
    )
}

/// Resolve the handler with `resolve` and call it with `frame` in the tools
/// namespace. Lookup and call both run inside [`execute_safely`]: interpreter
/// errors and panics come back as an [`EvalFault`] and nothing unwinds past
/// this call.
pub fn invoke<I, R>(interpreter: &mut I, resolve: R, frame: CallFrame) -> Result<Value, EvalFault>
where
    I: Interpreter + ?Sized,
    R: FnOnce(&mut I) -> Expr,
{
    execute_safely(|| {
        let handler = resolve(&mut *interpreter);
        interpreter.evaluate(&handler_call(handler, frame), TOOLS_NAMESPACE)
    })
}

/// Run `f`, turning a panic into [`EvalFault::Panic`].
pub fn execute_safely<T, F>(f: F) -> Result<T, EvalFault>
where
    F: FnOnce() -> Result<T, EvalFault>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("interpreter panicked while serving help request: {}", message);
            Err(EvalFault::panic(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
