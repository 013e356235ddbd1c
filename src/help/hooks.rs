//! Native replacements for the interpreter's help daemon built-ins.
//!
//! The interpreter normally starts its own HTTP daemon to serve dynamic help.
//! These hooks record where it wanted that daemon to listen and keep it from
//! opening a socket; requests are served through the session server instead.
//! URL and file open requests that point at the daemon are turned into client
//! events.

use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::error::HookError;
use crate::events::ClientEvent;
use crate::help::locality::DaemonBinding;
use crate::help::SessionContext;
use crate::interpreter::{Interpreter, NativeHook, Value};

pub const START_HTTPD: &str = "startHTTPD";
pub const STOP_HTTPD: &str = "stopHTTPD";

lazy_static! {
    static ref MANUAL_FILE: Regex = Regex::new(r"^.*/(doc/manual/[A-Za-z0-9_\-]*\.html)$")
        .expect("manual file pattern is valid");
}

/// Install the daemon hooks and the browse handlers for `session`.
pub fn register_help_hooks<I: Interpreter + ?Sized>(
    interpreter: &mut I,
    session: &Arc<SessionContext>,
) -> Result<(), HookError> {
    interpreter.replace_builtin(start_httpd_hook(session.clone()))?;
    interpreter.replace_builtin(stop_httpd_hook())?;

    let url_session = session.clone();
    interpreter.set_browse_url_handler(Rc::new(move |url: &str| handle_browse_url(&url_session, url)));

    let file_session = session.clone();
    interpreter
        .set_browse_file_handler(Rc::new(move |path: &Path| handle_browse_file(&file_session, path)));

    Ok(())
}

/// `startHTTPD(ip, port)`: record the binding and report success (`0L`).
pub fn start_httpd_hook(session: Arc<SessionContext>) -> NativeHook {
    NativeHook::new(START_HTTPD, 2, move |args| {
        let address = string_argument(&args[0])?;
        let port = string_argument(&args[1])?;
        session.binding().record(DaemonBinding::new(address, port));
        Ok(Value::integer(0))
    })
}

/// `stopHTTPD()`: nothing to stop. The binding stays recorded.
pub fn stop_httpd_hook() -> NativeHook {
    NativeHook::new(STOP_HTTPD, 0, |_| Ok(Value::Null))
}

fn string_argument(value: &Value) -> Result<String, HookError> {
    match value {
        Value::Character { .. } | Value::Integer(_) | Value::Double(_) => value
            .as_scalar_string()
            .ok_or_else(|| HookError::invalid_argument(START_HTTPD, "character(0)")),
        other => Err(HookError::invalid_argument(START_HTTPD, other.type_name())),
    }
}

/// Route a URL the interpreter wants to open. Returns true if it was handled.
pub fn handle_browse_url(session: &SessionContext, url: &str) -> bool {
    match session.binding().browse_event(url) {
        Some(event) => {
            session.emit(event);
            true
        }
        None => false,
    }
}

/// Help-relative path of a legacy manual file, e.g. `doc/manual/R-intro.html`.
pub fn manual_help_path(path: &Path) -> Option<String> {
    let path = path.to_str()?;
    MANUAL_FILE
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Redirect opens of the bundled manuals to the help pane.
pub fn handle_browse_file(session: &SessionContext, path: &Path) -> bool {
    match manual_help_path(path) {
        Some(help_path) => {
            debug!("showing manual {} in help pane", help_path);
            session.emit(ClientEvent::ShowHelp(help_path));
            true
        }
        None => false,
    }
}
