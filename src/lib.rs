//! rhelp-bridge: serves an embedded R interpreter's dynamic help through the
//! session's own HTTP server.
//!
//! The interpreter wants to run its own help daemon and hand out
//! `http://127.0.0.1:<port>/...` URLs. This crate keeps that daemon from
//! starting, answers `/help` and `/custom` requests by calling the
//! interpreter's httpd handlers, and turns attempts to open daemon URLs into
//! events for the client.
//!
//! # Layers
//!
//! - [`interpreter`]: the boundary trait an embedded interpreter implements
//! - [`help`]: request translation, handler lookup, result rendering
//! - [`serve`]: the hyper front end and the interpreter thread

// Allow some clippy lints that are stylistic and not critical
#![allow(clippy::result_large_err)]
#![allow(clippy::type_complexity)]

pub mod config;
pub mod error;
pub mod events;
pub mod filesystem;
pub mod help;
pub mod interpreter;
pub mod serve;

pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult, EvalFault, HookError};
pub use events::{ClientEvent, ClientEventQueue, ClientEventSink};
pub use filesystem::{FileSystem, OsFileSystem};
pub use help::{HelpBridge, Mount, SessionContext};
pub use interpreter::{Expr, Interpreter, NativeHook, ObjectRef, Value};
pub use serve::HelpServer;

use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `RHELP_LOG=rhelp_bridge=debug`.
pub const LOG_ENV: &str = "RHELP_LOG";

/// Install a formatted tracing subscriber filtered by `RHELP_LOG` (default
/// `info`). Does nothing if a subscriber is already installed.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
