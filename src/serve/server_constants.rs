//! Server configuration constants

use std::path::Path;

/// Default listen port of the session server
pub const DEFAULT_PORT: u16 = 8787;

/// Default bind address of the session server
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Capacity of the interpreter request queue (bounded channel for backpressure)
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Name of the thread that owns the interpreter
pub const INTERPRETER_THREAD_NAME: &str = "rhelp-interpreter";

/// Mount point of the help handler
pub const HELP_LOCATION: &str = "/help";

/// Mount point of custom handlers
pub const CUSTOM_LOCATION: &str = "/custom";

/// Path of the help stylesheet, relative to the help mount
pub const HELP_CSS_PATH: &str = "/library/R.css";

/// Content type used when a handler does not name one
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Dynamic content may be cached but must be revalidated on every use
pub const REVALIDATE_CACHE_CONTROL: &str = "public, max-age=0, must-revalidate";

/// MIME types for file-backed responses
pub const MIME_TYPES: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("svg", "image/svg+xml"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("gif", "image/gif"),
];

/// Get the MIME type for a file based on its extension.
pub fn get_mime_type(file_path: &Path) -> &'static str {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| MIME_TYPES.iter().find(|(k, _)| *k == ext).map(|(_, v)| *v))
        .unwrap_or("application/octet-stream")
}
