//! Recognizing URLs that point at the interpreter's own help daemon.

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::events::ClientEvent;

/// Scope of URLs served by custom handlers.
pub const CUSTOM_SCOPE: &str = "custom";

/// Address and port the interpreter asked its help daemon to listen on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonBinding {
    pub address: String,
    pub port: String,
}

impl DaemonBinding {
    pub fn new(address: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: port.into(),
        }
    }

    fn prefix(&self, host: &str) -> String {
        format!("http://{}:{}/", host, self.port)
    }

    /// Remainder of `url` if it targets this daemon under `scope`.
    ///
    /// The bound address is tried before `localhost`. The scope must follow the
    /// `http://host:port/` prefix directly and end at a path boundary.
    pub fn is_local_url(&self, url: &str, scope: &str) -> Option<String> {
        [self.address.as_str(), "localhost"]
            .into_iter()
            .find_map(|host| match_prefix(url, &self.prefix(host), scope))
    }
}

fn match_prefix(url: &str, prefix: &str, scope: &str) -> Option<String> {
    let rest = url.strip_prefix(prefix)?.strip_prefix(scope)?;
    if !scope.is_empty() && !(rest.is_empty() || rest.starts_with(['/', '?'])) {
        return None;
    }
    Some(rest.strip_prefix('/').unwrap_or(rest).to_string())
}

/// Session-wide slot for the daemon binding. The first recorded binding wins.
#[derive(Debug, Default)]
pub struct BindingSlot {
    cell: OnceCell<DaemonBinding>,
}

impl BindingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `binding`. Returns false if a binding was already recorded.
    pub fn record(&self, binding: DaemonBinding) -> bool {
        match self.cell.try_insert(binding) {
            Ok(recorded) => {
                info!(
                    "help daemon bound to {}:{}",
                    recorded.address, recorded.port
                );
                true
            }
            Err((existing, rejected)) => {
                if *existing != rejected {
                    warn!(
                        "ignoring help daemon rebind to {}:{}; keeping {}:{}",
                        rejected.address, rejected.port, existing.address, existing.port
                    );
                }
                false
            }
        }
    }

    pub fn get(&self) -> Option<&DaemonBinding> {
        self.cell.get()
    }

    /// Always none until the interpreter has started its help daemon.
    pub fn is_local_url(&self, url: &str, scope: &str) -> Option<String> {
        self.get()?.is_local_url(url, scope)
    }

    /// Classify a URL the interpreter wants to open. Custom handler URLs are
    /// checked before anything else served by the daemon.
    pub fn browse_event(&self, url: &str) -> Option<ClientEvent> {
        if let Some(custom_path) = self.is_local_url(url, CUSTOM_SCOPE) {
            return Some(ClientEvent::BrowseUrl(format!(
                "/{}/{}",
                CUSTOM_SCOPE, custom_path
            )));
        }
        self.is_local_url(url, "").map(ClientEvent::ShowHelp)
    }
}
