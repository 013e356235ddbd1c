//! Bridge configuration from the process environment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::{BridgeError, BridgeResult};
use crate::serve::server_constants::{DEFAULT_BIND_ADDRESS, DEFAULT_PORT, DEFAULT_QUEUE_CAPACITY};

pub const ENV_BIND_ADDRESS: &str = "RHELP_BIND_ADDRESS";
pub const ENV_PORT: &str = "RHELP_PORT";
pub const ENV_HELP_CSS: &str = "RHELP_HELP_CSS";
pub const ENV_QUEUE_CAPACITY: &str = "RHELP_QUEUE_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub bind_address: IpAddr,
    /// Port 0 picks a free port.
    pub port: u16,
    /// Stylesheet served for `/help/library/R.css` instead of the handler's.
    pub help_css_path: Option<PathBuf>,
    /// Requests allowed to wait for the interpreter before new ones get 503.
    pub queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            help_css_path: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Read the `RHELP_*` variables. Call `load_env_files` first to pick up
    /// `.env` files.
    pub fn from_env() -> BridgeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> BridgeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_address = value(ENV_BIND_ADDRESS).unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = bind_address
            .parse::<IpAddr>()
            .map_err(|_| invalid(ENV_BIND_ADDRESS, &bind_address))?;

        let port = match value(ENV_PORT) {
            Some(port) => port.parse::<u16>().map_err(|_| invalid(ENV_PORT, &port))?,
            None => DEFAULT_PORT,
        };

        let queue_capacity = match value(ENV_QUEUE_CAPACITY) {
            Some(capacity) => capacity
                .parse::<usize>()
                .ok()
                .filter(|c| *c > 0)
                .ok_or_else(|| invalid(ENV_QUEUE_CAPACITY, &capacity))?,
            None => DEFAULT_QUEUE_CAPACITY,
        };

        Ok(Self {
            bind_address,
            port,
            help_css_path: value(ENV_HELP_CSS).map(PathBuf::from),
            queue_capacity,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

fn invalid(key: &str, value: &str) -> BridgeError {
    BridgeError::Config(format!("{}={:?}", key, value))
}
