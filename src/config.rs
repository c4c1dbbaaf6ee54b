//! Locating the discovery daemon.

use std::path::PathBuf;

/// Environment variable overriding the daemon's socket path.
pub const SOCKET_ENV: &str = "META_SOCKET";

/// Environment variable holding a literal JSON configuration payload. When
/// set, [`DiscoveryClient::config`] returns it instead of asking the daemon.
///
/// [`DiscoveryClient::config`]: crate::DiscoveryClient::config
pub const CONFIG_ENV: &str = "META_CONFIG";

/// Socket path used when [`SOCKET_ENV`] is unset.
pub const DEFAULT_SOCKET: &str = "/run/meta.sock";

/// Settings for reaching the discovery daemon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Path of the daemon's unix domain socket.
    pub socket_path: PathBuf,
}

impl Config {
    /// Creates a configuration pointing at `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_socket_var(std::env::var(SOCKET_ENV).ok())
    }

    fn from_socket_var(value: Option<String>) -> Self {
        match value {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET)
    }
}

/// Returns the [`CONFIG_ENV`] payload, if one is set.
pub(crate) fn config_override() -> Option<String> {
    std::env::var(CONFIG_ENV).ok().filter(|cfg| !cfg.is_empty())
}
