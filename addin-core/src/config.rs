//! Add-in host configuration
//!
//! Stored as TOML under the XDG config directory:
//!
//! ```toml
//! max_addins = 7
//! manifest_extension = "ini"
//! dispatch = "thread"
//! addin_dir = "/home/me/.config/addins/addins"
//! enforce_flavor = false
//! host_flavor = "windowed"
//! ```

use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use addin_api::HostFlavor;
use serde::{Deserialize, Serialize};

use crate::error::AddinError;
use crate::invoker::DispatchMode;
use crate::manifest::DEFAULT_MANIFEST_EXTENSION;

/// Maximum number of add-ins imported at once
pub const MAX_ADDINS: usize = 7;

/// Get the add-in config directory.
///
/// Returns `$XDG_CONFIG_HOME/addins` if set, otherwise `~/.config/addins`.
pub fn config_dir() -> PathBuf {
    config_dir_from(std::env::var_os("XDG_CONFIG_HOME"), dirs::home_dir())
}

/// Resolve the config directory from an XDG config home and a home
/// directory. An empty XDG value counts as unset.
pub fn config_dir_from(xdg_config: Option<OsString>, home: Option<PathBuf>) -> PathBuf {
    match (xdg_config, home) {
        (Some(xdg_config), _) if !xdg_config.is_empty() => PathBuf::from(xdg_config).join("addins"),
        (_, Some(home)) => home.join(".config/addins"),
        _ => PathBuf::from(".config/addins"),
    }
}

/// Flavor of the running host. On Windows a host attached to a console is
/// the console build; everywhere else the host is windowed.
pub fn detect_host_flavor() -> HostFlavor {
    if cfg!(windows) && std::io::stdout().is_terminal() {
        HostFlavor::Console
    } else {
        HostFlavor::Windowed
    }
}

/// Configuration for the add-in host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddinHostConfig {
    /// Maximum number of imported add-ins
    pub max_addins: usize,
    /// Extension of the sidecar manifest
    pub manifest_extension: String,
    /// Truncate manifest strings to this many characters
    pub max_manifest_value_chars: Option<usize>,
    /// How add-in code is run
    pub dispatch: DispatchMode,
    /// Directory scanned for add-ins
    pub addin_dir: PathBuf,
    /// Reject add-ins built for a different host flavor
    pub enforce_flavor: bool,
    pub host_flavor: HostFlavor,
}

impl Default for AddinHostConfig {
    fn default() -> Self {
        Self {
            max_addins: MAX_ADDINS,
            manifest_extension: DEFAULT_MANIFEST_EXTENSION.to_string(),
            max_manifest_value_chars: None,
            dispatch: DispatchMode::default(),
            addin_dir: config_dir().join("addins"),
            enforce_flavor: cfg!(windows),
            host_flavor: detect_host_flavor(),
        }
    }
}

impl AddinHostConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load from the default location
    pub fn load() -> Result<Self, AddinError> {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self, AddinError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No add-in config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| AddinError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Write to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), AddinError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| AddinError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
