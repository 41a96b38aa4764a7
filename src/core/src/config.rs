//! Inspection configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{InspectError, Result};

/// Directories scanned, in order, when resolving an executable by name.
pub const DEFAULT_SEARCH_ROOTS: [&str; 4] = ["/bin", "/usr/bin", "/sbin", "/usr/sbin"];

/// Inspection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Path to the guestfish binary
    pub guestfish: PathBuf,

    /// Disk image format hint (e.g. "qcow2"); autodetected when unset
    pub format: Option<String>,

    /// Attach the disk read-only
    pub readonly: bool,

    /// Enable SELinux support in the inspection appliance
    pub selinux: bool,

    /// Account database inside the guest
    pub passwd_path: String,

    /// Lowest uid treated as a human account
    pub min_uid: u32,

    /// Executable search roots, scanned in order
    pub search_roots: Vec<String>,

    /// Config-tree editor options
    pub augeas: AugeasOptions,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            guestfish: PathBuf::from("guestfish"),
            format: None,
            readonly: false,
            selinux: true,
            passwd_path: "/etc/passwd".to_string(),
            min_uid: 1000,
            search_roots: DEFAULT_SEARCH_ROOTS.iter().map(|s| s.to_string()).collect(),
            augeas: AugeasOptions::default(),
        }
    }
}

impl InspectConfig {
    /// Load a YAML configuration file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            InspectError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that guest paths are absolute and a search root is configured.
    pub fn validate(&self) -> Result<()> {
        if !self.passwd_path.starts_with('/') {
            return Err(InspectError::ConfigError(format!(
                "passwd_path must be absolute: {}",
                self.passwd_path
            )));
        }
        if self.search_roots.is_empty() {
            return Err(InspectError::ConfigError(
                "at least one search root is required".to_string(),
            ));
        }
        if let Some(root) = self.search_roots.iter().find(|r| !r.starts_with('/')) {
            return Err(InspectError::ConfigError(format!(
                "search root must be absolute: {}",
                root
            )));
        }
        Ok(())
    }
}

/// Options for the guest config-tree editor (augeas).
///
/// Only `save_backup` is enabled by default: modified files keep a
/// `.augsave` copy of their previous content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugeasOptions {
    /// Keep the original file with a `.augsave` extension on save
    pub save_backup: bool,
    /// Write changes to a `.augnew` file instead of overwriting
    pub save_new_file: bool,
    /// Typecheck lenses when loading
    pub type_check: bool,
    /// Do not use the standard lens load path
    pub no_std_include: bool,
    /// Make save a no-op, only record what would change
    pub save_noop: bool,
    /// Do not load the tree during initialization
    pub no_load: bool,
}

impl Default for AugeasOptions {
    fn default() -> Self {
        Self {
            save_backup: true,
            save_new_file: false,
            type_check: false,
            no_std_include: false,
            save_noop: false,
            no_load: false,
        }
    }
}

/// Log verbosity selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            _ => Err(format!("{} is not a supported loglevel", s)),
        }
    }
}
