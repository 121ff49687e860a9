//! Configuration from `lilium.toml`.
//!
//! ```toml
//! [vm]
//! register_file_size = 65536
//! max_call_stack = 1024
//! max_steps = 0
//! trace = false
//!
//! [compiler]
//! output_dir = "build"
//! ```
//!
//! Every key is optional. Discovery order: an explicit path, then
//! `./lilium.toml`, then `<config dir>/lilium/lilium.toml`, then defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::backend::bytecode::vm::{VmConfig, MIN_REGISTERS};

/// File name looked up in the working directory and the user config directory
pub const CONFIG_FILE: &str = "lilium.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// VM limits and tracing (the `[vm]` section).
    pub vm: VmConfig,

    /// Compiler output (the `[compiler]` section).
    pub compiler: CompilerConfig,
}

/// The `[compiler]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Directory for `.mod` files; next to the source when unset.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Cannot read {}: {}", path.display(), e),
            ConfigError::Parse(path, e) => write!(f, "Invalid config {}: {}", path.display(), e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            ConfigError::Parse(_, e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl Config {
    /// Parse and validate configuration from TOML content.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        debug!(target: "lilium::config", path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load the explicit file if given, else the first discovered one, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        match Self::discover() {
            Some(path) => Self::load_from_path(&path),
            None => {
                debug!(target: "lilium::config", "no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// First existing file among `./lilium.toml` and the user config directory.
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        let user = dirs::config_dir().map(|dir| dir.join("lilium").join(CONFIG_FILE));
        std::iter::once(local).chain(user).find(|path| path.is_file())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vm.register_file_size < MIN_REGISTERS {
            return Err(ConfigError::Invalid(format!(
                "vm.register_file_size must be at least {}, got {}",
                MIN_REGISTERS, self.vm.register_file_size
            )));
        }
        if self.vm.max_call_stack == 0 {
            return Err(ConfigError::Invalid("vm.max_call_stack must be positive".to_string()));
        }
        Ok(())
    }

    /// Output path of the module compiled from `source`.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let file = source.with_extension("mod");
        match (&self.compiler.output_dir, file.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => file,
        }
    }
}
