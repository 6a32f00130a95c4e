//! Configuration loading and root folder resolution
//!
//! Missing or unreadable TOML files never stop a module from starting: the
//! loader logs a warning and falls back to compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SQE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "sqe.db";

/// Logging section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset (e.g. "info")
    pub level: String,
    /// Optional log file path
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Inference collaborator section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the vision/text extraction service
    pub endpoint: Option<String>,
    /// API key (lowest priority source; database and ENV win)
    pub api_key: Option<String>,
    /// Total request budget in seconds
    pub timeout_secs: u64,
    /// Client-side request quota
    pub requests_per_minute: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 30,
            requests_per_minute: 60,
        }
    }
}

/// Worker/HTTP section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5781,
        }
    }
}

/// Complete TOML configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub inference: InferenceConfig,
    pub worker: WorkerConfig,
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/sqe (or /var/lib/sqe for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("sqe"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/sqe"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("sqe"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/sqe"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("sqe"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\sqe"))
    } else {
        PathBuf::from("./sqe_data")
    }
}

/// Default TOML path for a module: `<config_dir>/sqe/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sqe").join(format!("{module_name}.toml")))
}

/// Load TOML configuration, falling back to defaults when the file is missing
///
/// A file that exists but cannot be parsed is an error: silently ignoring a
/// broken config would hide operator mistakes.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write TOML configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Root folder resolution
///
/// Priority order:
/// 1. Command-line argument
/// 2. `SQE_ROOT_FOLDER` environment variable
/// 3. `root_folder` from the module's TOML file
/// 4. OS-dependent compiled default
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        let module_name = module_name.into();
        let config_path = default_config_path(&module_name);
        Self {
            module_name,
            cli_arg: None,
            config_path,
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_config_path(mut self, config_path: PathBuf) -> Self {
        self.config_path = Some(config_path);
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(config_path) = &self.config_path {
            if config_path.exists() {
                match load_toml_config(config_path) {
                    Ok(TomlConfig {
                        root_folder: Some(root),
                        ..
                    }) => return root,
                    Ok(_) => {}
                    Err(e) => warn!(
                        "Ignoring unreadable config for {}: {}",
                        self.module_name, e
                    ),
                }
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder on first start and locates the database inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            tracing::info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }
}
