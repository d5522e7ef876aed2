//! Bootstrap configuration loading and root folder resolution
//!
//! The TOML file is read once at startup. Everything in it has a built-in
//! default, so a missing file is not fatal.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "VANNO_ROOT_FOLDER";

/// Name of the database profile synthesized when none are configured
pub const LOCAL_PROFILE: &str = "local";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root folder holding databases and registry files
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Profile opened at startup
    #[serde(default = "default_database")]
    pub default_database: String,

    /// Named databases a researcher may switch between at runtime
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseProfile>,

    /// Registry file locations (relative to the root folder)
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Analysis defaults
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One selectable database
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseProfile {
    /// Human-readable name shown in the researcher UI
    pub label: String,
    /// SQLite file, relative to the root folder unless absolute
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_videos_file")]
    pub videos_file: PathBuf,
    #[serde(default = "default_sliders_file")]
    pub sliders_file: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            videos_file: default_videos_file(),
            sliders_file: default_sliders_file(),
        }
    }
}

/// Analysis defaults
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Cluster count of the default (cached) clustering view
    #[serde(default = "default_clusters")]
    pub default_clusters: usize,

    /// Value used to pad series that start late or end early
    ///
    /// Midpoint of the 0-100 rating scale.
    #[serde(default = "default_neutral_value")]
    pub neutral_value: f64,

    /// Latest accepted rating timestamp, seconds
    ///
    /// Saves beyond it are rejected and stored ratings beyond it are treated
    /// as malformed, which bounds the length of every chart grid.
    #[serde(default = "default_max_timestamp")]
    pub max_timestamp: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_clusters: default_clusters(),
            neutral_value: default_neutral_value(),
            max_timestamp: default_max_timestamp(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_port() -> u16 {
    5780
}

fn default_database() -> String {
    LOCAL_PROFILE.to_string()
}

fn default_videos_file() -> PathBuf {
    PathBuf::from("video_conf.txt")
}

fn default_sliders_file() -> PathBuf {
    PathBuf::from("input_conf.txt")
}

fn default_clusters() -> usize {
    3
}

fn default_neutral_value() -> f64 {
    50.0
}

fn default_max_timestamp() -> f64 {
    // One day
    86_400.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            root_folder: None,
            default_database: default_database(),
            databases: BTreeMap::new(),
            registry: RegistryConfig::default(),
            analysis: AnalysisConfig::default(),
            logging: LoggingConfig::default(),
        }
        .with_local_profile()
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields the built-in defaults; a file that exists but
    /// does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        let config = config.with_local_profile();

        if !config.databases.contains_key(&config.default_database) {
            return Err(Error::Config(format!(
                "default_database '{}' is not a configured database",
                config.default_database
            )));
        }
        if config.analysis.default_clusters == 0 {
            return Err(Error::Config(
                "analysis.default_clusters must be at least 1".to_string(),
            ));
        }

        let max_timestamp = config.analysis.max_timestamp;
        if !max_timestamp.is_finite() || max_timestamp <= 0.0 {
            return Err(Error::Config(format!(
                "analysis.max_timestamp must be a positive number of seconds, got {}",
                max_timestamp
            )));
        }

        Ok(config)
    }

    fn with_local_profile(mut self) -> Self {
        if self.databases.is_empty() {
            self.databases.insert(
                LOCAL_PROFILE.to_string(),
                DatabaseProfile {
                    label: "Local database".to_string(),
                    path: PathBuf::from("vanno.db"),
                },
            );
        }
        self
    }

    /// Resolve a database profile to an absolute SQLite path
    pub fn database_path(&self, root: &Path, name: &str) -> Result<PathBuf> {
        let profile = self
            .databases
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("database profile '{}'", name)))?;
        Ok(resolve_under(root, &profile.path))
    }

    pub fn videos_path(&self, root: &Path) -> PathBuf {
        resolve_under(root, &self.registry.videos_file)
    }

    pub fn sliders_path(&self, root: &Path) -> PathBuf {
        resolve_under(root, &self.registry.sliders_file)
    }
}

fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/vanno
        dirs::data_local_dir()
            .map(|d| d.join("vanno"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/vanno"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/vanno
        dirs::data_dir()
            .map(|d| d.join("vanno"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/vanno"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\vanno
        dirs::data_local_dir()
            .map(|d| d.join("vanno"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\vanno"))
    } else {
        PathBuf::from("./vanno_data")
    }
}
