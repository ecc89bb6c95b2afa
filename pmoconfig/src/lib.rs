//! # PMORadio Configuration Module
//!
//! This module provides configuration management for the PMORadio station:
//! - Loading configuration from a YAML file given on the command line
//! - Merging with the embedded default configuration
//! - Environment variable overrides
//! - Typed getters with defaults for every station setting
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::{get_config, init_config};
//!
//! init_config(Some("/etc/pmoradio/config.yaml"))?;
//! let config = get_config();
//!
//! let port = config.get_icecast_port();
//! let music = config.get_music_dir()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use dirs::home_dir;
use once_cell::sync::OnceCell;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmoradio.yaml");

static CONFIG: OnceCell<Arc<Config>> = OnceCell::new();

const ENV_CONFIG_FILE: &str = "PMORADIO_CONFIG";
const ENV_PREFIX: &str = "PMORADIO_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmoradio";
const CONFIG_FILE_NAME: &str = "config.yaml";

// Default values for configuration
const DEFAULT_ICECAST_PORT: u16 = 8000;
const DEFAULT_CHUNK_SIZE: usize = 4096;
const DEFAULT_MAX_RETRIES: usize = 5;
const DEFAULT_RETRY_DELAY_MS: usize = 3000;
const DEFAULT_IDLE_BACKOFF_SECS: usize = 5;
const DEFAULT_TRANSCODE_BITRATE: usize = 128;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";

/// Macro to generate a getter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> usize {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap_or_default() as usize,
                Ok(Value::String(s)) => s.trim().parse::<usize>().unwrap_or_else(|_| {
                    warn!(path = %$path.join("."), value = %s, "Invalid number, using default {}", $default);
                    $default
                }),
                _ => $default,
            }
        }
    };
}

/// Macro to generate a getter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            }
        }
    };
}

/// Macro to generate a getter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(Value::String(s)) => s,
                Ok(Value::Number(n)) => n.to_string(),
                _ => $default.to_string(),
            }
        }
    };
}

/// Configuration manager for PMORadio
///
/// Holds the merged YAML tree and the directory relative paths are
/// resolved against (the directory containing the configuration file).
#[derive(Debug)]
pub struct Config {
    base_dir: PathBuf,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Finds the configuration file by trying different locations in order
    ///
    /// 1. The provided `file` parameter
    /// 2. The `PMORADIO_CONFIG` environment variable
    /// 3. `.pmoradio/config.yaml` in the current directory
    /// 4. `.pmoradio/config.yaml` in the user's home directory
    fn find_config_file(file: Option<&str>) -> PathBuf {
        if let Some(file) = file.filter(|f| !f.is_empty()) {
            return PathBuf::from(file);
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_FILE) {
            info!(env_var = ENV_CONFIG_FILE, path = %env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        let local = Path::new(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        local
    }

    /// Loads the configuration
    ///
    /// This method:
    /// 1. Determines the configuration file
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external file if present
    /// 4. Applies environment variable overrides
    pub fn load_config(file: Option<&str>) -> Result<Self> {
        let path = Self::find_config_file(file);
        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)
                    .with_context(|| format!("Invalid YAML in {}", path.display()))?;
                merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using default embedded config");
            }
        }

        let mut config_value = Self::lower_keys_value(config_value);
        Self::apply_env_overrides(&mut config_value);

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Config {
            base_dir,
            path,
            data: Mutex::new(config_value),
        })
    }

    /// Builds a configuration from a YAML string merged over the defaults
    ///
    /// Relative paths are resolved against `base_dir`. Environment
    /// overrides are not applied.
    pub fn from_yaml_str(yaml: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external_value: Value = serde_yaml::from_str(yaml)?;
        merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
        let base_dir = base_dir.into();

        Ok(Config {
            path: base_dir.join(CONFIG_FILE_NAME),
            base_dir,
            data: Mutex::new(Self::lower_keys_value(config_value)),
        })
    }

    /// Path of the configuration file this instance was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks the settings the station cannot start without
    pub fn validate(&self) -> Result<()> {
        if self.get_icecast_host().trim().is_empty() {
            return Err(anyhow!("icecast.host must not be empty"));
        }
        match self.get_value(&["icecast", "port"]) {
            Ok(Value::Number(n)) if n.as_u64().is_some_and(|p| p > 0 && p <= u16::MAX as u64) => {}
            Ok(other) => return Err(anyhow!("icecast.port is not a valid port: {:?}", other)),
            Err(e) => return Err(e),
        }
        if !self.get_icecast_mount().starts_with('/') {
            return Err(anyhow!("icecast.mount must start with '/'"));
        }
        if self.get_transcode_enabled() && self.get_transcode_bitrate() == 0 {
            return Err(anyhow!("transcode.bitrate_kbps must be positive"));
        }
        if self.get_worker_chunk_size() == 0 {
            return Err(anyhow!("worker.chunk_size must be positive"));
        }
        Ok(())
    }

    /// Sets a configuration value at the specified path
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["icecast", "port"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value)
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        let mut current = &*data;
        for (i, key) in path.iter().enumerate() {
            match current {
                Value::Mapping(map) => match map.get(Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                },
                _ => return Err(anyhow!("Path {} is not a mapping", path[..i].join("."))),
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = serde_yaml::from_str::<Value>(&value)
                    .unwrap_or_else(|_| Value::String(value.clone()));
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(env_var = %key, "Ignoring config override: {}", e);
                }
            }
        }
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(k, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Résout un chemin relatif par rapport au répertoire de configuration
    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Répertoire contenant les fichiers audio de la station
    ///
    /// Le répertoire est créé s'il n'existe pas.
    pub fn get_music_dir(&self) -> Result<PathBuf> {
        let dir = self.resolve_path(&self.get_string_or(&["paths", "music"], "music"));
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!(directory = %dir.display(), "Created music directory");
        }
        Ok(dir)
    }

    /// Chemin de la base SQLite du catalogue
    ///
    /// Le répertoire parent est créé s'il n'existe pas.
    pub fn get_database_path(&self) -> Result<PathBuf> {
        let path = self.resolve_path(&self.get_string_or(&["paths", "database"], "radio.db"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Binaire ffmpeg utilisé pour le transcodage
    ///
    /// A bare program name is looked up in `PATH`, anything containing a
    /// separator is resolved like the other paths.
    pub fn get_ffmpeg_path(&self) -> PathBuf {
        let value = self.get_string_or(&["paths", "ffmpeg"], "ffmpeg");
        if value.contains(std::path::MAIN_SEPARATOR) || value.contains('/') {
            self.resolve_path(&value)
        } else {
            PathBuf::from(value)
        }
    }

    /// Gets the Icecast port from configuration
    ///
    /// Returns the configured port, or the default port (8000) if not configured or invalid.
    pub fn get_icecast_port(&self) -> u16 {
        match self.get_value(&["icecast", "port"]) {
            Ok(Value::Number(n)) => match n.as_u64().and_then(|p| u16::try_from(p).ok()) {
                Some(port) => port,
                None => {
                    warn!("Icecast port '{}' out of range, using default {}", n, DEFAULT_ICECAST_PORT);
                    DEFAULT_ICECAST_PORT
                }
            },
            Ok(Value::String(s)) => s.parse::<u16>().unwrap_or_else(|_| {
                warn!("Invalid Icecast port '{}', using default {}", s, DEFAULT_ICECAST_PORT);
                DEFAULT_ICECAST_PORT
            }),
            Ok(_) | Err(_) => DEFAULT_ICECAST_PORT,
        }
    }

    impl_string_config!(get_icecast_host, &["icecast", "host"], "localhost");
    impl_string_config!(get_icecast_user, &["icecast", "user"], "source");
    impl_string_config!(get_icecast_password, &["icecast", "password"], "");
    impl_string_config!(get_icecast_mount, &["icecast", "mount"], "/radio");
    impl_string_config!(get_icecast_name, &["icecast", "name"], "PMORadio");
    impl_string_config!(get_icecast_description, &["icecast", "description"], "");
    impl_string_config!(get_icecast_genre, &["icecast", "genre"], "");
    impl_string_config!(get_icecast_url, &["icecast", "url"], "");
    impl_bool_config!(get_icecast_public, &["icecast", "public"], false);

    impl_bool_config!(get_transcode_enabled, &["transcode", "enabled"], false);
    impl_usize_config!(
        get_transcode_bitrate,
        &["transcode", "bitrate_kbps"],
        DEFAULT_TRANSCODE_BITRATE
    );

    impl_usize_config!(get_worker_chunk_size, &["worker", "chunk_size"], DEFAULT_CHUNK_SIZE);
    impl_usize_config!(get_worker_max_retries, &["worker", "max_retries"], DEFAULT_MAX_RETRIES);
    impl_usize_config!(
        get_worker_retry_delay_ms,
        &["worker", "retry_delay_ms"],
        DEFAULT_RETRY_DELAY_MS
    );

    impl_usize_config!(
        get_station_idle_backoff_secs,
        &["station", "idle_backoff_secs"],
        DEFAULT_IDLE_BACKOFF_SECS
    );

    impl_string_config!(get_log_min_level, &["logger", "min_level"], DEFAULT_LOG_MIN_LEVEL);
    impl_bool_config!(get_log_enable_console, &["logger", "enable_console"], true);

    fn get_string_or(&self, path: &[&str], default: &str) -> String {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            _ => default.to_string(),
        }
    }
}

/// Loads the global configuration from `file` (or the default locations)
///
/// Must be called before the first [`get_config`] to take effect; later
/// calls are rejected.
pub fn init_config(file: Option<&str>) -> Result<Arc<Config>> {
    let config = Arc::new(Config::load_config(file)?);
    CONFIG
        .set(config.clone())
        .map_err(|_| anyhow!("Configuration already initialized"))?;
    Ok(config)
}

/// Returns the global configuration instance
///
/// Falls back to the default locations when [`init_config`] was never called.
///
/// # Panics
///
/// Panics if the lazily loaded configuration is invalid YAML.
pub fn get_config() -> Arc<Config> {
    CONFIG
        .get_or_init(|| {
            Arc::new(Config::load_config(None).expect("Failed to load PMORadio configuration"))
        })
        .clone()
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, keys from external are merged into default recursively
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}
