//! Application configuration.
//!
//! Settings are layered with `figment`, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config PATH`, else `config.toml` in the platform
//!    config directory if it exists)
//! 3. `TOMBRAIDER_*` environment variables, nested keys split on `__`
//!    (`TOMBRAIDER_KNOWN_SET__BACKING=exact`)
//! 4. command-line flags, applied by the caller
//!
//! ```toml
//! io_threads = 2
//! blacklist = ["Irrelevant"]
//!
//! [fingerprint]
//! mode = "exact"
//!
//! [categories.Documents]
//! extensions = ["txt", "md", "pdf"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::DeleteMode;
use crate::classify::{
    CategoryOverride, ClassifierConfig, ClassifierTables, TableError, DEFAULT_SMALL_IMAGE_THRESHOLD,
};
use crate::consolidate::{DEFAULT_CHUNK_SIZE, DEFAULT_INDEX_NAME, DEFAULT_IO_THREADS};
use crate::dedupe::{Blacklist, BlacklistError, KnownSetConfig};
use crate::scanner::hasher::{DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_SIZE};
use crate::scanner::{FingerprintMode, HasherConfig, WalkerConfig};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "TOMBRAIDER_";

/// Errors while loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly named file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed into settings.
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// A setting is out of range.
    #[error("Invalid value for '{key}': {message}")]
    Value {
        /// Setting name
        key: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// The category tables conflict.
    #[error(transparent)]
    Tables(#[from] TableError),

    /// The configured blacklist names an unknown category.
    #[error(transparent)]
    Blacklist(#[from] BlacklistError),
}

/// Fingerprint engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintSettings {
    /// Algorithm; unset means the subcommand's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<FingerprintMode>,
    /// Bytes hashed from each end in fast mode
    pub sample_size: usize,
    /// Read buffer in exact mode
    pub buffer_size: usize,
}

impl Default for FingerprintSettings {
    fn default() -> Self {
        Self {
            mode: None,
            sample_size: DEFAULT_SAMPLE_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fingerprinting workers
    pub io_threads: usize,
    /// Files fingerprinted per chunk
    pub chunk_size: usize,
    /// Fingerprint engine
    pub fingerprint: FingerprintSettings,
    /// Known-set store
    pub known_set: KnownSetConfig,
    /// Images below this many bytes become `Small_Images`
    pub small_image_threshold: u64,
    /// File recognised content with an unmapped extension as
    /// `Unsupported_Extension`
    pub separate_unsupported_extensions: bool,
    /// How discarded files are removed
    pub delete_mode: DeleteMode,
    /// Index file name inside a destination
    pub index_name: String,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Skip dot files and directories
    pub skip_hidden: bool,
    /// Category labels whose files are deleted after classification
    pub blacklist: Vec<String>,
    /// Per-category replacement extension and tag lists
    pub categories: BTreeMap<String, CategoryOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            io_threads: DEFAULT_IO_THREADS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            fingerprint: FingerprintSettings::default(),
            known_set: KnownSetConfig::default(),
            small_image_threshold: DEFAULT_SMALL_IMAGE_THRESHOLD,
            separate_unsupported_extensions: false,
            delete_mode: DeleteMode::default(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            follow_symlinks: false,
            skip_hidden: false,
            blacklist: Vec::new(),
            categories: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Default config file location, if the platform has one.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "tombraider", "tombraider")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// The layered sources, without CLI flags.
    ///
    /// `file` is merged when given; otherwise the default file is merged if
    /// it exists.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.exists()) {
                    log::debug!("Using config file {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `file` is given but missing, a layer does
    /// not parse, or a value is invalid.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
        }
        let config: Config = Self::figment(file).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_threads == 0 {
            return Err(value_error("io_threads", "must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(value_error("chunk_size", "must be at least 1"));
        }
        if self.fingerprint.sample_size == 0 {
            return Err(value_error("fingerprint.sample_size", "must be at least 1"));
        }
        if self.fingerprint.buffer_size == 0 {
            return Err(value_error("fingerprint.buffer_size", "must be at least 1"));
        }
        let rate = self.known_set.false_positive_rate;
        if !(rate > 0.0 && rate < 1.0) {
            return Err(value_error(
                "known_set.false_positive_rate",
                "must be between 0 and 1 (exclusive)",
            ));
        }
        if self.index_name.is_empty()
            || self.index_name.chars().any(std::path::is_separator)
            || self.index_name == "."
            || self.index_name == ".."
        {
            return Err(value_error("index_name", "must be a plain file name"));
        }
        self.blacklist()?;
        self.classifier_tables()?;
        Ok(())
    }

    /// The fingerprint engine settings, with `default_mode` when no mode is
    /// configured.
    #[must_use]
    pub fn hasher_config(&self, default_mode: FingerprintMode) -> HasherConfig {
        HasherConfig {
            mode: self.fingerprint.mode.unwrap_or(default_mode),
            sample_size: self.fingerprint.sample_size,
            buffer_size: self.fingerprint.buffer_size,
        }
    }

    /// Built-in tables with the configured overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if an override names an unknown category or
    /// makes two groups overlap.
    pub fn classifier_tables(&self) -> Result<ClassifierTables, TableError> {
        ClassifierTables::builtin()?.with_overrides(&self.categories)
    }

    /// Classifier switches.
    #[must_use]
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            small_image_threshold: self.small_image_threshold,
            separate_unsupported_extensions: self.separate_unsupported_extensions,
        }
    }

    /// The configured blacklist.
    ///
    /// # Errors
    ///
    /// Returns [`BlacklistError::UnknownCategory`] for an unknown label.
    pub fn blacklist(&self) -> Result<Blacklist, BlacklistError> {
        Blacklist::from_labels(&self.blacklist)
    }

    /// Walker settings.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            exclude: Vec::new(),
        }
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which does not happen for valid configs.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn value_error(key: &'static str, message: &str) -> ConfigError {
    ConfigError::Value {
        key,
        message: message.to_string(),
    }
}
