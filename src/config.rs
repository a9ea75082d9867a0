//! Configuration for the sheetpack tools
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (sheetpack.toml)
//! - Environment variables (SHEETPACK__*)
//!
//! ## Example config file (sheetpack.toml):
//! ```toml
//! [imports]
//! search_paths = ["../shared/schemas"]
//! extensions = ["yaml", "yml"]
//!
//! [records]
//! filter_column = "ExportFilter"
//! header_case = "pascal"
//! list_separator = ";"
//!
//! [encoding]
//! legacy_wide_values = true
//!
//! [output]
//! report = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackConfig {
    /// Import resolution
    #[serde(default)]
    pub imports: ImportConfig,

    /// Record source interpretation
    #[serde(default)]
    pub records: RecordConfig,

    /// Byte encoding
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// CLI output
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where imported schemas are looked up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Searched after the importing schema's own directory
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

/// How worksheet names and headers relate to schema names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeaderCase {
    /// `bullet_types` is looked up as `BulletTypes`
    #[default]
    Pascal,
    Exact,
}

/// Record source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Header whose truthiness selects exported rows
    #[serde(default = "default_filter_column")]
    pub filter_column: String,

    #[serde(default)]
    pub header_case: HeaderCase,

    /// Separator for array cells in CSV sources
    #[serde(default = "default_list_separator")]
    pub list_separator: String,
}

/// Encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Write only the low 32 bits of 64-bit values
    #[serde(default = "default_true")]
    pub legacy_wide_values: bool,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Print the segment table after compiling
    #[serde(default)]
    pub report: bool,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["yaml".to_string(), "yml".to_string()]
}

fn default_filter_column() -> String {
    "ExportFilter".to_string()
}

fn default_list_separator() -> String {
    ";".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            extensions: default_extensions(),
        }
    }
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            filter_column: default_filter_column(),
            header_case: HeaderCase::Pascal,
            list_separator: default_list_separator(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            legacy_wide_values: true,
        }
    }
}

impl PackConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["sheetpack.toml", ".sheetpack.toml", "config/sheetpack.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "sheetpack") {
            let xdg_config = config_dir.config_dir().join("sheetpack.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SHEETPACK__RECORDS__FILTER_COLUMN=Ship
        builder = builder.add_source(
            Environment::with_prefix("SHEETPACK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
