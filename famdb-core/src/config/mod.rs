//! Configuration types for FamDB

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::FamDbError;

/// Environment variable that overrides `database.db_dir`
pub const DB_DIR_ENV: &str = "FAMDB_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the partition files of one generation
    #[serde(default)]
    pub db_dir: Option<String>,
    /// Extension of partition files (`<prefix>.<n>.<ext>`)
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// Retry text searches phonetically when nothing matched
    #[serde(default = "default_phonetic_fallback")]
    pub phonetic_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_write_buffer_size_mb")]
    pub write_buffer_size_mb: usize,
    #[serde(default = "default_block_cache_size_mb")]
    pub block_cache_size_mb: usize,
    /// Bloom filter bits per key, 0 disables the filter
    #[serde(default = "default_bloom_filter_bits")]
    pub bloom_filter_bits: f64,
    #[serde(default = "default_compression")]
    pub compression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_file_extension() -> String { "famdb".to_string() }
fn default_phonetic_fallback() -> bool { true }
fn default_write_buffer_size_mb() -> usize { 64 }
fn default_block_cache_size_mb() -> usize { 256 }
fn default_bloom_filter_bits() -> f64 { 10.0 }
fn default_compression() -> String { "zstd".to_string() }
fn default_level() -> String { "warn".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            file_extension: default_file_extension(),
            phonetic_fallback: default_phonetic_fallback(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: default_write_buffer_size_mb(),
            block_cache_size_mb: default_block_cache_size_mb(),
            bloom_filter_bits: default_bloom_filter_bits(),
            compression: default_compression(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_log_format(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the database directory, `FAMDB_DIR` taking precedence
    pub fn resolve_db_dir(&self) -> Option<PathBuf> {
        std::env::var(DB_DIR_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.db_dir.clone())
            .map(PathBuf::from)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, FamDbError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| FamDbError::Configuration(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), FamDbError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| FamDbError::Configuration(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.database.db_dir, None);
        assert_eq!(config.database.file_extension, "famdb");
        assert!(config.database.phonetic_fallback);

        assert_eq!(config.storage.write_buffer_size_mb, 64);
        assert_eq!(config.storage.block_cache_size_mb, 256);
        assert_eq!(config.storage.bloom_filter_bits, 10.0);
        assert_eq!(config.storage.compression, "zstd");

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_config() {
        let toml_content = r#"
[database]
db_dir = "/data/famdb"

[storage]
compression = "lz4"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path()).unwrap();

        assert_eq!(config.database.db_dir, Some("/data/famdb".to_string()));
        assert_eq!(config.storage.compression, "lz4");

        // Unspecified values fall back to defaults
        assert_eq!(config.database.file_extension, "famdb");
        assert_eq!(config.storage.block_cache_size_mb, 256);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_invalid_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "this is not valid TOML {{").unwrap();

        match load_config(temp_file.path()).unwrap_err() {
            FamDbError::Configuration(msg) => assert!(msg.contains("Failed to parse config")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        match load_config("/nonexistent/path/to/famdb.toml").unwrap_err() {
            FamDbError::Io(_) => {}
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.database.phonetic_fallback = false;
        config.storage.bloom_filter_bits = 0.0;
        config.logging.format = "json".to_string();

        let temp_file = NamedTempFile::new().unwrap();
        save_config(temp_file.path(), &config).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!(!loaded.database.phonetic_fallback);
        assert_eq!(loaded.storage.bloom_filter_bits, 0.0);
        assert_eq!(loaded.logging.format, "json");
    }
}
