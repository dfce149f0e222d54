//! Test environment management
//!
//! Each environment owns a temporary directory that is removed on drop.

use anyhow::{Context, Result};
use famdb::{Config, Database, DbInfo, OpenMode};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::fixtures::{sample_families, sample_file_map, sample_taxonomy, PREFIX};

/// Isolated directory holding one sample generation
pub struct TestEnvironment {
    temp_dir: TempDir,
    config: Config,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("famdb-test")
            .context("Failed to create temporary directory")?;

        let mut config = Config::default();
        config.storage.write_buffer_size_mb = 4;
        config.storage.block_cache_size_mb = 8;
        config.storage.compression = "none".to_string();

        Ok(Self { temp_dir, config })
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory the generation is written to
    pub fn db_dir(&self) -> PathBuf {
        self.root().join("db")
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of one partition of the sample generation
    pub fn partition_path(&self, number: u32) -> PathBuf {
        self.db_dir().join(format!(
            "{}.{}.{}",
            PREFIX, number, self.config.database.file_extension
        ))
    }

    pub fn db_info() -> DbInfo {
        DbInfo {
            name: "Sample FamDB".to_string(),
            version: "3.8".to_string(),
            date: "2024-01-01".to_string(),
            description: "Families for tests".to_string(),
            copyright: "none".to_string(),
        }
    }

    /// Create the sample generation with taxonomy and db info, no families
    pub fn create_database(&self) -> Result<Database> {
        let mut db = Database::create(self.db_dir(), PREFIX, sample_file_map(), &self.config)?;
        db.write_taxonomy(&sample_taxonomy())?;
        db.set_db_info(&Self::db_info())?;
        Ok(db)
    }

    /// Create, fill and finalize the sample generation, then close it
    pub fn build_generation(&self) -> Result<()> {
        let mut db = self.create_database()?;
        let report = db.append_families(sample_families())?;
        anyhow::ensure!(
            report.duplicates.is_empty() && report.unplaced.is_empty(),
            "Sample families did not load cleanly: {:?}",
            report
        );
        db.finalize()?;
        Ok(())
    }

    pub fn open(&self, mode: OpenMode) -> Result<Database> {
        Ok(Database::open_with_config(self.db_dir(), mode, &self.config)?)
    }

    /// Delete one partition directory to simulate a partial install
    pub fn remove_partition(&self, number: u32) -> Result<()> {
        let path = self.partition_path(number);
        std::fs::remove_dir_all(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))
    }
}
