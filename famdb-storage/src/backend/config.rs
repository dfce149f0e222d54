/// RocksDB tuning for partition stores
use famdb_core::StorageConfig;
use rocksdb::{BlockBasedOptions, Cache, DBCompressionType, Options};

use super::rocksdb_backend::cf_names;

/// RocksDB options derived from `[storage]` configuration
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Write buffer size in MB (default: 64)
    pub write_buffer_size_mb: usize,

    /// Block cache size in MB (default: 256)
    pub block_cache_size_mb: usize,

    /// Bloom filter bits per key, 0 disables (default: 10)
    pub bloom_filter_bits: f64,

    /// Compression algorithm (default: "zstd")
    pub compression: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for StoreOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            write_buffer_size_mb: config.write_buffer_size_mb,
            block_cache_size_mb: config.block_cache_size_mb,
            bloom_filter_bits: config.bloom_filter_bits,
            compression: config.compression.clone(),
        }
    }
}

impl StoreOptions {
    /// Small buffers for tests and tiny databases
    pub fn development() -> Self {
        Self {
            write_buffer_size_mb: 4,
            block_cache_size_mb: 8,
            bloom_filter_bits: 10.0,
            compression: "none".to_string(),
        }
    }

    pub(crate) fn compression_type(&self) -> DBCompressionType {
        match self.compression.as_str() {
            "zstd" => DBCompressionType::Zstd,
            "none" => DBCompressionType::None,
            // Only zstd is compiled in; anything else falls back to it
            _ => DBCompressionType::Zstd,
        }
    }

    /// Database-wide options
    pub(crate) fn db_options(&self, create: bool) -> Options {
        let mut opts = Options::default();

        opts.create_if_missing(create);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(512);
        opts.set_write_buffer_size(self.write_buffer_size_mb * 1024 * 1024);
        opts.set_compression_type(self.compression_type());

        opts
    }

    /// Per column family options sharing one block cache
    pub(crate) fn cf_options(&self, cf_name: &str, cache: &Cache) -> Options {
        let mut opts = Options::default();
        opts.set_write_buffer_size(self.write_buffer_size_mb * 1024 * 1024);
        opts.set_compression_type(self.compression_type());

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(cache);
        if self.bloom_filter_bits > 0.0 {
            block_opts.set_bloom_filter(self.bloom_filter_bits, false);
        }
        opts.set_block_based_table_factory(&block_opts);

        // Attributes are only ever read by exact key
        if cf_name == cf_names::ATTRIBUTES {
            opts.optimize_for_point_lookup(self.block_cache_size_mb.max(1) as u64);
        }

        opts
    }

    pub(crate) fn block_cache(&self) -> Cache {
        Cache::new_lru_cache(self.block_cache_size_mb.max(1) * 1024 * 1024)
    }
}
