pub mod logging;
pub mod version;

// Re-export commonly used functions
pub use logging::init_logging;
pub use version::{check_format_version, generator_string, FILE_VERSION, GENERATOR_VERSION};
