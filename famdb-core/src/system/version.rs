//! File format versioning for FamDB partitions

use crate::FamDbError;

/// The current version of the partition file format
pub const FILE_VERSION: &str = "1.0";

/// The version of the generator writing partition files
pub const GENERATOR_VERSION: &str = crate::VERSION;

/// Value stored in the `generator` attribute of every partition
pub fn generator_string() -> String {
    format!("famdb v{}", GENERATOR_VERSION)
}

/// Format guard: a partition is readable only if it carries exactly [`FILE_VERSION`]
pub fn check_format_version(found: Option<&str>) -> Result<(), FamDbError> {
    match found {
        Some(v) if v == FILE_VERSION => Ok(()),
        other => Err(FamDbError::FormatVersion {
            found: other.map(str::to_string),
            expected: FILE_VERSION.to_string(),
        }),
    }
}
