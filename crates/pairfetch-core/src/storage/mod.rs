//! Destination file lifecycle.
//!
//! Creates (truncating) the file a job writes into, buffers sequential body
//! writes, syncs before completion, and applies the partial-file policy:
//! either atomic finalize (rename from `.part` to the final name) or cleanup
//! of whatever a failed job left behind.

mod file;

pub use file::DownloadFile;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// What a failed job leaves at its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartialPolicy {
    /// Write to `<dest>.part`, rename on success, delete the temp file on failure.
    #[default]
    TempRename,
    /// Write to the destination directly and delete it on failure.
    Delete,
    /// Write to the destination directly and leave it as-is on failure.
    Keep,
}

impl PartialPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            PartialPolicy::TempRename => "temp-rename",
            PartialPolicy::Delete => "delete",
            PartialPolicy::Keep => "keep",
        }
    }
}

impl fmt::Display for PartialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temp-rename" => Ok(PartialPolicy::TempRename),
            "delete" => Ok(PartialPolicy::Delete),
            "keep" => Ok(PartialPolicy::Keep),
            other => Err(format!(
                "unknown partial-file policy '{}' (expected temp-rename, delete or keep)",
                other
            )),
        }
    }
}
