//! Host path to device file name mapping.

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;

/// Longest file name accepted by the module file system.
pub const MAX_DEVICE_NAME_LEN: usize = 24;

/// Characters the module file system rejects.
pub const ILLEGAL_CHARS: &[char] = &[':', '*', '?', '"', '<', '>', '|'];

/// Name of a file on the module file system.
///
/// Derived from the base name of a host path without its extension, with
/// [`ILLEGAL_CHARS`] removed and cut to [`MAX_DEVICE_NAME_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceFileName(String);

impl DeviceFileName {
    /// Derive the device name for `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .ok_or_else(|| Error::InvalidFileName(path.display().to_string()))?;

        let name: String = stem
            .chars()
            .filter(|c| !ILLEGAL_CHARS.contains(c))
            .take(MAX_DEVICE_NAME_LEN)
            .collect();

        if name.is_empty() {
            return Err(Error::InvalidFileName(path.display().to_string()));
        }
        Ok(Self(name))
    }

    /// The name as sent inside quoted command arguments.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
