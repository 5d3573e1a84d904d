//! Device-level state: identity, file names and the session driving them.

pub mod filename;
pub mod session;

pub use filename::{DeviceFileName, ILLEGAL_CHARS, MAX_DEVICE_NAME_LEN};
pub use session::{RunOutcome, Session, SessionConfig};

use std::fmt;

/// Model and firmware revision of the attached module.
///
/// The [`key`](DeviceIdentity::key) selects the matching compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    model: String,
    revision: Option<String>,
    key: String,
}

impl DeviceIdentity {
    /// Identity read back from the module.
    pub fn detected(model: &str, revision: &str) -> Self {
        Self {
            model: model.to_string(),
            revision: Some(revision.to_string()),
            key: format!("{model}_{}", revision.replace(' ', "_")),
        }
    }

    /// Identity given by the user instead of querying the module.
    ///
    /// `spec` is the full model string, e.g. `BL600_1.5.70.0`.
    pub fn forced(spec: &str) -> Self {
        Self {
            model: spec.to_string(),
            revision: None,
            key: spec.replace(' ', "_"),
        }
    }

    /// Model as reported (or forced).
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Firmware revision, when detected.
    pub fn revision(&self) -> Option<&str> {
        self.revision
            .as_deref()
    }

    /// Toolchain-selection key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// File name of the compiler executable for this identity.
    pub fn compiler_name(&self) -> String {
        format!("XComp_{}.exe", self.key)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(rev) => write!(f, "{} {}", self.model, rev),
            None => f.write_str(&self.model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_key_normalizes_revision_spaces() {
        let id = DeviceIdentity::detected("BL600", "1.5.70.0 AB C");
        assert_eq!(id.key(), "BL600_1.5.70.0_AB_C");
        assert_eq!(id.compiler_name(), "XComp_BL600_1.5.70.0_AB_C.exe");
        assert_eq!(id.to_string(), "BL600 1.5.70.0 AB C");
    }

    #[test]
    fn test_forced_key_normalizes_all_spaces() {
        let id = DeviceIdentity::forced("BL600 1.5.70.0");
        assert_eq!(id.key(), "BL600_1.5.70.0");
        assert_eq!(id.revision(), None);
        assert_eq!(id.model(), "BL600 1.5.70.0");
    }
}
