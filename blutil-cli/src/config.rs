//! Configuration file support for blutil.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (BLUTIL_*)
//! 3. Local config file (./blutil.toml)
//! 4. Global config file (~/.config/blutil/config.toml)

use anyhow::{Context, Result};
use blutil::port::DEFAULT_BAUD;
use blutil::{SessionConfig, ToolchainCompiler};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-project config file.
pub const LOCAL_CONFIG_FILE: &str = "blutil.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
    /// Pulse DTR before talking to the module.
    pub reset: Option<bool>,
}

/// Device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Model string used instead of querying the module.
    pub model: Option<String>,
    /// Check the module answers before starting an application.
    pub probe_before_run: Option<bool>,
}

/// Compiler toolchain configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Directory holding the `XComp_*.exe` compilers.
    pub dir: Option<PathBuf>,
    /// Program used to launch the compilers; empty runs them directly.
    pub runner: Option<String>,
}

/// Timing overrides, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Deadline for each command's response.
    pub command_timeout_ms: Option<u64>,
    /// How long to collect output after starting an application.
    pub run_capture_timeout_ms: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Device configuration.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Toolchain configuration.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// Timing configuration.
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Some(global_config) = Self::load_from_file(&global_path) {
                    debug!("Loaded global config from {}", global_path.display());
                    config.merge(global_config);
                }
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    ///
    /// Unlike the implicit files, an explicitly named file must exist and parse.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a specific file, warning on failure.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "blutil").map(|dirs| {
            dirs.config_dir()
                .to_path_buf()
        })
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other
            .connection
            .port
            .is_some()
        {
            self.connection.port = other.connection.port;
        }
        if other
            .connection
            .baud
            .is_some()
        {
            self.connection.baud = other.connection.baud;
        }
        if other
            .connection
            .reset
            .is_some()
        {
            self.connection.reset = other.connection.reset;
        }

        if other
            .device
            .model
            .is_some()
        {
            self.device.model = other.device.model;
        }
        if other
            .device
            .probe_before_run
            .is_some()
        {
            self.device.probe_before_run = other.device.probe_before_run;
        }

        if other
            .toolchain
            .dir
            .is_some()
        {
            self.toolchain.dir = other.toolchain.dir;
        }
        if other
            .toolchain
            .runner
            .is_some()
        {
            self.toolchain.runner = other.toolchain.runner;
        }

        if other
            .timing
            .command_timeout_ms
            .is_some()
        {
            self.timing.command_timeout_ms = other.timing.command_timeout_ms;
        }
        if other
            .timing
            .run_capture_timeout_ms
            .is_some()
        {
            self.timing.run_capture_timeout_ms = other.timing.run_capture_timeout_ms;
        }
    }

    /// Configured baud rate, or the module default.
    pub fn baud(&self) -> u32 {
        self.connection
            .baud
            .unwrap_or(DEFAULT_BAUD)
    }

    /// Whether DTR reset is enabled (default on).
    pub fn reset_enabled(&self) -> bool {
        self.connection
            .reset
            .unwrap_or(true)
    }

    /// Session tunables with `model` forced when given.
    pub fn session_config(&self, model: Option<&str>) -> SessionConfig {
        let mut session = SessionConfig::default();
        if let Some(ms) = self
            .timing
            .command_timeout_ms
        {
            session = session.with_command_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self
            .timing
            .run_capture_timeout_ms
        {
            session.run_capture_timeout = Duration::from_millis(ms);
        }
        if let Some(probe) = self
            .device
            .probe_before_run
        {
            session.probe_before_run = probe;
        }
        if let Some(model) = model {
            session = session.with_model(model);
        }
        session
    }

    /// Compiler launcher, looking in `dir` first, then the configured
    /// directory, then next to the executable.
    pub fn compiler(&self, dir: Option<&Path>) -> Result<ToolchainCompiler> {
        let compiler = match dir.or(self
            .toolchain
            .dir
            .as_deref())
        {
            Some(dir) => ToolchainCompiler::new(dir),
            None => ToolchainCompiler::beside_current_exe()?,
        };
        Ok(match &self
            .toolchain
            .runner
        {
            Some(runner) if runner.is_empty() => compiler.with_runner(None),
            Some(runner) => compiler.with_runner(Some(runner.clone())),
            None => compiler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Default values ----

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.connection.port.is_none());
        assert!(config.device.model.is_none());
        assert!(config.toolchain.dir.is_none());
        assert_eq!(config.baud(), 9600);
        assert!(config.reset_enabled());
    }

    #[test]
    fn test_default_session_config_is_untouched() {
        let session = Config::default().session_config(None);
        assert_eq!(session.command_timeout, Duration::from_millis(500));
        assert!(session.probe_before_run);
        assert!(session.model_override.is_none());
    }

    // ---- Config merge ----

    #[test]
    fn test_config_merge_overrides_set_values() {
        let mut base = Config::default();
        base.connection.baud = Some(115_200);
        base.device.model = Some("BL600_1.4".to_string());

        let mut other = Config::default();
        other.connection.port = Some("/dev/ttyUSB0".to_string());
        other.device.model = Some("BL600_1.5".to_string());
        other.connection.reset = Some(false);

        base.merge(other);

        assert_eq!(base.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(base.connection.baud, Some(115_200));
        assert_eq!(base.device.model.as_deref(), Some("BL600_1.5"));
        assert!(!base.reset_enabled());
    }

    #[test]
    fn test_config_merge_does_not_overwrite_with_none() {
        let mut base = Config::default();
        base.connection.port = Some("COM3".to_string());
        base.timing.command_timeout_ms = Some(900);
        base.toolchain.runner = Some(String::new());

        base.merge(Config::default());

        assert_eq!(base.connection.port.as_deref(), Some("COM3"));
        assert_eq!(base.timing.command_timeout_ms, Some(900));
        assert_eq!(base.toolchain.runner.as_deref(), Some(""));
    }

    // ---- TOML deserialization ----

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[connection]
port = "/dev/ttyUSB0"
baud = 115200
reset = false

[device]
model = "BL600_1.5.70.0"
probe_before_run = false

[toolchain]
dir = "/opt/uwterminal"
runner = ""

[timing]
command_timeout_ms = 750
run_capture_timeout_ms = 2000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.baud(), 115_200);
        assert!(!config.reset_enabled());
        assert_eq!(config.toolchain.dir, Some(PathBuf::from("/opt/uwterminal")));

        let session = config.session_config(config.device.model.as_deref());
        assert_eq!(session.command_timeout, Duration::from_millis(750));
        assert_eq!(session.run_capture_timeout, Duration::from_secs(2));
        assert!(!session.probe_before_run);
        assert_eq!(session.model_override.as_deref(), Some("BL600_1.5.70.0"));
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: Config = toml::from_str("[device]\nmodel = \"BL600\"\n").unwrap();
        assert!(config.connection.port.is_none());
        assert_eq!(config.device.model.as_deref(), Some("BL600"));
    }

    #[test]
    fn test_config_rejects_unknown_types() {
        assert!(toml::from_str::<Config>("[connection]\nbaud = \"fast\"\n").is_err());
    }

    // ---- Toolchain ----

    #[test]
    fn test_compiler_dir_flag_wins_over_config() {
        let mut config = Config::default();
        config.toolchain.dir = Some(PathBuf::from("/from/config"));
        config.toolchain.runner = Some(String::new());

        let id = blutil::DeviceIdentity::forced("BL600_1.5");
        let compiler = config
            .compiler(Some(Path::new("/from/flag")))
            .unwrap();
        assert_eq!(
            compiler.executable(&id),
            PathBuf::from("/from/flag/XComp_BL600_1.5.exe")
        );

        let compiler = config
            .compiler(None)
            .unwrap();
        assert_eq!(
            compiler.executable(&id),
            PathBuf::from("/from/config/XComp_BL600_1.5.exe")
        );
    }

    // ---- load_from_path with tempfile ----

    #[test]
    fn test_load_from_path_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("custom.toml");
        fs::write(&path, "[connection]\nport = \"/dev/ttyACM1\"\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyACM1"));
    }

    #[test]
    fn test_load_from_path_nonexistent_is_error() {
        assert!(Config::load_from_path(Path::new("/nonexistent/path/config.toml")).is_err());
    }

    #[test]
    fn test_load_from_file_invalid_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("blutil.toml");
        fs::write(&path, "invalid toml [[[").unwrap();
        assert!(Config::load_from_file(&path).is_none());
        assert!(Config::load_from_path(&path).is_err());
    }

    // ---- global_config_path ----

    #[test]
    fn test_global_config_path_is_some() {
        if let Some(p) = Config::global_config_path() {
            let p = p.to_string_lossy();
            assert!(p.contains("blutil"));
            assert!(p.ends_with("config.toml"));
        }
    }
}
