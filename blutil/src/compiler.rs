//! External smartBASIC compiler.
//!
//! Compilation is delegated to the vendor cross-compiler matching the
//! module's firmware, `XComp_<key>.exe`. The [`Compiler`] trait keeps the
//! session independent of how that executable is launched.

use crate::device::DeviceIdentity;
use crate::error::{Error, Result};
use log::{debug, info};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Extension of compiled application images.
pub const COMPILED_EXTENSION: &str = "uwc";

/// Runner used for the Windows-only compilers on other hosts.
#[cfg(windows)]
pub const DEFAULT_RUNNER: Option<&str> = None;

/// Runner used for the Windows-only compilers on other hosts.
#[cfg(not(windows))]
pub const DEFAULT_RUNNER: Option<&str> = Some("wine");

/// Exit status reported by a compiler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileStatus {
    code: Option<i32>,
}

impl CompileStatus {
    /// Status with the given exit code; `None` means killed by a signal.
    pub fn from_code(code: Option<i32>) -> Self {
        Self { code }
    }

    /// Whether the compiler exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<ExitStatus> for CompileStatus {
    fn from(status: ExitStatus) -> Self {
        Self::from_code(status.code())
    }
}

/// Something that can turn a source file into a `.uwc` image.
pub trait Compiler {
    /// Compile `source` for `identity`.
    ///
    /// A missing tool is an error; an unsuccessful run is reported through
    /// the returned status.
    fn compile(&mut self, source: &Path, identity: &DeviceIdentity) -> Result<CompileStatus>;
}

/// Runs `XComp_<key>.exe` from a toolchain directory as a subprocess.
#[derive(Debug, Clone)]
pub struct ToolchainCompiler {
    dir: PathBuf,
    runner: Option<String>,
}

impl ToolchainCompiler {
    /// Compilers are looked up in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            runner: DEFAULT_RUNNER.map(str::to_string),
        }
    }

    /// Look compilers up next to the running executable.
    pub fn beside_current_exe() -> Result<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok(Self::new(dir))
    }

    /// Launch compilers through `runner` (e.g. `wine`), or directly with `None`.
    #[must_use]
    pub fn with_runner(mut self, runner: Option<String>) -> Self {
        self.runner = runner;
        self
    }

    /// Full path of the compiler for `identity`.
    pub fn executable(&self, identity: &DeviceIdentity) -> PathBuf {
        self.dir
            .join(identity.compiler_name())
    }
}

impl Compiler for ToolchainCompiler {
    fn compile(&mut self, source: &Path, identity: &DeviceIdentity) -> Result<CompileStatus> {
        let exe = self.executable(identity);
        if !exe.is_file() {
            return Err(Error::Compile(format!(
                "compiler {} not found",
                exe.display()
            )));
        }

        let mut cmd = match &self.runner {
            Some(runner) => {
                let mut cmd = Command::new(runner);
                cmd.arg(&exe);
                cmd
            },
            None => Command::new(&exe),
        };
        cmd.arg(source);
        debug!("Spawning {cmd:?}");

        let status = cmd
            .status()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::Compile(format!(
                    "cannot launch {}: {e}",
                    self.runner
                        .as_deref()
                        .unwrap_or("compiler")
                )),
                _ => Error::Io(e),
            })?;
        Ok(status.into())
    }
}

/// Path of the compiled image for `path`.
///
/// Paths that already carry the compiled extension are returned unchanged.
pub fn compiled_path(path: &Path) -> PathBuf {
    if path
        .extension()
        .is_some_and(|ext| ext == COMPILED_EXTENSION)
    {
        path.to_path_buf()
    } else {
        path.with_extension(COMPILED_EXTENSION)
    }
}

/// Compile `source` and fail unless the compiler reports success.
pub fn compile_source(
    compiler: &mut dyn Compiler,
    source: &Path,
    identity: &DeviceIdentity,
) -> Result<()> {
    info!(
        "Compiling {} with {}...",
        source.display(),
        identity.compiler_name()
    );
    let status = compiler.compile(source, identity)?;
    if !status.success() {
        return Err(Error::Compile(match status.code() {
            Some(code) => format!("{} exited with code {code}", identity.compiler_name()),
            None => format!("{} was terminated", identity.compiler_name()),
        }));
    }
    info!("Compilation success");
    Ok(())
}
