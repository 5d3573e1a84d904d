//! Stateful operations on one attached module.
//!
//! A [`Session`] owns the serial link for its whole lifetime. When several
//! operations are requested together they are meant to run in this order:
//!
//! ```text
//! reset -> identify -> compile -> upload -> run
//! ```
//!
//! File system operations (`list`, `delete`, `format`) stand on their own.
//!
//! ## Example
//!
//! ```rust,no_run
//! use blutil::{Session, SessionConfig, ToolchainCompiler, Transport};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Transport::open("/dev/ttyUSB0", 9600)?;
//!     let mut session = Session::new(transport, SessionConfig::default());
//!
//!     session.reset()?;
//!     session.identify()?;
//!
//!     let mut compiler = ToolchainCompiler::beside_current_exe()?;
//!     session.compile(Path::new("blinky.sb"), &mut compiler)?;
//!     session.upload(Path::new("blinky.sb"))?;
//!     println!("{:?}", session.run(Path::new("blinky.sb"))?);
//!
//!     Ok(())
//! }
//! ```

use crate::compiler::{self, Compiler};
use crate::device::{DeviceFileName, DeviceIdentity};
use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::{
    Command, CommandEngine, DEFAULT_COMMAND_TIMEOUT, ERROR_MARKER, PARAM_MODEL, PARAM_REVISION,
    TERMINATOR, WRITE_CHUNK_SIZE,
};
use crate::transport::{self, Transport};
use log::{debug, info, warn};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Delay between `&F 1` and the follow-up probe.
pub const FORMAT_SETTLE: Duration = Duration::from_millis(200);

/// Most bytes captured from a freshly started application.
pub const RUN_CAPTURE_LIMIT: usize = 1024;

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for each command's response.
    pub command_timeout: Duration,
    /// How long to collect output after `+RUN`.
    pub run_capture_timeout: Duration,
    /// Most bytes collected after `+RUN`.
    pub run_capture_limit: usize,
    /// Source bytes per `+FWRH` command.
    pub chunk_size: usize,
    /// Wait after a factory reset before probing again.
    pub format_settle: Duration,
    /// Check the module answers before `+RUN`.
    pub probe_before_run: bool,
    /// Use this model instead of asking the module.
    pub model_override: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            run_capture_timeout: transport::DEFAULT_TIMEOUT,
            run_capture_limit: RUN_CAPTURE_LIMIT,
            chunk_size: WRITE_CHUNK_SIZE,
            format_settle: FORMAT_SETTLE,
            probe_before_run: true,
            model_override: None,
        }
    }
}

impl SessionConfig {
    /// Force the device model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    /// Set the per-command response deadline.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// What was observed right after starting an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The application finished; `output` is everything before the terminator.
    Completed {
        /// Text printed by the application.
        output: String,
    },
    /// The module refused to run the application.
    Failed {
        /// Message following the error marker.
        message: String,
    },
    /// Output arrived but the application has not finished.
    Output {
        /// Text captured so far.
        raw: String,
    },
    /// Nothing arrived; the application is most likely still running.
    StillRunning,
}

impl RunOutcome {
    /// Classify bytes captured after `+RUN`.
    pub fn from_capture(captured: &[u8]) -> Self {
        if let Some(output) = captured.strip_suffix(TERMINATOR) {
            return RunOutcome::Completed {
                output: String::from_utf8_lossy(output).into_owned(),
            };
        }
        // Same rule as response classification: a bare marker carries no error
        if let Some(message) = captured
            .strip_prefix(ERROR_MARKER)
            .filter(|message| !message.is_empty())
        {
            return RunOutcome::Failed {
                message: String::from_utf8_lossy(message)
                    .trim_end()
                    .to_string(),
            };
        }
        if captured.is_empty() {
            RunOutcome::StillRunning
        } else {
            RunOutcome::Output {
                raw: String::from_utf8_lossy(captured).into_owned(),
            }
        }
    }
}

/// One module attached over one serial link.
pub struct Session<P: Port> {
    engine: CommandEngine<P>,
    config: SessionConfig,
    identity: Option<DeviceIdentity>,
}

impl<P: Port> Session<P> {
    /// Start a session over `transport`.
    ///
    /// A model override in `config` becomes the active identity right away.
    pub fn new(transport: Transport<P>, config: SessionConfig) -> Self {
        let identity = config
            .model_override
            .as_deref()
            .map(DeviceIdentity::forced);
        let engine = CommandEngine::new(transport).with_timeout(config.command_timeout);
        Self {
            engine,
            config,
            identity,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Active identity, if detected or forced.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity
            .as_ref()
    }

    /// Replace the active identity.
    pub fn set_identity(&mut self, identity: DeviceIdentity) {
        self.identity = Some(identity);
    }

    /// Get a mutable reference to the command engine.
    pub fn engine_mut(&mut self) -> &mut CommandEngine<P> {
        &mut self.engine
    }

    /// End the session and hand back the port.
    pub fn close(self) -> P {
        self.engine
            .into_transport()
            .into_port()
    }

    /// End the session and close the port.
    pub fn disconnect(self) -> Result<()> {
        let mut port = self.close();
        port.close()
    }

    /// Hardware-reset the module with a DTR pulse.
    pub fn reset(&mut self) -> Result<()> {
        info!("Resetting board via DTR...");
        self.engine
            .transport_mut()
            .assert_reset()
    }

    /// Check the module answers an empty command.
    pub fn probe(&mut self) -> Result<()> {
        self.engine
            .send(&Command::probe())
            .map(drop)
    }

    /// Query model and revision and make them the active identity.
    pub fn identify(&mut self) -> Result<&DeviceIdentity> {
        let model = self
            .engine
            .read_param(PARAM_MODEL)?;
        let revision = self
            .engine
            .read_param(PARAM_REVISION)?;
        info!("Detected model {model} {revision}");
        Ok(&*self
            .identity
            .insert(DeviceIdentity::detected(&model, &revision)))
    }

    /// Active identity, querying the module only if none is set yet.
    pub fn ensure_identity(&mut self) -> Result<&DeviceIdentity> {
        if self
            .identity
            .is_none()
        {
            self.identify()?;
        }
        self.identity
            .as_ref()
            .ok_or(Error::NoIdentity)
    }

    /// Compile `source` with the compiler matching the active identity.
    pub fn compile(&mut self, source: &Path, compiler: &mut dyn Compiler) -> Result<()> {
        let identity = self
            .identity
            .as_ref()
            .ok_or(Error::NoIdentity)?;
        compiler::compile_source(compiler, source, identity)
    }

    /// Write the compiled image of `path` to the module.
    pub fn upload(&mut self, path: &Path) -> Result<()> {
        self.upload_with_progress(path, |_, _| {})
    }

    /// Write the compiled image of `path`, reporting `(sent, total)` bytes.
    ///
    /// Chunks are written one at a time and each must be acknowledged
    /// before the next is sent. A failure leaves a partial file behind.
    pub fn upload_with_progress<F>(&mut self, path: &Path, mut progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        let image = compiler::compiled_path(path);
        let name = DeviceFileName::from_path(&image)?;
        let data = std::fs::read(&image)?;
        info!("Uploading {} as {name}", image.display());

        // Missing files are fine here, whatever the module says
        if let Err(e) = self
            .engine
            .send(&Command::delete(name.as_str(), true))
        {
            warn!("Ignoring failed delete of {name}: {e}");
        }

        self.engine
            .send(&Command::file_open_write(name.as_str()))
            .map_err(|e| Error::upload(name.as_str(), e))?;

        let total = data.len();
        let mut sent = 0;
        for chunk in data.chunks(
            self.config
                .chunk_size
                .max(1),
        ) {
            self.engine
                .send(&Command::file_write_hex(chunk))
                .map_err(|e| Error::upload(name.as_str(), e))?;
            sent += chunk.len();
            progress(sent, total);
        }

        self.engine
            .send(&Command::file_close())
            .map_err(|e| Error::upload(name.as_str(), e))?;

        info!("Upload success");
        Ok(())
    }

    /// Start the application stored for `path` and collect its first output.
    pub fn run(&mut self, path: &Path) -> Result<RunOutcome> {
        let name = DeviceFileName::from_path(path)?;
        if self
            .config
            .probe_before_run
        {
            self.probe()?;
        }

        info!("Running {name}...");
        self.engine
            .send_no_wait(&Command::run(name.as_str()))?;
        let captured = self
            .engine
            .transport_mut()
            .read_up_to(
                self.config
                    .run_capture_limit,
                self.config
                    .run_capture_timeout,
            )?;
        debug!("Captured {} bytes after run", captured.len());

        Ok(RunOutcome::from_capture(&captured))
    }

    /// Directory listing as returned by the module.
    pub fn list(&mut self) -> Result<String> {
        self.engine
            .send(&Command::dir())
    }

    /// Remove the file stored for `path`.
    pub fn delete(&mut self, path: &Path) -> Result<()> {
        let name = DeviceFileName::from_path(path)?;
        info!("Deleting {name}");
        self.engine
            .send(&Command::delete(name.as_str(), false))
            .map(drop)
    }

    /// Erase the module file system and check it comes back.
    pub fn format(&mut self) -> Result<()> {
        self.probe()?;

        info!("Formatting file system...");
        self.engine
            .send_no_wait(&Command::factory_reset())?;
        thread::sleep(
            self.config
                .format_settle,
        );
        self.engine
            .transport_mut()
            .discard_input()?;

        self.probe()?;
        info!("Format complete");
        Ok(())
    }
}
