//! # blutil
//!
//! A library for driving BL600 smartBASIC modules over a serial link.
//!
//! This crate provides the core functionality for talking to a module with
//! its AT command set, including:
//!
//! - AT command framing and response classification
//! - Device identification (model and firmware revision)
//! - Compiling applications with the matching vendor cross-compiler
//! - Chunked hex upload of compiled `.uwc` images
//! - Running applications and capturing their first output
//! - File system listing, deletion and formatting
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//!
//! ## Example
//!
//! ```rust,no_run
//! use blutil::{RunOutcome, Session, SessionConfig, Transport};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Transport::open("/dev/ttyUSB0", 9600)?;
//!     let mut session = Session::new(transport, SessionConfig::default());
//!
//!     // Upload a prebuilt image and start it
//!     session.reset()?;
//!     session.upload(Path::new("blinky.uwc"))?;
//!     match session.run(Path::new("blinky.uwc"))? {
//!         RunOutcome::StillRunning => println!("running"),
//!         other => println!("{other:?}"),
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod device;
pub mod error;
pub mod port;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    compiler::{CompileStatus, Compiler, ToolchainCompiler, compile_source, compiled_path},
    device::{DeviceFileName, DeviceIdentity, RunOutcome, Session, SessionConfig},
    error::{Error, Result},
    port::{Port, SerialConfig},
    protocol::{Command, CommandEngine, Reply, classify},
    transport::Transport,
};
