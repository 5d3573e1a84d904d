//! Error types for blutil.

use std::io;
use thiserror::Error;

/// Result type for blutil operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for blutil operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The serial port could not be opened.
    #[error("Cannot open serial port {port}: {reason}")]
    Connection {
        /// Port name as given by the caller.
        port: String,
        /// Underlying failure description.
        reason: String,
    },

    /// A command was sent but nothing came back before the deadline.
    #[error("Got no response to command '{command}'")]
    NoResponse {
        /// Command text, without the `AT` framing.
        command: String,
    },

    /// The device answered with its error marker.
    #[error("Device reported an error for command '{command}': {message}")]
    Device {
        /// Command text, without the `AT` framing.
        command: String,
        /// Message following the error marker.
        message: String,
    },

    /// Bytes arrived but matched neither the terminator nor the error marker.
    #[error("Got unexpected response to command '{command}': {}", String::from_utf8_lossy(.raw).escape_debug())]
    UnexpectedResponse {
        /// Command text, without the `AT` framing.
        command: String,
        /// Everything that was accumulated.
        raw: Vec<u8>,
    },

    /// The external compiler is missing or exited unsuccessfully.
    #[error("Compilation failed: {0}")]
    Compile(String),

    /// A step of the file write sequence failed.
    ///
    /// The device file is left in whatever state the failed step produced.
    #[error("Upload of '{file}' failed")]
    Upload {
        /// Device file name being written.
        file: String,
        /// The protocol failure that aborted the upload.
        #[source]
        source: Box<Error>,
    },

    /// An operation needed the device identity but none was detected or forced.
    #[error("Device model unknown: run identification or specify a model")]
    NoIdentity,

    /// A host path could not be mapped to a device file name.
    #[error("Cannot derive a device file name from '{0}'")]
    InvalidFileName(String),

    /// Command text contains bytes outside the ASCII range.
    #[error("Command is not ASCII: {0}")]
    NonAscii(String),
}

impl Error {
    /// Wrap a protocol failure that happened while writing `file`.
    pub(crate) fn upload(file: &str, source: Error) -> Self {
        Error::Upload {
            file: file.to_string(),
            source: Box::new(source),
        }
    }

    /// The innermost protocol error, looking through [`Error::Upload`].
    pub fn root(&self) -> &Error {
        match self {
            Error::Upload { source, .. } => source.root(),
            other => other,
        }
    }
}
