//! AT command text and wire framing.
//!
//! ## Frame Format
//!
//! ```text
//! +------+-------+------------------+----+
//! | "AT" | " "?  |   command text   | CR |
//! +------+-------+------------------+----+
//! ```
//!
//! The separating space is omitted for extended commands, whose text starts
//! with `+`.

use crate::error::{Error, Result};
use std::fmt::{self, Write as _};

/// Number of source bytes carried by one `+FWRH` command.
pub const WRITE_CHUNK_SIZE: usize = 16;

/// Info parameter holding the module model.
pub const PARAM_MODEL: u8 = 0;

/// Info parameter holding the firmware revision.
pub const PARAM_REVISION: u8 = 13;

/// A single AT command, without the `AT` prefix or line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
}

impl Command {
    /// Wrap arbitrary command text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Empty command, answered with a bare terminator by a live module.
    pub fn probe() -> Self {
        Self::new("")
    }

    /// `I <index>`: read an info parameter.
    pub fn info(index: u8) -> Self {
        Self::new(format!("I {index}"))
    }

    /// `+DIR`: list the file system.
    pub fn dir() -> Self {
        Self::new("+DIR")
    }

    /// `+DEL "<name>"`.
    ///
    /// With `tolerant` set a trailing ` +` is appended, which the module
    /// accepts for files that do not exist.
    pub fn delete(name: &str, tolerant: bool) -> Self {
        if tolerant {
            Self::new(format!("+DEL \"{name}\" +"))
        } else {
            Self::new(format!("+DEL \"{name}\""))
        }
    }

    /// `+FOW "<name>"`: open a file for writing.
    pub fn file_open_write(name: &str) -> Self {
        Self::new(format!("+FOW \"{name}\""))
    }

    /// `+FWRH "<hex>"`: append bytes to the open file.
    pub fn file_write_hex(chunk: &[u8]) -> Self {
        Self::new(format!("+FWRH \"{}\"", hex_lower(chunk)))
    }

    /// `+FCL`: close the open file.
    pub fn file_close() -> Self {
        Self::new("+FCL")
    }

    /// `+RUN "<name>"`: start an application.
    pub fn run(name: &str) -> Self {
        Self::new(format!("+RUN \"{name}\""))
    }

    /// `&F 1`: erase the user file system.
    pub fn factory_reset() -> Self {
        Self::new("&F 1")
    }

    /// Command text as it appears after `AT`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether this is an extended (`+`) command.
    pub fn is_extended(&self) -> bool {
        self.text
            .starts_with('+')
    }

    /// Build the bytes written to the wire.
    pub fn frame(&self) -> Result<Vec<u8>> {
        if !self
            .text
            .is_ascii()
        {
            return Err(Error::NonAscii(
                self.text
                    .clone(),
            ));
        }

        let sep = if self.is_extended() { "" } else { " " };
        Ok(format!("AT{sep}{}\r", self.text).into_bytes())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Render bytes as concatenated two-digit lowercase hex.
pub fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
