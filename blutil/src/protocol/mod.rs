//! AT command protocol implementation.

pub mod command;
pub mod engine;

// Re-export common types
pub use command::{Command, PARAM_MODEL, PARAM_REVISION, WRITE_CHUNK_SIZE, hex_lower};
pub use engine::{
    CommandEngine, DEFAULT_COMMAND_TIMEOUT, ERROR_MARKER, Reply, TERMINATOR, classify,
};
