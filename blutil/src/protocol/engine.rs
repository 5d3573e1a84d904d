//! Command/response engine.
//!
//! A response is accumulated one byte at a time until it ends with
//! [`TERMINATOR`] or the command deadline passes, then classified with
//! [`classify`].
//!
//! The terminator is a plain suffix match with no escaping. A payload whose
//! tail happens to read `00\r` is taken as a complete, successful response.
//! Module firmware frames its replies this way, so the rule is kept as is.

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::command::Command;
use crate::transport::Transport;
use log::{debug, trace};
use std::time::{Duration, Instant};

/// Suffix of every successful response.
pub const TERMINATOR: &[u8] = b"00\r";

/// Prefix of every error response.
pub const ERROR_MARKER: &[u8] = b"\n01\t";

/// Default deadline for a command's response.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(500);

/// Classified response bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Terminated response; the text has the terminator and outer whitespace removed.
    Success(String),
    /// Nothing was received.
    Empty,
    /// Error marker followed by this message.
    Error(String),
    /// Anything else, verbatim.
    Unexpected(Vec<u8>),
}

impl Reply {
    /// Turn the reply into the result of sending `command`.
    pub fn into_result(self, command: &Command) -> Result<String> {
        let command = command
            .text()
            .to_string();
        match self {
            Reply::Success(text) => Ok(text),
            Reply::Empty => Err(Error::NoResponse { command }),
            Reply::Error(message) => Err(Error::Device { command, message }),
            Reply::Unexpected(raw) => Err(Error::UnexpectedResponse { command, raw }),
        }
    }
}

/// Classify accumulated response bytes.
pub fn classify(raw: &[u8]) -> Reply {
    if let Some(body) = raw.strip_suffix(TERMINATOR) {
        return Reply::Success(
            String::from_utf8_lossy(body)
                .trim()
                .to_string(),
        );
    }
    if raw.is_empty() {
        return Reply::Empty;
    }
    if raw.len() > ERROR_MARKER.len() && raw.starts_with(ERROR_MARKER) {
        let message = String::from_utf8_lossy(&raw[ERROR_MARKER.len()..]);
        return Reply::Error(
            message
                .trim_end()
                .to_string(),
        );
    }
    Reply::Unexpected(raw.to_vec())
}

/// Sends AT commands over a [`Transport`] and interprets the replies.
pub struct CommandEngine<P: Port> {
    transport: Transport<P>,
    timeout: Duration,
}

impl<P: Port> CommandEngine<P> {
    /// Create an engine using [`DEFAULT_COMMAND_TIMEOUT`].
    pub fn new(transport: Transport<P>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Set the response deadline used by [`CommandEngine::send`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &Transport<P> {
        &self.transport
    }

    /// Get a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut Transport<P> {
        &mut self.transport
    }

    /// Consume the engine and return the transport.
    pub fn into_transport(self) -> Transport<P> {
        self.transport
    }

    /// Send a command and wait for its response.
    pub fn send(&mut self, command: &Command) -> Result<String> {
        self.send_with_timeout(command, self.timeout)
    }

    /// Send a command and wait up to `timeout` for its response.
    pub fn send_with_timeout(&mut self, command: &Command, timeout: Duration) -> Result<String> {
        self.write_command(command)?;

        let deadline = Instant::now() + timeout;
        let mut response = Vec::new();
        while !response.ends_with(TERMINATOR) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            // A read that comes back empty has already waited out the deadline
            match self
                .transport
                .read_byte(remaining)?
            {
                Some(byte) => response.push(byte),
                None => break,
            }
        }

        trace!("Response to '{command}': {:?}", String::from_utf8_lossy(&response));
        classify(&response).into_result(command)
    }

    /// Send a command without reading anything back.
    ///
    /// Used when completion is observed by other means, e.g. `+RUN`.
    pub fn send_no_wait(&mut self, command: &Command) -> Result<()> {
        self.write_command(command)
    }

    /// Query info parameter `index` and return the last tab-separated field.
    pub fn read_param(&mut self, index: u8) -> Result<String> {
        let text = self.send(&Command::info(index))?;
        Ok(text
            .rsplit('\t')
            .next()
            .unwrap_or_default()
            .to_string())
    }

    fn write_command(&mut self, command: &Command) -> Result<()> {
        let frame = command.frame()?;
        debug!("Sending AT{}{command}", if command.is_extended() { "" } else { " " });
        self.transport
            .write(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::ScriptedPort;

    fn engine(port: ScriptedPort) -> CommandEngine<ScriptedPort> {
        CommandEngine::new(Transport::new(port))
    }

    #[test]
    fn test_classify_success_strips_terminator_and_whitespace() {
        assert_eq!(classify(b"\n10\t0\tBL600\r00\r"), Reply::Success("10\t0\tBL600".into()));
        assert_eq!(classify(b"00\r"), Reply::Success(String::new()));
    }

    #[test]
    fn test_classify_error_marker() {
        assert_eq!(classify(b"\n01\tE0213\r"), Reply::Error("E0213".into()));
    }

    #[test]
    fn test_classify_bare_marker_is_unexpected() {
        assert_eq!(classify(b"\n01\t"), Reply::Unexpected(b"\n01\t".to_vec()));
    }

    #[test]
    fn test_classify_empty_and_garbage() {
        assert_eq!(classify(b""), Reply::Empty);
        assert_eq!(classify(b"noise"), Reply::Unexpected(b"noise".to_vec()));
    }

    #[test]
    fn test_classify_payload_ending_in_terminator_counts_as_success() {
        assert_eq!(classify(b"\n01\tcode 100\r"), Reply::Success("01\tcode 1".into()));
    }

    #[test]
    fn test_send_returns_text_without_terminator() {
        let port = ScriptedPort::new().reply(b"OK\t1234\r00\r");
        let mut engine = engine(port);
        let text = engine
            .send(&Command::info(3))
            .unwrap();
        assert_eq!(text, "OK\t1234");
        assert_eq!(
            engine
                .transport()
                .port()
                .written(),
            b"AT I 3\r"
        );
    }

    #[test]
    fn test_send_stops_reading_at_terminator() {
        let port = ScriptedPort::new().reply(b"00\rleftover");
        let mut engine = engine(port);
        assert_eq!(
            engine
                .send(&Command::probe())
                .unwrap(),
            ""
        );
        let rest = engine
            .transport_mut()
            .read_up_to(64, Duration::from_millis(10))
            .unwrap();
        assert_eq!(rest, b"leftover");
    }

    #[test]
    fn test_send_device_error() {
        let port = ScriptedPort::new().reply(b"\n01\tbad thing");
        let mut engine = engine(port);
        let err = engine
            .send(&Command::dir())
            .unwrap_err();
        match err {
            Error::Device { command, message } => {
                assert_eq!(command, "+DIR");
                assert_eq!(message, "bad thing");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_send_no_response_names_command() {
        let mut engine = engine(ScriptedPort::new());
        let err = engine
            .send(&Command::file_close())
            .unwrap_err();
        assert!(matches!(err, Error::NoResponse { ref command } if command == "+FCL"));
        assert!(
            err.to_string()
                .contains("+FCL")
        );
    }

    #[test]
    fn test_send_unexpected_keeps_raw_bytes() {
        let port = ScriptedPort::new().reply(b"garbage\r");
        let mut engine = engine(port);
        let err = engine
            .send(&Command::dir())
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { ref raw, .. } if raw == b"garbage\r"));
    }

    #[test]
    fn test_send_no_wait_reads_nothing() {
        let port = ScriptedPort::new().reply(b"output");
        let mut engine = engine(port);
        engine
            .send_no_wait(&Command::run("app"))
            .unwrap();
        let pending = engine
            .transport_mut()
            .read_up_to(64, Duration::from_millis(10))
            .unwrap();
        assert_eq!(pending, b"output");
    }

    #[test]
    fn test_read_param_returns_last_field() {
        let port = ScriptedPort::new().ok("\n10\t0\tBL600-SA");
        let mut engine = engine(port);
        assert_eq!(
            engine
                .read_param(0)
                .unwrap(),
            "BL600-SA"
        );
    }

    #[test]
    fn test_read_param_without_tabs_returns_whole_text() {
        let port = ScriptedPort::new().ok("1.5.70.0");
        let mut engine = engine(port);
        assert_eq!(
            engine
                .read_param(13)
                .unwrap(),
            "1.5.70.0"
        );
    }

    /// Port that trickles one byte per millisecond and never terminates.
    struct ChattyPort {
        timeout: Duration,
    }

    impl std::io::Read for ChattyPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(1));
            match buf.first_mut() {
                Some(slot) => {
                    *slot = b'x';
                    Ok(1)
                },
                None => Ok(0),
            }
        }
    }

    impl std::io::Write for ChattyPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Port for ChattyPort {
        fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
            self.timeout = timeout;
            Ok(())
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        fn clear_buffers(&mut self) -> Result<()> {
            Ok(())
        }

        fn set_dtr(&mut self, _level: bool) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_send_gives_up_at_deadline_while_bytes_keep_coming() {
        let port = ChattyPort {
            timeout: Duration::ZERO,
        };
        let mut engine = CommandEngine::new(Transport::new(port));

        let started = Instant::now();
        let err = engine
            .send(&Command::dir())
            .unwrap_err();
        let elapsed = started.elapsed();

        match err {
            Error::UnexpectedResponse { command, raw } => {
                assert_eq!(command, "+DIR");
                assert!(!raw.is_empty());
                assert!(raw.iter().all(|&b| b == b'x'));
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(elapsed >= DEFAULT_COMMAND_TIMEOUT, "returned after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "returned after {elapsed:?}");
    }
}
