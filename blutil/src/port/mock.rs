//! In-memory port used by unit tests.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::port::Port;

/// Port that answers every `\r`-terminated line with the next scripted reply.
///
/// Reads never block: an empty input queue is reported as `TimedOut`, which is
/// what a real port does once its timeout elapses.
pub(crate) struct ScriptedPort {
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    written: Vec<u8>,
    timeout: Duration,
    pub(crate) dtr_levels: Vec<bool>,
    pub(crate) clears: usize,
    pub(crate) closed: bool,
}

impl ScriptedPort {
    pub(crate) fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            rx: VecDeque::new(),
            written: Vec::new(),
            timeout: Duration::from_millis(800),
            dtr_levels: Vec::new(),
            clears: 0,
            closed: false,
        }
    }

    /// Queue the bytes sent back after the next command line.
    pub(crate) fn reply(mut self, bytes: &[u8]) -> Self {
        self.replies
            .push_back(bytes.to_vec());
        self
    }

    /// Queue a plain success reply carrying `body`.
    pub(crate) fn ok(self, body: &str) -> Self {
        let mut bytes = body
            .as_bytes()
            .to_vec();
        bytes.extend_from_slice(b"\r00\r");
        self.reply(&bytes)
    }

    /// Every line written so far, with `AT` framing intact and `\r` removed.
    pub(crate) fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written)
            .split('\r')
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn written(&self) -> &[u8] {
        &self.written
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self
            .rx
            .is_empty()
        {
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf
            .len()
            .min(
                self.rx
                    .len(),
            );
        for (slot, byte) in buf
            .iter_mut()
            .zip(
                self.rx
                    .drain(..n),
            )
        {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written
            .extend_from_slice(buf);
        for _ in buf
            .iter()
            .filter(|&&b| b == b'\r')
        {
            if let Some(reply) = self
                .replies
                .pop_front()
            {
                self.rx
                    .extend(reply);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Port for ScriptedPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.rx
            .clear();
        self.clears += 1;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.dtr_levels
            .push(level);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
