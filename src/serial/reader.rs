//! Link reader task: owns the opened port, reassembles terminator-delimited
//! lines from the byte stream, filters command echoes, and hands complete
//! lines to the consumer side over an unbounded channel. All transport
//! failures surface as a single terminal `LinkEvent::Closed`; nothing panics
//! or escapes across the task boundary.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::{SerialError, SerialPortIO};

const READ_POLL_TIMEOUT_MS: u64 = 25;
const IDLE_SLEEP: Duration = Duration::from_millis(10);
const READ_CHUNK: usize = 512;

/// What the reader puts on the record queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete, trimmed, non-empty line from the device.
    Line(String),
    /// Terminal sentinel: the stream is gone and the reader has stopped.
    Closed { reason: String },
}

/// Outbound traffic into the reader task. The channel doubles as the
/// cooperative stop signal: `Shutdown` (or the sender going away) ends the
/// poll loop.
#[derive(Debug)]
pub enum PortCommand {
    Write { frame: Vec<u8>, echo_text: String },
    Shutdown,
}

/// Accumulates raw bytes and yields complete lines. Bytes after the last
/// terminator persist until the next push.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let raw: String = self.buffer.drain(..=pos).collect();
            let line = raw.trim_end_matches(['\n', '\r']).trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }
}

/// Suppresses the device's echo of the most recently transmitted command.
/// At most one case-insensitive match is dropped per armed command; once
/// consumed, an identical line passes through as data and any differing
/// line disarms the filter.
#[derive(Debug, Default)]
pub struct EchoFilter {
    armed: Option<String>,
    consumed: bool,
}

impl EchoFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the filter with the command that was just transmitted.
    pub fn arm(&mut self, command: &str) {
        self.armed = Some(command.trim().to_string());
        self.consumed = false;
    }

    /// Returns true when `line` is the echo and must be dropped.
    pub fn check(&mut self, line: &str) -> bool {
        match &self.armed {
            Some(command) if line.eq_ignore_ascii_case(command) => {
                if self.consumed {
                    false
                } else {
                    self.consumed = true;
                    true
                }
            }
            Some(_) => {
                if self.consumed {
                    self.armed = None;
                    self.consumed = false;
                }
                false
            }
            None => false,
        }
    }
}

/// Poll loop for the link. Runs until shut down or until the stream fails,
/// in which case one `Closed` sentinel is queued before exiting.
pub(crate) async fn reader_task(
    mut io: Box<dyn SerialPortIO>,
    mut cmd_rx: mpsc::Receiver<PortCommand>,
    line_tx: mpsc::UnboundedSender<LinkEvent>,
) {
    let mut framer = LineFramer::new();
    let mut echo = EchoFilter::new();
    let mut buf = [0u8; READ_CHUNK];

    'poll: loop {
        // Drain outbound commands first; the channel is also the stop flag.
        loop {
            match cmd_rx.try_recv() {
                Ok(PortCommand::Write { frame, echo_text }) => {
                    if let Err(e) = io.send_data(&frame).await {
                        log::error!("serial write failed: {}", e);
                        let _ = line_tx.send(LinkEvent::Closed {
                            reason: e.to_string(),
                        });
                        break 'poll;
                    }
                    echo.arm(&echo_text);
                }
                Ok(PortCommand::Shutdown) | Err(TryRecvError::Disconnected) => break 'poll,
                Err(TryRecvError::Empty) => break,
            }
        }

        match io.read_data(&mut buf, READ_POLL_TIMEOUT_MS).await {
            Ok(n) if n > 0 => {
                for line in framer.push(&buf[..n]) {
                    if echo.check(&line) {
                        log::debug!("suppressed command echo: {}", line);
                        continue;
                    }
                    if line_tx.send(LinkEvent::Line(line)).is_err() {
                        break 'poll;
                    }
                }
            }
            Ok(_) | Err(SerialError::Timeout) => {
                tokio::time::sleep(IDLE_SLEEP).await;
            }
            Err(e) => {
                log::error!("serial read failed: {}", e);
                let _ = line_tx.send(LinkEvent::Closed {
                    reason: e.to_string(),
                });
                break;
            }
        }
    }

    log::debug!("serial reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framer_handles_partial_lines() {
        let mut framer = LineFramer::new();
        let first = framer.push(b"OK 1\r\npart");
        assert_eq!(first, vec!["OK 1".to_string()]);
        let second = framer.push(b"ial line\n");
        assert_eq!(second, vec!["partial line".to_string()]);
    }

    #[test]
    fn test_framer_skips_blank_lines() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"\r\n   \n one \ntwo\n");
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_echo_suppressed_exactly_once() {
        let mut echo = EchoFilter::new();
        echo.arm("version");
        assert!(echo.check("VERSION"), "first echo is dropped");
        assert!(!echo.check("version"), "identical follow-up passes as data");
    }

    #[test]
    fn test_echo_survives_interleaved_output() {
        let mut echo = EchoFilter::new();
        echo.arm("version");
        assert!(!echo.check("booting"), "unrelated line passes");
        assert!(echo.check("version"), "echo after other output still dropped");
        assert!(!echo.check("1.05"), "response passes and disarms");
        assert!(!echo.check("version"), "filter stays disarmed");
    }

    #[test]
    fn test_unarmed_filter_passes_everything() {
        let mut echo = EchoFilter::new();
        assert!(!echo.check("version"));
    }
}
