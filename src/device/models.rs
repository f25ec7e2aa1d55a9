use serde::{Deserialize, Serialize};

use crate::errlog::types::DecodedRecord;

/// Link connection state. `Error` is a disconnected state that remembers
/// the fault which ended the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Bulk error-log fetch progress. A new sequence is rejected, not queued,
/// while one is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchState {
    Idle,
    Sending(u32),
}

impl FetchState {
    pub fn is_active(&self) -> bool {
        matches!(self, FetchState::Sending(_))
    }
}

/// Everything the pipeline reports to its consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// A received line for the console view (records included).
    ConsoleLine(String),
    /// An outbound command left the host, with its frame checksum when the
    /// transport profile required one.
    CommandSent {
        command: String,
        checksum: Option<String>,
    },
    /// A record line parsed, decoded, and appended to the log store.
    RecordParsed(DecodedRecord),
    /// A record-marker line that failed shape validation and was dropped.
    RecordRejected { line: String, reason: String },
    /// The transport died; the session is no longer connected.
    LinkDown { reason: String },
}
