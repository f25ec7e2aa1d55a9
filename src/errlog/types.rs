use serde::{Deserialize, Serialize};

/// One diagnostic record as parsed off the wire, fields still raw hex.
/// Only `errlog::parser::parse_record` constructs these; a malformed line
/// never yields a partial record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub raw_line: String,
    pub ack: String,
    pub code: String,
    pub rtc: String,
    pub power_state: String,
    pub wake_cause: String,
    pub seq_no: String,
    pub dev_power: String,
    pub soc_temp: String,
    pub env_temp: String,
    /// Trailing checksum suffix of the final field, when present.
    pub checksum: Option<String>,
}

/// Visual-priority tag derived from the raw code and the SoC temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTag {
    Critical,
    Warning,
    Notice,
    Normal,
}

/// A diagnostic record plus the human-readable decode of every field.
/// Immutable once built; only its position in the log store changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedRecord {
    pub raw: DiagnosticRecord,
    pub code_text: String,
    pub rtc_text: String,
    pub power_state_text: String,
    pub wake_cause_text: String,
    pub seq_no_text: String,
    pub dev_power_text: String,
    pub soc_temp_text: String,
    pub env_temp_text: String,
    pub checksum_text: String,
    /// Absolute unix seconds used for ordering. Records whose RTC field
    /// does not decode sort at 0 (the epoch), matching the device tooling
    /// this replaces.
    pub timestamp: i64,
    pub severity: SeverityTag,
}
