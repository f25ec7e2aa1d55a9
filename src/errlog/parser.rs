use super::types::DiagnosticRecord;

/// Leading token identifying a structured diagnostic record.
pub const RECORD_MARKER: &str = "OK";

/// Fields expected after the marker.
pub const RECORD_FIELD_COUNT: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line does not start with the record marker")]
    MissingMarker,

    #[error("expected 9 fields after the marker, got {0}")]
    WrongArity(usize),
}

/// Quick routing check used by the dispatcher; free-form device output
/// never reaches the parser.
pub fn is_record_line(line: &str) -> bool {
    line.starts_with("OK ")
}

/// Split a record line into its fields. The final field may carry a
/// `:`-separated checksum suffix; without one the checksum is absent.
pub fn parse_record(line: &str) -> Result<DiagnosticRecord, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let fields = match tokens.split_first() {
        Some((marker, fields)) if *marker == RECORD_MARKER => fields,
        _ => return Err(ParseError::MissingMarker),
    };
    if fields.len() != RECORD_FIELD_COUNT {
        return Err(ParseError::WrongArity(fields.len()));
    }

    let (env_temp, checksum) = match fields[8].split_once(':') {
        Some((value, checksum)) => (value.to_string(), Some(checksum.to_string())),
        None => (fields[8].to_string(), None),
    };

    Ok(DiagnosticRecord {
        raw_line: line.to_string(),
        ack: fields[0].to_string(),
        code: fields[1].to_string(),
        rtc: fields[2].to_string(),
        power_state: fields[3].to_string(),
        wake_cause: fields[4].to_string(),
        seq_no: fields[5].to_string(),
        dev_power: fields[6].to_string(),
        soc_temp: fields[7].to_string(),
        env_temp,
        checksum,
    })
}
