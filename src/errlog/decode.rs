//! Per-field decoders. Every function here is pure and total over `&str`:
//! malformed input yields a deterministic sentinel string, the absent-field
//! sentinel decodes to `N/A`, and no decoder can fail a record as a whole.

use chrono::{Local, TimeZone};

use super::classify::classify;
use super::knowledge;
use super::types::{DecodedRecord, DiagnosticRecord};

/// Wire sentinel for a field that is not present.
pub const NOT_AVAILABLE: &str = "N/A";

pub const INVALID_RTC: &str = "Invalid RTC";

/// Unix seconds for 2012-01-01 00:00:00 UTC, the device RTC epoch.
pub const RTC_EPOCH_SECS: i64 = 1_325_376_000;

fn is_absent(raw: &str) -> bool {
    raw.is_empty() || raw == NOT_AVAILABLE
}

/// Absolute unix seconds for an RTC field: the hex value is a signed
/// offset from the device epoch.
pub fn rtc_timestamp(raw: &str) -> Option<i64> {
    let offset = i64::from_str_radix(raw.trim(), 16).ok()?;
    RTC_EPOCH_SECS.checked_add(offset)
}

/// `YYYY-MM-DD HH:MM:SS` in local time, or `Invalid RTC`.
pub fn decode_rtc(raw: &str) -> String {
    if is_absent(raw) {
        return NOT_AVAILABLE.to_string();
    }
    match rtc_timestamp(raw).and_then(|secs| Local.timestamp_opt(secs, 0).single()) {
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => INVALID_RTC.to_string(),
    }
}

/// Two-part `<HostState><EmcState>` label from the 8-hex-digit power state.
/// The host OS state lives in the second byte, the EMC state in the fourth.
pub fn decode_power_state(raw: &str) -> String {
    if is_absent(raw) {
        return NOT_AVAILABLE.to_string();
    }
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return "Invalid PwState Hex".to_string();
    }
    let upper = raw.to_ascii_uppercase();

    let host = match &upper[2..4] {
        "00" => "SysReady:",
        "01" => "MaOnStby:",
        "20" | "30" => "BIOS____:",
        "40" => "EAP_Redy:",
        "FF" => "HstOsOFF:",
        other => match other.as_bytes()[0] {
            b'0' => "Reserved:",
            b'1' => "PSP____:",
            b'4' => "EAP____:",
            b'5'..=b'9' | b'A' | b'B' => "Kernel__:",
            b'C'..=b'F' => "IntPrcss:",
            _ => "        ",
        },
    };

    let emc = match &upper[6..8] {
        "00" => "ACIN_L",
        "01" => "Stanby",
        "02" => "PG2_ON",
        "03" => "EFC_ON",
        "04" => "EAP_ON",
        "05" => "SOC_ON",
        "06" => "ErrDET",
        "07" => "FtlErr",
        "08" => "NvrBot",
        "09" => "FrcOFF",
        "0A" => "FofBTd",
        _ => "______",
    };

    format!("{}{}", host, emc)
}

/// Boot-trigger cause from its 8-hex-digit bit pattern.
pub fn decode_wake_cause(raw: &str) -> String {
    if is_absent(raw) {
        return NOT_AVAILABLE.to_string();
    }
    if raw.len() != 8 {
        return "Invalid UpCause Hex".to_string();
    }
    match raw.to_ascii_uppercase().as_str() {
        "40000000" => "UART",
        "00080000" => "BT",
        "00040000" => "CEC",
        "00020000" => "EAP",
        "00010000" => "SoC",
        "00000400" => "Eject Button",
        "00000200" => "DLd",
        "00000100" => "PowerButton",
        "00000001" => "BPW",
        _ => "Unknown UpCause",
    }
    .to_string()
}

const DEV_POWER_FLAGS: [(u64, &str); 5] = [
    (0x10, "HDD/SSD"),
    (0x08, "ODD"),
    (0x04, "AcDc"),
    (0x02, "Usb"),
    (0x01, "Wlan"),
];

/// Pipe-joined list of the powered device groups in the bitmask.
pub fn decode_dev_power(raw: &str) -> String {
    if is_absent(raw) {
        return NOT_AVAILABLE.to_string();
    }
    let value = match u64::from_str_radix(raw.trim(), 16) {
        Ok(value) => value,
        Err(_) => return "Invalid DevPower Hex".to_string(),
    };
    let active: Vec<&str> = DEV_POWER_FLAGS
        .iter()
        .filter(|(bit, _)| value & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if active.is_empty() {
        "None Active".to_string()
    } else {
        active.join(" | ")
    }
}

/// Raw sensor counts are degrees Celsius times 256.
pub fn temp_celsius(raw: &str) -> Option<f64> {
    u64::from_str_radix(raw.trim(), 16)
        .ok()
        .map(|value| value as f64 / 256.0)
}

/// `<value>.<2 digits> °C`, or the invalid/absent sentinels.
pub fn decode_temp(raw: &str) -> String {
    if is_absent(raw) {
        return NOT_AVAILABLE.to_string();
    }
    match temp_celsius(raw) {
        Some(celsius) => format!("{:.2} °C", celsius),
        None => "Invalid Hex Temp".to_string(),
    }
}

/// Power-sequence label for a 4-hex-digit sequence number. Unmatched codes
/// keep the original value visible for traceability.
pub fn decode_seq_no(raw: &str) -> String {
    if is_absent(raw) {
        return NOT_AVAILABLE.to_string();
    }
    match knowledge::sequence_labels().lookup(raw) {
        Some(label) => label.to_string(),
        None => format!("Unknown SeqNo ({})", raw),
    }
}

/// Error-code description via longest-prefix match, severity marker
/// included. Unmatched codes keep the original value visible.
pub fn decode_err_code(raw: &str) -> String {
    if is_absent(raw) {
        return NOT_AVAILABLE.to_string();
    }
    match knowledge::error_codes().lookup(raw) {
        Some(entry) => entry.display(),
        None => format!("Unknown Code ({})", raw),
    }
}

/// Field decoders by display label, for presentation layers that walk a
/// record field by field.
pub const FIELD_DECODERS: &[(&str, fn(&str) -> String)] = &[
    ("Code", decode_err_code),
    ("RTC", decode_rtc),
    ("Powerstate", decode_power_state),
    ("UpCause", decode_wake_cause),
    ("SeqNo", decode_seq_no),
    ("DevPM", decode_dev_power),
    ("TSOC", decode_temp),
    ("TENV", decode_temp),
];

/// Decode every field of a parsed record and derive its sort timestamp and
/// severity tag.
pub fn decode_record(raw: DiagnosticRecord) -> DecodedRecord {
    let rtc_text = decode_rtc(&raw.rtc);
    let timestamp = match rtc_text.as_str() {
        INVALID_RTC | NOT_AVAILABLE => 0,
        _ => rtc_timestamp(&raw.rtc).unwrap_or(0),
    };
    let severity = classify(&raw.code, temp_celsius(&raw.soc_temp));

    DecodedRecord {
        code_text: decode_err_code(&raw.code),
        rtc_text,
        power_state_text: decode_power_state(&raw.power_state),
        wake_cause_text: decode_wake_cause(&raw.wake_cause),
        seq_no_text: decode_seq_no(&raw.seq_no),
        dev_power_text: decode_dev_power(&raw.dev_power),
        soc_temp_text: decode_temp(&raw.soc_temp),
        env_temp_text: decode_temp(&raw.env_temp),
        checksum_text: raw
            .checksum
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        timestamp,
        severity,
        raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errlog::types::SeverityTag;

    #[test]
    fn test_rtc_decodes_relative_to_epoch() {
        let expected = Local
            .timestamp_opt(RTC_EPOCH_SECS + 0x64, 0)
            .single()
            .unwrap()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        assert_eq!(decode_rtc("64"), expected);
    }

    #[test]
    fn test_rtc_sentinels() {
        assert_eq!(decode_rtc("ZZ"), INVALID_RTC);
        assert_eq!(decode_rtc("FFFFFFFFFFFFFFFF"), INVALID_RTC);
        assert_eq!(decode_rtc("N/A"), NOT_AVAILABLE);
        assert_eq!(decode_rtc(""), NOT_AVAILABLE);
    }

    #[test]
    fn test_power_state_known_codes() {
        assert_eq!(decode_power_state("00000102"), "SysReady:PG2_ON");
        assert_eq!(decode_power_state("00ff0005"), "HstOsOFF:SOC_ON");
        assert_eq!(decode_power_state("00700001"), "Kernel__:Stanby");
        assert_eq!(decode_power_state("00D00003"), "IntPrcss:EFC_ON");
        assert_eq!(decode_power_state("002500FF"), "        ______");
    }

    #[test]
    fn test_power_state_rejects_bad_shape() {
        assert_eq!(decode_power_state("0000010"), "Invalid PwState Hex");
        assert_eq!(decode_power_state("0000010Z"), "Invalid PwState Hex");
    }

    #[test]
    fn test_wake_cause_lookup() {
        assert_eq!(decode_wake_cause("40000000"), "UART");
        assert_eq!(decode_wake_cause("00000100"), "PowerButton");
        assert_eq!(decode_wake_cause("deadbeef"), "Unknown UpCause");
        assert_eq!(decode_wake_cause("1234"), "Invalid UpCause Hex");
    }

    #[test]
    fn test_dev_power_flags() {
        assert_eq!(decode_dev_power("1F"), "HDD/SSD | ODD | AcDc | Usb | Wlan");
        assert_eq!(decode_dev_power("12"), "HDD/SSD | Usb");
        assert_eq!(decode_dev_power("0"), "None Active");
        assert_eq!(decode_dev_power("XY"), "Invalid DevPower Hex");
    }

    #[test]
    fn test_temperature_scaling() {
        assert_eq!(decode_temp("1900"), "25.00 °C");
        assert_eq!(decode_temp("3700"), "55.00 °C");
        assert_eq!(decode_temp("ZZ"), "Invalid Hex Temp");
        assert_eq!(decode_temp(""), NOT_AVAILABLE);
    }

    #[test]
    fn test_seq_no_lookup_embeds_unknown_codes() {
        assert_eq!(decode_seq_no("2002"), "EmcBootup");
        assert_eq!(decode_seq_no("2b5f"), "Unknown SeqNo (2b5f)");
    }

    #[test]
    fn test_err_code_lookup_embeds_unknown_codes() {
        assert_eq!(
            decode_err_code("80000004"),
            "(CRITICAL) AC/DC Power Fail"
        );
        assert_eq!(decode_err_code("DEADBEEF"), "Unknown Code (DEADBEEF)");
    }

    #[test]
    fn test_decoders_are_idempotent() {
        for raw in ["3700", "ZZ", "N/A", ""] {
            assert_eq!(decode_temp(raw), decode_temp(raw));
        }
        for raw in ["80050000", "DEAD", "N/A"] {
            assert_eq!(decode_err_code(raw), decode_err_code(raw));
        }
        for raw in ["64", "ZZ"] {
            assert_eq!(decode_rtc(raw), decode_rtc(raw));
        }
    }

    #[test]
    fn test_field_decoder_table_is_total_over_absent_fields() {
        for (label, decoder) in FIELD_DECODERS {
            assert_eq!(decoder("N/A"), NOT_AVAILABLE, "decoder for {}", label);
        }
    }

    #[test]
    fn test_decode_record_derives_timestamp_and_severity() {
        let raw = crate::errlog::parser::parse_record(
            "OK 1 80000001 64 00000102 40000000 2002 10 3700 1C00:AB",
        )
        .unwrap();
        let decoded = decode_record(raw);

        assert_eq!(decoded.timestamp, RTC_EPOCH_SECS + 0x64);
        assert_eq!(decoded.code_text, "Failed to access thermal sensor");
        assert_eq!(decoded.seq_no_text, "EmcBootup");
        assert_eq!(decoded.soc_temp_text, "55.00 °C");
        assert_eq!(decoded.checksum_text, "AB");
        // 55 °C with a non-critical code classifies as a thermal warning.
        assert_eq!(decoded.severity, SeverityTag::Warning);
    }

    #[test]
    fn test_invalid_rtc_sorts_at_epoch_zero() {
        let raw = crate::errlog::parser::parse_record(
            "OK 1 80000001 ZZZZ 00000102 40000000 2002 10 1900 1C00",
        )
        .unwrap();
        let decoded = decode_record(raw);
        assert_eq!(decoded.rtc_text, INVALID_RTC);
        assert_eq!(decoded.timestamp, 0);
        assert_eq!(decoded.checksum_text, NOT_AVAILABLE);
    }
}
