use super::types::SeverityTag;

/// SoC temperature above this decodes to a thermal warning when no
/// code-based tag applies.
pub const SOC_TEMP_WARN_CELSIUS: f64 = 50.0;

/// Fatal power-sequence families. `8080` only counts as a full 8-digit code.
const CRITICAL_PREFIXES: [&str; 2] = ["8080", "8081"];

/// Benign diagnostic families highlighted for quick triage.
const NOTICE_PREFIXES: [&str; 2] = ["C0020303", "80000009"];

/// Derive the visual-priority tag for a record from its raw code and the
/// decoded SoC temperature. Code-based tags take precedence over the
/// temperature rule.
pub fn classify(code: &str, soc_temp: Option<f64>) -> SeverityTag {
    let code = code.trim().to_ascii_uppercase();

    if code.starts_with(CRITICAL_PREFIXES[0]) && code.len() == 8 {
        return SeverityTag::Critical;
    }
    if code.starts_with(CRITICAL_PREFIXES[1]) {
        return SeverityTag::Critical;
    }
    if NOTICE_PREFIXES.iter().any(|prefix| code.starts_with(prefix)) {
        return SeverityTag::Notice;
    }

    match soc_temp {
        Some(celsius) if celsius > SOC_TEMP_WARN_CELSIUS => SeverityTag::Warning,
        _ => SeverityTag::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_code_families() {
        assert_eq!(classify("80800014", None), SeverityTag::Critical);
        assert_eq!(classify("80810001", Some(30.0)), SeverityTag::Critical);
        // A bare `8080` family match needs the full 8-digit code.
        assert_eq!(classify("8080", None), SeverityTag::Normal);
    }

    #[test]
    fn test_notice_code_families() {
        assert_eq!(classify("C0020303", None), SeverityTag::Notice);
        assert_eq!(classify("80000009", Some(80.0)), SeverityTag::Notice);
    }

    #[test]
    fn test_temperature_threshold_is_strict() {
        assert_eq!(classify("80000001", Some(55.0)), SeverityTag::Warning);
        assert_eq!(classify("80000001", Some(49.99)), SeverityTag::Normal);
        assert_eq!(classify("80000001", Some(50.0)), SeverityTag::Normal);
        assert_eq!(classify("80000001", None), SeverityTag::Normal);
    }

    #[test]
    fn test_code_tags_beat_temperature() {
        assert_eq!(classify("80810001", Some(80.0)), SeverityTag::Critical);
    }
}
