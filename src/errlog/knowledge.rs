//! Error and sequence knowledge bases. The table contents are opaque data
//! shipped as embedded JSON and loaded once; matching is an explicit
//! longest-prefix scan so the precedence rule stays visible instead of being
//! buried in a conditional cascade.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeSeverity {
    Critical,
    Error,
    Common,
}

impl fmt::Display for CodeSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CodeSeverity::Critical => "CRITICAL",
            CodeSeverity::Error => "ERROR",
            CodeSeverity::Common => "Common",
        };
        write!(f, "{}", label)
    }
}

/// One classification entry: a hex prefix (2, 4, 6, or 8 digits in the
/// shipped table), its description, and an optional severity marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCodeEntry {
    pub prefix: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<CodeSeverity>,
}

impl ErrorCodeEntry {
    /// Decoded display form, e.g. `(CRITICAL) AC/DC Power Fail`.
    pub fn display(&self) -> String {
        match self.severity {
            Some(severity) => format!("({}) {}", severity, self.message),
            None => self.message.clone(),
        }
    }
}

/// Ordered prefix table. Among all entries whose prefix leads the code, the
/// longest wins; entries of equal length keep their registration order, so
/// the first one registered wins ties.
#[derive(Debug, Clone)]
pub struct ErrorKnowledgeBase {
    entries: Vec<ErrorCodeEntry>,
}

impl ErrorKnowledgeBase {
    pub fn from_entries(mut entries: Vec<ErrorCodeEntry>) -> Self {
        for entry in &mut entries {
            entry.prefix = entry.prefix.to_ascii_uppercase();
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, code: &str) -> Option<&ErrorCodeEntry> {
        let code = code.trim().to_ascii_uppercase();
        let mut best: Option<&ErrorCodeEntry> = None;
        for entry in &self.entries {
            if code.starts_with(&entry.prefix)
                && best.map_or(true, |b| entry.prefix.len() > b.prefix.len())
            {
                best = Some(entry);
            }
        }
        best
    }
}

/// Exact-match table from a 4-hex-digit sequence number to its label.
#[derive(Debug, Clone)]
pub struct SequenceKnowledgeBase {
    labels: HashMap<String, String>,
}

impl SequenceKnowledgeBase {
    pub fn from_map(labels: HashMap<String, String>) -> Self {
        let labels = labels
            .into_iter()
            .map(|(key, label)| (key.to_ascii_uppercase(), label))
            .collect();
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.labels
            .get(&key.trim().to_ascii_uppercase())
            .map(String::as_str)
    }
}

static ERROR_CODES: Lazy<ErrorKnowledgeBase> = Lazy::new(|| {
    let entries: Vec<ErrorCodeEntry> =
        serde_json::from_str(include_str!("../../data/error_codes.json"))
            .expect("embedded error code table parses");
    ErrorKnowledgeBase::from_entries(entries)
});

static SEQUENCE_LABELS: Lazy<SequenceKnowledgeBase> = Lazy::new(|| {
    let labels: HashMap<String, String> =
        serde_json::from_str(include_str!("../../data/seq_codes.json"))
            .expect("embedded sequence table parses");
    SequenceKnowledgeBase::from_map(labels)
});

/// The shipped error-code knowledge base.
pub fn error_codes() -> &'static ErrorKnowledgeBase {
    &ERROR_CODES
}

/// The shipped power-sequence knowledge base.
pub fn sequence_labels() -> &'static SequenceKnowledgeBase {
    &SEQUENCE_LABELS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prefix: &str, message: &str) -> ErrorCodeEntry {
        ErrorCodeEntry {
            prefix: prefix.to_string(),
            message: message.to_string(),
            severity: None,
        }
    }

    #[test]
    fn test_longest_prefix_wins() {
        let kb = ErrorKnowledgeBase::from_entries(vec![
            entry("80", "family"),
            entry("8005", "group"),
            entry("80050000", "exact"),
        ]);
        assert_eq!(kb.lookup("80050000").unwrap().message, "exact");
        assert_eq!(kb.lookup("80051234").unwrap().message, "group");
        assert_eq!(kb.lookup("80FF0000").unwrap().message, "family");
        assert!(kb.lookup("C0010000").is_none());
    }

    #[test]
    fn test_equal_length_ties_keep_first_registered() {
        let kb = ErrorKnowledgeBase::from_entries(vec![
            entry("8005", "first"),
            entry("8005", "second"),
        ]);
        assert_eq!(kb.lookup("80051234").unwrap().message, "first");
    }

    #[test]
    fn test_lookup_ignores_case() {
        let kb = ErrorKnowledgeBase::from_entries(vec![entry("b0", "bus error")]);
        assert_eq!(kb.lookup("B0123456").unwrap().message, "bus error");
    }

    #[test]
    fn test_shipped_tables_load() {
        assert!(!error_codes().is_empty());
        assert!(!sequence_labels().is_empty());

        let entry = error_codes().lookup("80050000").unwrap();
        assert_eq!(entry.message, "SoC VRM Power Fail (CPU)");
        assert_eq!(entry.prefix, "80050000");
        assert_eq!(entry.severity, Some(CodeSeverity::Critical));

        assert_eq!(sequence_labels().lookup("2002"), Some("EmcBootup"));
        assert_eq!(sequence_labels().lookup("2b5"), None);
    }

    #[test]
    fn test_severity_display_matches_wire_labels() {
        let e = ErrorCodeEntry {
            prefix: "8080".into(),
            message: "Fatal Shutdown by OS request".into(),
            severity: Some(CodeSeverity::Critical),
        };
        assert_eq!(e.display(), "(CRITICAL) Fatal Shutdown by OS request");
    }
}
