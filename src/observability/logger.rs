//! Structured JSON logger.
//!
//! - one log line per event, written synchronously, no buffering
//! - the event name leads, severity second, remaining fields sorted by key
//! - error and fatal lines go to stderr, everything else to stdout

use std::fmt;
use std::io::{self, Write};

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Normal operation.
    Info = 0,
    /// Something recoverable went sideways.
    Warn = 1,
    /// An operation failed.
    Error = 2,
    /// The process is about to exit.
    Fatal = 3,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Logger;

impl Logger {
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::write_line(Severity::Info, event, fields, &mut io::stdout());
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::write_line(Severity::Warn, event, fields, &mut io::stdout());
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::write_line(Severity::Error, event, fields, &mut io::stderr());
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::write_line(Severity::Fatal, event, fields, &mut io::stderr());
    }

    fn write_line<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let line = Self::render(severity, event, fields);
        // One write_all call so concurrent loggers cannot interleave
        // within a line.
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut line = String::with_capacity(128);
        line.push_str("{\"event\":\"");
        escape_into(&mut line, event);
        line.push_str("\",\"severity\":\"");
        line.push_str(severity.as_str());
        line.push('"');

        let mut ordered: Vec<&(&str, &str)> = fields.iter().collect();
        ordered.sort_by_key(|(key, _)| *key);
        for (key, value) in ordered {
            line.push_str(",\"");
            escape_into(&mut line, key);
            line.push_str("\":\"");
            escape_into(&mut line, value);
            line.push('"');
        }

        line.push_str("}\n");
        line
    }
}

fn escape_into(out: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        Logger::render(severity, event, fields)
    }

    #[test]
    fn test_line_is_valid_json() {
        let line = render(Severity::Info, "RESTORE_STATE", &[("from", "starting")]);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "RESTORE_STATE");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["from"], "starting");
    }

    #[test]
    fn test_event_leads_and_fields_are_sorted() {
        let line = render(
            Severity::Info,
            "RESTORE_FINISHED",
            &[("skipped", "1"), ("busy", "0"), ("restored", "2")],
        );

        let event_at = line.find("\"event\"").unwrap();
        let busy_at = line.find("\"busy\"").unwrap();
        let restored_at = line.find("\"restored\"").unwrap();
        let skipped_at = line.find("\"skipped\"").unwrap();

        assert!(event_at < busy_at);
        assert!(busy_at < restored_at);
        assert!(restored_at < skipped_at);
    }

    #[test]
    fn test_field_order_is_deterministic() {
        let a = render(Severity::Warn, "E", &[("b", "2"), ("a", "1")]);
        let b = render(Severity::Warn, "E", &[("a", "1"), ("b", "2")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_special_characters_survive() {
        let line = render(
            Severity::Error,
            "RESTORE_FAILED",
            &[("error", "path \"x\"\nnot found\t")],
        );
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["error"], "path \"x\"\nnot found\t");
    }

    #[test]
    fn test_exactly_one_line() {
        let line = render(Severity::Fatal, "E", &[("a", "1")]);
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }
}
