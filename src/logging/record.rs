//! Canonical log line schema.
//!
//! Every log file uses one line per record:
//!
//! ```text
//! 2026-10-16 14:03:11.482 | INFO | question: what is X?
//! ```
//!
//! Producers build messages with the functions here and the dashboard parses
//! them back with [`parse_line`] and [`LogMessage::classify`].

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::Serialize;

/// Local time with millisecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Field separator between timestamp, level and message.
pub const SEPARATOR: &str = " | ";

pub const QUESTION: &str = "question:";
pub const ANSWER: &str = "answer:";
pub const SOURCES: &str = "sources:";
pub const INFERENCE_TIME: &str = "inference_time:";
pub const FAILED_AFTER: &str = "failed_after:";
pub const INDEX_STARTED: &str = "index_started:";
pub const LOADED: &str = "loaded:";
pub const LOAD_FAILED: &str = "load_failed:";
pub const CHUNKS: &str = "chunks:";
pub const EMBEDDING_TIME: &str = "embedding_time:";
pub const TOTAL_TIME: &str = "total_time:";
pub const NO_SOURCES: &str = "no sources found for:";

/// Escape a message so it fits on one line.
pub fn escape(message: &str) -> String {
    let mut escaped = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Reverse [`escape`].
pub fn unescape(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut chars = message.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Format one complete log line (without the trailing newline).
pub fn format_line<Tz: TimeZone>(timestamp: &DateTime<Tz>, level: &str, message: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}{SEPARATOR}{}{SEPARATOR}{}",
        timestamp.format(TIMESTAMP_FORMAT),
        level.to_ascii_uppercase(),
        escape(message)
    )
}

/// Format a line stamped with the current local time.
pub fn format_now(level: &str, message: &str) -> String {
    format_line(&Local::now(), level, message)
}

/// A parsed log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub level: String,
    pub message: String,
}

/// Parse a line produced by [`format_line`]. Returns `None` for malformed lines.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let line = line.trim_end_matches(['\n', '\r']);
    let mut parts = line.splitn(3, SEPARATOR);

    let timestamp = NaiveDateTime::parse_from_str(parts.next()?.trim(), TIMESTAMP_FORMAT).ok()?;
    let level = parts.next()?.trim();
    if !matches!(level, "TRACE" | "DEBUG" | "INFO" | "WARN" | "ERROR") {
        return None;
    }
    let message = unescape(parts.next()?);

    Some(LogRecord {
        timestamp,
        level: level.to_string(),
        message,
    })
}

pub fn question(question: &str) -> String {
    format!("{QUESTION} {question}")
}

pub fn answer(answer: &str) -> String {
    format!("{ANSWER} {answer}")
}

/// Sources as a JSON array of paths, so any path survives the round trip.
pub fn sources(sources: &BTreeSet<String>) -> String {
    let list = serde_json::to_string(sources).unwrap_or_else(|_| "[]".to_string());
    format!("{SOURCES} {list}")
}

/// Latency of a turn that produced an answer.
pub fn inference_time(elapsed: Duration) -> String {
    format!("{INFERENCE_TIME} {:.3}s", elapsed.as_secs_f64())
}

/// Time spent on a turn that ended in an error.
pub fn failed_after(elapsed: Duration) -> String {
    format!("{FAILED_AFTER} {:.3}s", elapsed.as_secs_f64())
}

pub fn no_sources(question: &str) -> String {
    format!("{NO_SOURCES} {question}")
}

pub fn index_started(docs_dir: &Path) -> String {
    format!("{INDEX_STARTED} {}", docs_dir.display())
}

pub fn loaded(path: &Path, documents: usize, elapsed: Duration) -> String {
    format!(
        "{LOADED} {} documents={documents} time={:.3}s",
        path.display(),
        elapsed.as_secs_f64()
    )
}

pub fn load_failed(path: &Path, error: &dyn std::fmt::Display) -> String {
    format!("{LOAD_FAILED} {} error={error}", path.display())
}

pub fn chunks(count: usize) -> String {
    format!("{CHUNKS} {count} generated, embedding started")
}

pub fn embedding_time(elapsed: Duration) -> String {
    format!("{EMBEDDING_TIME} {:.3}s", elapsed.as_secs_f64())
}

pub fn total_time(elapsed: Duration) -> String {
    format!("{TOTAL_TIME} {:.3}s", elapsed.as_secs_f64())
}

/// Structured view of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum LogMessage {
    Question(String),
    Answer(String),
    Sources(Vec<String>),
    InferenceTime(f64),
    FailedAfter(f64),
    NoSources(String),
    IndexStarted(String),
    Loaded {
        file: String,
        documents: usize,
        seconds: f64,
    },
    LoadFailed {
        file: String,
        error: String,
    },
    Chunks(usize),
    EmbeddingTime(f64),
    TotalTime(f64),
    Other(String),
}

impl LogMessage {
    pub fn classify(message: &str) -> Self {
        let rest = |prefix: &str| message.strip_prefix(prefix).map(str::trim);

        if let Some(q) = rest(NO_SOURCES) {
            return Self::NoSources(q.to_string());
        }
        if let Some(q) = rest(QUESTION) {
            return Self::Question(q.to_string());
        }
        if let Some(a) = rest(ANSWER) {
            return Self::Answer(a.to_string());
        }
        if let Some(s) = rest(SOURCES) {
            return Self::Sources(parse_sources(s));
        }
        if let Some(dir) = rest(INDEX_STARTED) {
            return Self::IndexStarted(dir.to_string());
        }
        if let Some(secs) = rest(INFERENCE_TIME).and_then(parse_seconds) {
            return Self::InferenceTime(secs);
        }
        if let Some(secs) = rest(FAILED_AFTER).and_then(parse_seconds) {
            return Self::FailedAfter(secs);
        }
        if let Some(secs) = rest(EMBEDDING_TIME).and_then(parse_seconds) {
            return Self::EmbeddingTime(secs);
        }
        if let Some(secs) = rest(TOTAL_TIME).and_then(parse_seconds) {
            return Self::TotalTime(secs);
        }
        if let Some(loaded) = rest(LOADED).and_then(parse_loaded) {
            return loaded;
        }
        if let Some(body) = rest(LOAD_FAILED) {
            if let Some((file, error)) = body.split_once(" error=") {
                return Self::LoadFailed {
                    file: file.to_string(),
                    error: error.to_string(),
                };
            }
        }
        if let Some(count) = rest(CHUNKS)
            .and_then(|s| s.split_whitespace().next())
            .and_then(|n| n.parse().ok())
        {
            return Self::Chunks(count);
        }

        Self::Other(message.to_string())
    }
}

// A value that is not a JSON array is kept whole as a single path
fn parse_sources(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    serde_json::from_str(value).unwrap_or_else(|_| vec![value.to_string()])
}

fn parse_seconds(value: &str) -> Option<f64> {
    value.trim().strip_suffix('s')?.parse().ok()
}

fn parse_loaded(body: &str) -> Option<LogMessage> {
    let (head, time) = body.rsplit_once(" time=")?;
    let (file, documents) = head.rsplit_once(" documents=")?;
    Some(LogMessage::Loaded {
        file: file.to_string(),
        documents: documents.parse().ok()?,
        seconds: parse_seconds(time)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_and_parse_line() {
        let ts = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_milli_opt(14, 3, 11, 482)
            .unwrap()
            .and_utc();
        let line = format_line(&ts, "info", "question: what is X?");
        assert_eq!(line, "2026-10-16 14:03:11.482 | INFO | question: what is X?");

        let record = parse_line(&line).unwrap();
        assert_eq!(record.level, "INFO");
        assert_eq!(record.message, "question: what is X?");
        assert_eq!(record.timestamp, ts.naive_utc());
    }

    #[test]
    fn test_multiline_message_stays_on_one_line() {
        let message = "answer: first line\nsecond line\\with backslash\r\n";
        let line = format_now("INFO", message);
        assert_eq!(line.lines().count(), 1);

        let record = parse_line(&line).unwrap();
        assert_eq!(record.message, message);
    }

    #[test]
    fn test_message_may_contain_separator() {
        let line = format_now("WARN", "answer: a | b | c");
        assert_eq!(parse_line(&line).unwrap().message, "answer: a | b | c");
    }

    #[test]
    fn test_malformed_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("just some text").is_none());
        assert!(parse_line("2026-10-16 | INFO | x").is_none());
        assert!(parse_line("2026-10-16 14:03:11.482 | LOUD | x").is_none());
        assert!(parse_line("2026-10-16 14:03:11.482 | INFO").is_none());
    }

    #[test]
    fn test_classify_chat_messages() {
        assert_eq!(
            LogMessage::classify(&question("what is X?")),
            LogMessage::Question("what is X?".to_string())
        );
        assert_eq!(
            LogMessage::classify(&inference_time(Duration::from_millis(1500))),
            LogMessage::InferenceTime(1.5)
        );
        assert_eq!(
            LogMessage::classify(&no_sources("anything?")),
            LogMessage::NoSources("anything?".to_string())
        );

        let set: BTreeSet<String> = ["b.pdf", "a.txt"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            LogMessage::classify(&sources(&set)),
            LogMessage::Sources(vec!["a.txt".to_string(), "b.pdf".to_string()])
        );
        assert_eq!(
            LogMessage::classify(&sources(&BTreeSet::new())),
            LogMessage::Sources(Vec::new())
        );
        assert_eq!(
            LogMessage::classify(&failed_after(Duration::from_millis(250))),
            LogMessage::FailedAfter(0.25)
        );
    }

    #[test]
    fn test_sources_with_commas_survive() {
        let set: BTreeSet<String> = ["docs/smith, john.pdf", "docs/q1, q2.txt"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let message = sources(&set);
        assert_eq!(
            message,
            r#"sources: ["docs/q1, q2.txt","docs/smith, john.pdf"]"#
        );
        assert_eq!(
            LogMessage::classify(&message),
            LogMessage::Sources(set.into_iter().collect())
        );
    }

    #[test]
    fn test_classify_process_messages() {
        let msg = loaded(Path::new("docs/my report.pdf"), 3, Duration::from_millis(250));
        assert_eq!(
            LogMessage::classify(&msg),
            LogMessage::Loaded {
                file: "docs/my report.pdf".to_string(),
                documents: 3,
                seconds: 0.25
            }
        );

        let msg = load_failed(Path::new("docs/bad.pdf"), &"PDF error: broken xref");
        assert_eq!(
            LogMessage::classify(&msg),
            LogMessage::LoadFailed {
                file: "docs/bad.pdf".to_string(),
                error: "PDF error: broken xref".to_string()
            }
        );

        assert_eq!(LogMessage::classify(&chunks(42)), LogMessage::Chunks(42));
        assert_eq!(
            LogMessage::classify(&index_started(Path::new("docs"))),
            LogMessage::IndexStarted("docs".to_string())
        );
        assert_eq!(
            LogMessage::classify(&total_time(Duration::from_secs(2))),
            LogMessage::TotalTime(2.0)
        );
        assert!(matches!(
            LogMessage::classify("[index] started"),
            LogMessage::Other(_)
        ));
    }
}
