//! Aggregation of canonical log files.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::logging::LogFile;
use crate::logging::record::{LogMessage, parse_line};

/// Min/avg/max over a set of durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub min_secs: f64,
    pub avg_secs: f64,
    pub max_secs: f64,
}

impl LatencyStats {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = samples.iter().sum::<f64>() / samples.len() as f64;
        Some(Self {
            count: samples.len(),
            min_secs: min,
            avg_secs: avg,
            max_secs: max,
        })
    }
}

/// Statistics for `chat.log` / `web_chat.log`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatSummary {
    pub questions: usize,
    pub answers: usize,
    pub no_source_warnings: usize,
    pub errors: usize,
    pub failed_turns: usize,
    pub inference: Option<LatencyStats>,
}

/// One file load recorded in `process.log`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileLoad {
    pub file: String,
    pub documents: usize,
    pub seconds: f64,
}

/// Statistics for the most recent indexing run in `process.log`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessSummary {
    pub runs: usize,
    pub files: Vec<FileLoad>,
    pub failures: Vec<(String, String)>,
    pub chunks: Option<usize>,
    pub embedding_secs: Option<f64>,
    pub total_secs: Option<f64>,
    pub errors: usize,
}

/// Report over one log file.
#[derive(Debug, Clone, Serialize)]
pub struct LogSummary {
    pub log: LogFile,
    pub path: PathBuf,
    pub exists: bool,
    pub total_lines: usize,
    pub malformed_lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessSummary>,
    pub head: Vec<String>,
    pub tail: Vec<String>,
}

impl LogSummary {
    fn empty(log: LogFile, path: PathBuf) -> Self {
        Self {
            log,
            path,
            exists: false,
            total_lines: 0,
            malformed_lines: 0,
            chat: log.is_chat().then(ChatSummary::default),
            process: (!log.is_chat()).then(ProcessSummary::default),
            head: Vec::new(),
            tail: Vec::new(),
        }
    }
}

/// Summarise `log` in `logs_dir`, keeping the first and last `lines` raw lines.
///
/// A missing file yields an empty summary with `exists == false`.
pub fn summarize_file(logs_dir: &Path, log: LogFile, lines: usize) -> std::io::Result<LogSummary> {
    let path = log.path_in(logs_dir);
    let file = match std::fs::File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LogSummary::empty(log, path));
        }
        Err(e) => return Err(e),
    };

    // Lines that are not UTF-8 are kept lossily and counted as malformed
    let reader = BufReader::new(file);
    let mut raw_lines = Vec::new();
    for bytes in reader.split(b'\n') {
        let mut bytes = bytes?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        match String::from_utf8(bytes) {
            Ok(line) => raw_lines.push((Cow::Owned(line), true)),
            Err(e) => raw_lines.push((
                Cow::Owned(String::from_utf8_lossy(e.as_bytes()).into_owned()),
                false,
            )),
        }
    }

    let mut summary = summarize(log, raw_lines, lines);
    summary.path = path;
    summary.exists = true;
    Ok(summary)
}

/// Summarise already-read lines.
pub fn summarize_lines<'a>(
    log: LogFile,
    lines: impl IntoIterator<Item = &'a str>,
    keep: usize,
) -> LogSummary {
    summarize(log, lines.into_iter().map(|line| (Cow::Borrowed(line), true)), keep)
}

// Each line carries whether it decoded cleanly
fn summarize<'a>(
    log: LogFile,
    lines: impl IntoIterator<Item = (Cow<'a, str>, bool)>,
    keep: usize,
) -> LogSummary {
    let mut summary = LogSummary::empty(log, PathBuf::from(log.file_name()));
    let mut tail: VecDeque<String> = VecDeque::with_capacity(keep);
    let mut latencies = Vec::new();

    for (line, decoded) in lines {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        summary.total_lines += 1;

        if summary.head.len() < keep {
            summary.head.push(line.to_string());
        }
        if keep > 0 {
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        }

        let Some(record) = parse_line(line).filter(|_| decoded) else {
            summary.malformed_lines += 1;
            continue;
        };

        let is_error = record.level == "ERROR";
        let message = LogMessage::classify(&record.message);

        if let Some(chat) = summary.chat.as_mut() {
            if is_error {
                chat.errors += 1;
            }
            match message {
                LogMessage::Question(_) => chat.questions += 1,
                LogMessage::Answer(_) => chat.answers += 1,
                LogMessage::NoSources(_) => chat.no_source_warnings += 1,
                LogMessage::InferenceTime(secs) => latencies.push(secs),
                LogMessage::FailedAfter(_) => chat.failed_turns += 1,
                _ => {}
            }
        } else if let Some(process) = summary.process.as_mut() {
            if is_error {
                process.errors += 1;
            }
            match message {
                LogMessage::IndexStarted(_) => {
                    // Per-run figures describe the latest run only
                    process.runs += 1;
                    process.files.clear();
                    process.failures.clear();
                    process.chunks = None;
                    process.embedding_secs = None;
                    process.total_secs = None;
                }
                LogMessage::Loaded {
                    file,
                    documents,
                    seconds,
                } => process.files.push(FileLoad {
                    file,
                    documents,
                    seconds,
                }),
                LogMessage::LoadFailed { file, error } => process.failures.push((file, error)),
                LogMessage::Chunks(n) => process.chunks = Some(n),
                LogMessage::EmbeddingTime(secs) => process.embedding_secs = Some(secs),
                LogMessage::TotalTime(secs) => process.total_secs = Some(secs),
                _ => {}
            }
        }
    }

    if let Some(chat) = summary.chat.as_mut() {
        chat.inference = LatencyStats::from_samples(&latencies);
    }
    summary.tail = tail.into_iter().collect();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT_LOG: &str = "\
2026-10-16 10:00:00.000 | INFO | question: what is a chunk?
2026-10-16 10:00:01.500 | INFO | answer: A slice of a document.
2026-10-16 10:00:01.501 | INFO | sources: [\"docs/a.txt\"]
2026-10-16 10:00:01.502 | INFO | inference_time: 1.500s
2026-10-16 10:01:00.000 | INFO | question: who won in 1850?
2026-10-16 10:01:00.010 | WARN | no sources found for: who won in 1850?
2026-10-16 10:01:00.500 | ERROR | query failed: language model did not answer within 300s
2026-10-16 10:01:00.501 | INFO | failed_after: 0.500s
garbage line without separators
";

    #[test]
    fn test_chat_summary() {
        let summary = summarize_lines(LogFile::Chat, CHAT_LOG.lines(), 2);
        let chat = summary.chat.unwrap();

        assert_eq!(summary.total_lines, 9);
        assert_eq!(summary.malformed_lines, 1);
        assert_eq!(chat.questions, 2);
        assert_eq!(chat.answers, 1);
        assert_eq!(chat.no_source_warnings, 1);
        assert_eq!(chat.errors, 1);
        assert_eq!(chat.failed_turns, 1);

        // The failed turn stays out of the latency figures
        let latency = chat.inference.unwrap();
        assert_eq!(latency.count, 1);
        assert_eq!(latency.min_secs, 1.5);
        assert_eq!(latency.max_secs, 1.5);
        assert!((latency.avg_secs - 1.5).abs() < 1e-9);

        assert_eq!(summary.head.len(), 2);
        assert!(summary.head[0].ends_with("question: what is a chunk?"));
        assert_eq!(summary.tail.len(), 2);
        assert_eq!(summary.tail[1], "garbage line without separators");
    }

    #[test]
    fn test_process_summary_keeps_latest_run() {
        let log = "\
2026-10-16 09:00:00.000 | INFO | index_started: docs
2026-10-16 09:00:01.000 | INFO | loaded: docs/old.txt documents=1 time=0.010s
2026-10-16 09:00:02.000 | INFO | total_time: 2.000s
2026-10-16 11:00:00.000 | INFO | index_started: docs
2026-10-16 11:00:00.200 | INFO | loaded: docs/a.pdf documents=3 time=0.200s
2026-10-16 11:00:00.300 | WARN | load_failed: docs/bad.docx error=DOCX error: invalid Zip archive
2026-10-16 11:00:00.400 | INFO | loaded: docs/b.txt documents=1 time=0.001s
2026-10-16 11:00:00.500 | INFO | chunks: 12 generated, embedding started
2026-10-16 11:00:03.500 | INFO | embedding_time: 3.000s
2026-10-16 11:00:03.600 | INFO | total_time: 3.600s
";
        let summary = summarize_lines(LogFile::Process, log.lines(), 5);
        assert!(summary.chat.is_none());
        let process = summary.process.unwrap();

        assert_eq!(process.runs, 2);
        assert_eq!(process.files.len(), 2);
        assert_eq!(process.files[0].file, "docs/a.pdf");
        assert_eq!(process.files[0].documents, 3);
        assert_eq!(process.failures.len(), 1);
        assert_eq!(process.failures[0].0, "docs/bad.docx");
        assert_eq!(process.chunks, Some(12));
        assert_eq!(process.embedding_secs, Some(3.0));
        assert_eq!(process.total_secs, Some(3.6));
    }

    #[test]
    fn test_undecodable_line_counts_as_malformed() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut bytes = b"2026-10-16 10:00:00.000 | INFO | question: first\n".to_vec();
        bytes.extend_from_slice(b"2026-10-16 10:00:01.000 | INFO | question: caf\xe9\n");
        bytes.extend_from_slice(b"2026-10-16 10:00:02.000 | INFO | question: last\r\n");
        std::fs::write(temp_dir.path().join("chat.log"), bytes).unwrap();

        let summary = summarize_file(temp_dir.path(), LogFile::Chat, 5).unwrap();
        assert!(summary.exists);
        assert_eq!(summary.total_lines, 3);
        assert_eq!(summary.malformed_lines, 1);
        assert_eq!(summary.chat.unwrap().questions, 2);
        assert!(summary.head[1].ends_with("caf\u{FFFD}"));
        assert!(summary.tail[2].ends_with("question: last"));
    }

    #[test]
    fn test_missing_file_is_empty_summary() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let summary = summarize_file(temp_dir.path(), LogFile::Web, 10).unwrap();
        assert!(!summary.exists);
        assert_eq!(summary.total_lines, 0);
        assert_eq!(summary.chat, Some(ChatSummary::default()));
    }
}
