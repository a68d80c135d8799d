//! Log dashboard over the canonical log files.

mod summary;

pub use summary::{
    ChatSummary, FileLoad, LatencyStats, LogSummary, ProcessSummary, summarize_file,
    summarize_lines,
};

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn secs(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |s| format!("{s:.3}s"))
}

/// Render a summary as terminal tables.
pub fn render(summary: &LogSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("== {} ==\n", summary.path.display()));

    if !summary.exists {
        out.push_str("(no log file yet)\n");
        return out;
    }

    let mut overview = new_table();
    overview.set_header(vec!["Metric", "Value"]);
    overview.add_row(vec![
        Cell::new("Lines"),
        Cell::new(summary.total_lines),
    ]);
    overview.add_row(vec![
        Cell::new("Malformed lines"),
        Cell::new(summary.malformed_lines),
    ]);

    if let Some(chat) = &summary.chat {
        overview.add_row(vec![Cell::new("Questions"), Cell::new(chat.questions)]);
        overview.add_row(vec![Cell::new("Answers"), Cell::new(chat.answers)]);
        overview.add_row(vec![
            Cell::new("No-source warnings"),
            Cell::new(chat.no_source_warnings),
        ]);
        overview.add_row(vec![Cell::new("Errors"), Cell::new(chat.errors)]);
        overview.add_row(vec![Cell::new("Failed turns"), Cell::new(chat.failed_turns)]);
        let latency = chat.inference;
        overview.add_row(vec![
            Cell::new("Inference min / avg / max"),
            Cell::new(format!(
                "{} / {} / {}",
                secs(latency.map(|l| l.min_secs)),
                secs(latency.map(|l| l.avg_secs)),
                secs(latency.map(|l| l.max_secs)),
            )),
        ]);
    }

    if let Some(process) = &summary.process {
        overview.add_row(vec![Cell::new("Indexing runs"), Cell::new(process.runs)]);
        overview.add_row(vec![
            Cell::new("Chunks (last run)"),
            Cell::new(process.chunks.map_or_else(|| "-".to_string(), |n| n.to_string())),
        ]);
        overview.add_row(vec![
            Cell::new("Embedding time (last run)"),
            Cell::new(secs(process.embedding_secs)),
        ]);
        overview.add_row(vec![
            Cell::new("Total time (last run)"),
            Cell::new(secs(process.total_secs)),
        ]);
        overview.add_row(vec![Cell::new("Errors"), Cell::new(process.errors)]);
    }
    out.push_str(&overview.to_string());
    out.push('\n');

    if let Some(process) = &summary.process {
        if !process.files.is_empty() {
            let mut files = new_table();
            files.set_header(vec!["File", "Documents", "Load time"]);
            for load in &process.files {
                files.add_row(vec![
                    Cell::new(&load.file),
                    Cell::new(load.documents),
                    Cell::new(format!("{:.3}s", load.seconds)),
                ]);
            }
            out.push_str(&files.to_string());
            out.push('\n');
        }
        if !process.failures.is_empty() {
            let mut failures = new_table();
            failures.set_header(vec!["Failed file", "Error"]);
            for (file, error) in &process.failures {
                failures.add_row(vec![file, error]);
            }
            out.push_str(&failures.to_string());
            out.push('\n');
        }
    }

    if !summary.head.is_empty() {
        out.push_str(&format!("-- first {} lines --\n", summary.head.len()));
        for line in &summary.head {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&format!("-- last {} lines --\n", summary.tail.len()));
        for line in &summary.tail {
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}
