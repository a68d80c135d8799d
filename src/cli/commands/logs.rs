//! Logs command - dashboard over the canonical log files.

use crate::config::Settings;
use crate::dashboard::{self, LogSummary, summarize_file};
use crate::logging::LogFile;

/// Summaries for one file or all of them.
pub fn collect(config: &Settings, file: Option<LogFile>, lines: usize) -> anyhow::Result<Vec<LogSummary>> {
    let files: Vec<LogFile> = match file {
        Some(log) => vec![log],
        None => LogFile::ALL.to_vec(),
    };

    files
        .into_iter()
        .map(|log| summarize_file(&config.paths.logs_dir, log, lines).map_err(anyhow::Error::from))
        .collect()
}

/// Run the logs command.
pub fn run(config: &Settings, file: Option<LogFile>, lines: usize, json: bool) -> anyhow::Result<()> {
    let summaries = collect(config, file, lines)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    for summary in &summaries {
        println!("{}", dashboard::render(summary));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_all_logs() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Settings::default();
        config.paths.logs_dir = temp_dir.path().to_path_buf();
        std::fs::write(
            temp_dir.path().join("chat.log"),
            "2026-10-16 10:00:00.000 | INFO | question: hello\n",
        )
        .unwrap();

        let summaries = collect(&config, None, 5).unwrap();
        assert_eq!(summaries.len(), 3);
        assert!(summaries[0].exists);
        assert_eq!(summaries[0].chat.as_ref().unwrap().questions, 1);
        assert!(!summaries[1].exists);
        assert!(!summaries[2].exists);

        let only_process = collect(&config, Some(LogFile::Process), 5).unwrap();
        assert_eq!(only_process.len(), 1);
        assert!(only_process[0].process.is_some());
    }
}
