//! Index command - build the vector store from the documents directory.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;

use super::{build_generator, init_logging};
use crate::config::Settings;
use crate::indexing::{IndexProgress, IndexReport, IndexingPipeline};
use crate::logging::LogFile;

/// Arguments for the index command.
pub struct IndexArgs {
    pub docs_dir: Option<PathBuf>,
    pub progress: bool,
}

fn new_bar(total: usize, unit: &str) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let template = format!("{{spinner:.green}} [{{bar:28.cyan/blue}}] {{pos}}/{{len}} {unit} {{msg}}");
    if let Ok(style) = ProgressStyle::with_template(&template) {
        bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
    }
    bar
}

/// Run the index command.
pub fn run(args: IndexArgs, config: &Settings) -> anyhow::Result<IndexReport> {
    init_logging(config, LogFile::Process)?;

    let docs_dir = args
        .docs_dir
        .unwrap_or_else(|| config.paths.docs_dir.clone());
    let show_progress = args.progress && std::io::stderr().is_terminal();

    eprintln!("Indexing {}", docs_dir.display());

    let generator = build_generator(config)?;
    let pipeline = IndexingPipeline::new(
        Arc::clone(&generator),
        config.chunking.clone(),
        &config.paths.vectorstore_dir,
    );

    let mut files_bar: Option<ProgressBar> = None;
    let mut chunks_bar: Option<ProgressBar> = None;

    let result = pipeline.run_with_progress(&docs_dir, |progress| {
        if !show_progress {
            return;
        }
        match progress {
            IndexProgress::LoadingFile {
                current,
                total,
                path,
            } => {
                let bar = files_bar.get_or_insert_with(|| new_bar(total, "files"));
                bar.set_position(current as u64);
                bar.set_message(path.display().to_string());
            }
            IndexProgress::GeneratingEmbeddings { current, total } => {
                if let Some(done) = files_bar.as_ref().filter(|b| !b.is_finished()) {
                    done.finish_with_message("loaded");
                }
                let bar = chunks_bar.get_or_insert_with(|| new_bar(total, "chunks"));
                bar.set_position(current as u64);
            }
        }
    });

    if let Some(bar) = files_bar.as_ref().filter(|b| !b.is_finished()) {
        bar.finish_with_message("loaded");
    }
    if let Some(bar) = chunks_bar.as_ref() {
        bar.finish_with_message("embedded");
    }

    let report = result?;
    print_report(&report, config);
    Ok(report)
}

fn print_report(report: &IndexReport, config: &Settings) {
    println!();
    println!("Indexing complete:");
    println!("  Files found: {}", report.files_seen);
    println!("  Files loaded: {}", report.files_loaded);
    println!("  Files skipped (unsupported): {}", report.files_skipped);
    println!("  Files failed: {}", report.failures.len());
    println!("  Documents: {}", report.documents);
    println!("  Chunks: {}", report.chunks);
    println!("  Embedding time: {:.3}s", report.embedding_time.as_secs_f64());
    println!("  Total time: {:.3}s", report.total_time.as_secs_f64());
    println!("  Vector store: {}", config.paths.vectorstore_dir.display());

    if !report.failures.is_empty() {
        println!();
        println!("Failed files:");
        for failure in &report.failures {
            println!("  {}: {}", failure.path.display(), failure.error);
        }
    }
    if report.chunks == 0 {
        println!();
        println!("Warning: no chunks were generated; questions will have no sources.");
    }
}
