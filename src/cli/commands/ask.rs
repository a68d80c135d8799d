//! Ask command - answer one question and exit.

use super::{build_pipeline_async, init_logging};
use crate::config::Settings;
use crate::logging::LogFile;
use crate::query::Conversation;

/// Run the ask command. An inference error is returned so the process exits 1.
pub async fn run(question: &str, config: &Settings) -> anyhow::Result<()> {
    init_logging(config, LogFile::Chat)?;
    let pipeline = build_pipeline_async(config).await?;

    let mut conversation = Conversation::new();
    let turn = pipeline.ask(question, &mut conversation).await?;

    println!("{}", pipeline.render_answer(&turn));
    eprintln!("({:.2}s)", turn.latency.as_secs_f64());
    Ok(())
}
