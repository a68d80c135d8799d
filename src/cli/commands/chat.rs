//! Chat command - interactive question loop.

use std::io::Write;

use console::style;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use super::{build_pipeline_async, init_logging};
use crate::config::Settings;
use crate::logging::LogFile;
use crate::query::{Conversation, QueryPipeline};

/// What to do with one line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Exit,
    Skip,
    Reset,
    Question(&'a str),
}

/// `exit`/`quit` (any case) end the loop, `reset` forgets the history and
/// blank lines are ignored.
pub fn classify_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Skip
    } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        Input::Exit
    } else if trimmed.eq_ignore_ascii_case("reset") {
        Input::Reset
    } else {
        Input::Question(trimmed)
    }
}

/// Next input line, or `None` at end of input.
///
/// Bytes that are not UTF-8 are replaced instead of failing the read.
pub async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

fn prompt() {
    eprint!("{} ", style("You:").cyan().bold());
    let _ = std::io::stderr().flush();
}

/// Run the chat command until `exit`, `quit` or end of input.
pub async fn run(config: &Settings) -> anyhow::Result<()> {
    init_logging(config, LogFile::Chat)?;
    let pipeline = build_pipeline_async(config).await?;

    eprintln!(
        "{} ({} mode). Type 'reset' to forget the conversation, 'exit' or 'quit' to leave.",
        style("docchat ready").green().bold(),
        pipeline.chain_type().as_str()
    );

    let mut conversation = Conversation::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut buf = Vec::new();

    loop {
        prompt();
        let line = match read_line(&mut stdin, &mut buf).await {
            Ok(Some(line)) => line,
            Ok(None) => {
                eprintln!();
                break;
            }
            // Decoding is lossy, so only a failed read lands here
            Err(e) => {
                eprintln!("{} {e}", style("Error:").red().bold());
                break;
            }
        };

        match classify_input(&line) {
            Input::Exit => break,
            Input::Skip => continue,
            Input::Reset => {
                conversation.clear();
                eprintln!("{}", style("Conversation cleared.").dim());
            }
            Input::Question(question) => answer(&pipeline, question, &mut conversation).await,
        }
    }

    eprintln!("Goodbye.");
    Ok(())
}

/// One turn; errors are printed and the loop continues.
async fn answer(pipeline: &QueryPipeline, question: &str, conversation: &mut Conversation) {
    match pipeline.ask(question, conversation).await {
        Ok(turn) => {
            println!("{} {}", style("Bot:").green().bold(), pipeline.render_answer(&turn));
            eprintln!(
                "{}",
                style(format!("({:.2}s)", turn.latency.as_secs_f64())).dim()
            );
        }
        Err(e) => {
            eprintln!("{} {e}", style("Error:").red().bold());
        }
    }
}
