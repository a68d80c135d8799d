//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::logging::LogFile;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

fn heading(text: &str) -> String {
    if console::colors_enabled() {
        format!("{}", console::style(text).cyan().bold())
    } else {
        text.to_string()
    }
}

/// Create custom help text with consistent styling
fn create_custom_help() -> String {
    let mut help = String::new();

    help.push_str(&heading("Quick Start:"));
    help.push('\n');
    help.push_str("  $ docchat init                     # Write docchat.toml\n");
    help.push_str("  $ docchat index --docs-dir docs    # Build the vector store\n");
    help.push_str("  $ docchat chat                     # Interactive chat\n");
    help.push_str("  $ docchat serve                    # Web chat on the configured address\n");
    help.push_str("  $ docchat logs --file process      # Inspect the last indexing run\n\n");

    help.push_str("Answer questions about local documents with a local LLM.\n\n");

    help.push_str(&heading("Usage:"));
    help.push_str(" docchat [OPTIONS] <COMMAND>\n\n");

    help.push_str(&heading("Commands:"));
    help.push('\n');
    help.push_str("  init     Write a default configuration file\n");
    help.push_str("  config   Display active settings\n");
    help.push_str("  index    Index the documents directory\n");
    help.push_str("  chat     Interactive question loop\n");
    help.push_str("  ask      Answer one question and exit\n");
    help.push_str("  serve    Start the web chat server\n");
    help.push_str("  logs     Summarise the log files\n");
    help.push_str("  help     Print this message or the help of the given subcommand(s)\n\n");

    help.push_str("See 'docchat help <command>' for more information on a specific command.\n\n");

    help.push_str(&heading("Options:"));
    help.push('\n');
    help.push_str("  -c, --config <CONFIG>  Path to a custom docchat.toml file\n");
    help.push_str("  -h, --help             Print help\n");
    help.push_str("  -V, --version          Print version\n");

    help
}

/// Document question answering
#[derive(Parser, Debug)]
#[command(
    name = "docchat",
    version = env!("CARGO_PKG_VERSION"),
    about = "Document question answering with a local LLM",
    long_about = "Index local documents and answer questions about them with a local LLM.",
    next_line_help = true,
    styles = clap_cargo_style(),
    override_help = create_custom_help()
)]
pub struct Cli {
    /// Path to custom docchat.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration
    #[command(about = "Write a default docchat.toml")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration
    #[command(about = "Display active settings as TOML")]
    Config,

    /// Build the vector store
    #[command(about = "Index every supported document under the documents directory")]
    Index {
        /// Documents directory (overrides paths.docs_dir)
        #[arg(long, value_name = "DIR")]
        docs_dir: Option<PathBuf>,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Interactive chat
    #[command(about = "Ask questions interactively; type 'exit' or 'quit' to leave")]
    Chat,

    /// One-shot question
    #[command(about = "Answer a single question and exit")]
    Ask {
        /// The question to answer
        #[arg(required = true, num_args = 1.., value_name = "QUESTION")]
        question: Vec<String>,
    },

    /// Web chat
    #[command(about = "Start the web chat server")]
    Serve {
        /// Address to bind (overrides server.bind)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Log dashboard
    #[command(about = "Summarise chat, web and indexing logs")]
    Logs {
        /// Only this log file (default: all)
        #[arg(long, value_enum)]
        file: Option<LogFile>,

        /// Raw lines to show from the start and end of each file
        #[arg(short = 'n', long, default_value_t = 10)]
        lines: usize,

        /// Output JSON instead of tables
        #[arg(long)]
        json: bool,
    },
}
