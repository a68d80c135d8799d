//! Logging setup.
//!
//! Two layers share one registry:
//! - a file layer writing the canonical `timestamp | LEVEL | message` format
//!   to the front-end's log file (`chat.log`, `web_chat.log`, `process.log`)
//! - a compact stderr layer for the operator
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! level = "info"     # file log level
//! console = "warn"   # stderr level
//!
//! [logging.modules]
//! query = "debug"
//! ```
//!
//! `RUST_LOG` takes precedence over config for both layers:
//! ```bash
//! RUST_LOG=debug docchat chat
//! ```

pub mod format;
pub mod record;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

pub use format::PipeFormat;

static INIT: Once = Once::new();

/// Dependencies that are noisy at info level.
const QUIET_TARGETS: &str = "tantivy=warn,ort=warn,hyper=warn,hyper_util=warn,reqwest=warn";

/// Which front-end is logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFile {
    /// Interactive and one-shot CLI chat
    Chat,
    /// Web chat server
    Web,
    /// Indexing runs
    Process,
}

impl LogFile {
    pub const ALL: [LogFile; 3] = [LogFile::Chat, LogFile::Web, LogFile::Process];

    pub fn file_name(&self) -> &'static str {
        match self {
            LogFile::Chat => "chat.log",
            LogFile::Web => "web_chat.log",
            LogFile::Process => "process.log",
        }
    }

    pub fn path_in(&self, logs_dir: &Path) -> PathBuf {
        logs_dir.join(self.file_name())
    }

    /// Chat logs carry question/answer records; the process log carries indexing records.
    pub fn is_chat(&self) -> bool {
        matches!(self, LogFile::Chat | LogFile::Web)
    }
}

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

fn build_filter(level: &str, modules: &std::collections::HashMap<String, String>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    let mut filter_str = format!("{level},{QUIET_TARGETS}");
    for (module, module_level) in modules {
        filter_str.push_str(&format!(",{module}={module_level}"));
    }
    EnvFilter::new(&filter_str)
}

/// Open a log file for appending, creating its directory.
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize logging with configuration.
///
/// Call once at startup. Only the first call takes effect. When `log_file` is
/// given, events at or above `config.level` are appended to it in the
/// canonical format.
pub fn init_with_config(config: &LoggingConfig, log_file: Option<&Path>) -> std::io::Result<()> {
    let file = log_file.map(open_log_file).transpose()?;

    INIT.call_once(|| {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(build_filter(&config.console, &config.modules));

        let file_layer = file.map(|file| {
            tracing_subscriber::fmt::layer()
                .event_format(PipeFormat)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(build_filter(&config.level, &config.modules))
        });

        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init();
    });

    Ok(())
}

/// Log an event with handler context.
///
/// # Examples
/// ```ignore
/// log_event!("index", "started", "{}", docs_dir.display());
/// log_event!("web", "listening");
/// ```
#[macro_export]
macro_rules! log_event {
    ($handler:expr, $event:expr) => {
        tracing::info!("[{}] {}", $handler, $event)
    };
    ($handler:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $handler, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("index", "skipped", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($handler:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $handler, $event)
    };
    ($handler:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $handler, $event, format!($($arg)*))
    };
}
