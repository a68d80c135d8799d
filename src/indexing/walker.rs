//! File system walker for discovering documents to index.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::documents::DocumentFormat;

/// Files found under the docs root.
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Supported files in walk order.
    pub files: Vec<(PathBuf, DocumentFormat)>,
    /// Files with an unsupported extension.
    pub skipped: Vec<PathBuf>,
}

impl WalkResult {
    pub fn total(&self) -> usize {
        self.files.len() + self.skipped.len()
    }
}

/// Walks a directory tree in deterministic (file name sorted) order.
///
/// Hidden files and directories (leading `.`) are skipped. Unreadable
/// entries below the root are logged and skipped; a missing or unreadable
/// root is an error.
#[derive(Debug, Default, Clone)]
pub struct DocumentWalker;

impl DocumentWalker {
    pub fn new() -> Self {
        Self
    }

    pub fn walk(&self, root: &Path) -> std::io::Result<WalkResult> {
        let metadata = std::fs::metadata(root)?;
        if !metadata.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            ));
        }

        let mut result = WalkResult::default();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(target: "index", "skipping unreadable entry: {e}");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            match DocumentFormat::from_path(&path) {
                Some(format) => result.files.push((path, format)),
                None => {
                    crate::debug_event!("index", "skipped", "{}", path.display());
                    result.skipped.push(path);
                }
            }
        }

        Ok(result)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}
