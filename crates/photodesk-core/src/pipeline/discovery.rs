//! Finding local originals to feed the ingestor.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::ingest::Upload;
use super::validate::AcceptedFormat;
use crate::config::ProcessingConfig;

/// A local file that looks like an acceptable original.
#[derive(Debug, Clone)]
pub struct LocalOriginal {
    pub path: PathBuf,
    pub size: u64,
    /// Format implied by the extension; the bytes are sniffed again on ingest
    pub format: AcceptedFormat,
}

impl LocalOriginal {
    /// Read the file into an [`Upload`].
    pub async fn into_upload(
        self,
        title: Option<String>,
        uploader_id: Option<String>,
    ) -> std::io::Result<Upload> {
        let bytes = tokio::fs::read(&self.path).await?;
        let filename = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        Ok(Upload {
            bytes,
            filename,
            content_type: Some(self.format.content_type().to_string()),
            uploader_id,
            title,
        })
    }
}

pub struct FileDiscovery {
    extensions: Vec<String>,
}

impl FileDiscovery {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            extensions: config
                .supported_formats
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// A single file, or every matching file under a directory, sorted by path.
    /// Hidden files and directories are skipped.
    pub fn discover(&self, path: &Path) -> Vec<LocalOriginal> {
        if path.is_file() {
            return std::fs::metadata(path)
                .ok()
                .and_then(|meta| self.accept(path, meta.len()))
                .into_iter()
                .collect();
        }

        let mut found: Vec<LocalOriginal> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let size = e.metadata().ok()?.len();
                self.accept(e.path(), size)
            })
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    fn accept(&self, path: &Path, size: u64) -> Option<LocalOriginal> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if !self.extensions.contains(&ext) {
            return None;
        }
        Some(LocalOriginal {
            path: path.to_path_buf(),
            size,
            format: AcceptedFormat::from_extension(&ext)?,
        })
    }

    pub fn total_size(files: &[LocalOriginal]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
